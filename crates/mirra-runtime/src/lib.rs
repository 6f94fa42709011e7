//! Mirra Runtime - plugin lifecycle and orchestration for the Mirra display.
//!
//! This crate provides:
//! - The per-plugin lifecycle runtime (`PluginRuntime`) and its resource loader
//! - The command dispatch table and behavior registry
//! - The display host that multiplexes plugins behind the display channel
//! - Runtime orchestration (`MirraRuntime`), configuration and logging
//!
//! ```ignore
//! use mirra_runtime::MirraRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MirraRuntime::new();
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Behaviors
//!
//! Behavior types are found by name when a `load` names a `main` type. They
//! are registered at link time with `#[register_behavior("Name")]`, or at
//! runtime with [`MirraRuntime::register_behavior`].
//!
//! # Transports
//!
//! - `ws-client`: WebSocket display and plugin channels
//! - `http-fetch`: plugin resources fetched over HTTP

pub mod builtin;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, MirraConfig};
pub use dispatch::{Command, CommandKind, DispatchTable};
pub use display::{DisplayHost, DisplayOptions};
pub use error::{RuntimeError, RuntimeResult};
pub use lifecycle::{PluginRuntime, PluginState, RuntimeOptions};
pub use loader::{LoadEvent, LoadRequest, ResourceLoader};
pub use logging::LoggingBuilder;
pub use registry::{BehaviorFactory, BehaviorRegistry};
pub use runtime::{MirraRuntime, RuntimeBuilder};

pub use mirra_macros::register_behavior;

// Re-export tracing for use by behavior crates
pub use tracing;

/// Logging macros for behavior implementations.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
