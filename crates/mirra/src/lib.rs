//! # Mirra
//!
//! A headless plugin display runtime. An orchestrator installs, configures
//! and tears down independently authored display plugins inside a shared
//! surface; a control panel drives the orchestrator through a multiplexed
//! request/response API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ display channel ┌─────────────┐     ┌──────────────────────────────┐
//! │ Orchestrator │────────────────▶│ DisplayHost │────▶│ PluginRuntime "clock" (task) │──▶ Behavior
//! │              │                 │             │────▶│ PluginRuntime ...     (task) │──▶ Behavior
//! └──────┬───────┘                 └─────────────┘     └──────────────────────────────┘
//!        │ STDIN channel
//! ┌──────┴───────┐
//! │  ApiClient   │
//! └──────────────┘
//! ```
//!
//! - **DisplayHost**: answers display commands and starts one runtime per plugin
//! - **PluginRuntime**: loads a plugin's resources, constructs its behavior and
//!   dispatches its commands
//! - **Behavior**: plugin logic behind `jsPluginCmd`, registered by name
//! - **ApiClient**: correlates API calls and responses for a control panel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mirra::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Behavior for Greeter {
//!     async fn invoke(&mut self, method: &str, _args: Value) -> BehaviorResult<Value> {
//!         match method {
//!             "hello" => Ok(Value::from("world")),
//!             other => Err(BehaviorError::UnknownMethod(other.to_string())),
//!         }
//!     }
//! }
//!
//! #[register_behavior("Greeter")]
//! fn greeter(_conf: PluginConf) -> BoxedBehavior {
//!     Box::new(Greeter)
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     MirraRuntime::new().run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `ws-client` (default): WebSocket display, plugin and API channels
//! - `http-fetch`: plugin resources fetched over HTTP
//! - `json-log`: JSON log output

pub use mirra_api as api;
pub use mirra_core as core;
pub use mirra_runtime as runtime;
pub use mirra_transport as transport;

/// Commonly used types for writing behaviors and running the display.
///
/// ```rust,ignore
/// use mirra::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use mirra_runtime::{MirraConfig, MirraRuntime, RuntimeError, RuntimeResult};

    // Behaviors
    pub use async_trait::async_trait;
    pub use mirra_core::{
        Behavior, BehaviorError, BehaviorResult, BoxedBehavior, ConfigEvent, PluginConf,
    };
    pub use mirra_runtime::register_behavior;
    pub use serde_json::Value;

    // API client
    pub use mirra_api::{ApiAction, ApiClient, ApiEvent, ApiPayload, call};
}
