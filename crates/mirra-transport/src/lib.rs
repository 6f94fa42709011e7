//! # Mirra Transport
//!
//! Concrete transports and resource hosts for the Mirra runtime, selected
//! with feature flags.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket channel connector, published into
//!   `mirra_core::CONNECT_REGISTRY`
//! - `http-fetch`: [`HttpResourceHost`], fetching plugin resources over HTTP
//! - `full`: both
//!
//! ```text
//! ┌─────────────────────┐
//! │  mirra-runtime      │  (plugin runtimes, display host)
//! ├─────────────────────┤
//! │  mirra-core         │  (channel + resource traits, registries)
//! ├─────────────────────┤
//! │  mirra-transport    │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! Linking this crate with `ws-client` is enough for
//! `mirra_core::registered_connector()` to find the WebSocket connector.

#[cfg(feature = "ws-client")]
pub mod ws_client;

#[cfg(feature = "http-fetch")]
pub mod http_host;

#[cfg(feature = "ws-client")]
pub use ws_client::ws_connect;

#[cfg(feature = "http-fetch")]
pub use http_host::HttpResourceHost;
