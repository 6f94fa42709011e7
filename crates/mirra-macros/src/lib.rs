//! Procedural macros for the Mirra plugin display runtime.
//!
//! # Behavior registration
//!
//! `#[register_behavior("Name")]` publishes a behavior constructor at link
//! time, so `load` payloads naming `Name` can construct it without any
//! runtime registration call:
//!
//! ```rust,ignore
//! use mirra_core::{BoxedBehavior, PluginConf};
//! use mirra_macros::register_behavior;
//!
//! #[register_behavior("Ticker")]
//! fn ticker(conf: PluginConf) -> BoxedBehavior {
//!     Box::new(Ticker::new(conf))
//! }
//! ```
//!
//! # Connector registration
//!
//! `#[register_connector]` publishes an async connect function into
//! `mirra_core::CONNECT_REGISTRY`. The crate using it must depend on
//! `futures`.

mod behavior;
mod connector;

use proc_macro::TokenStream;

/// Registers a `fn(PluginConf) -> BoxedBehavior` constructor under a type
/// name in `mirra_core::BEHAVIOR_REGISTRY`.
#[proc_macro_attribute]
pub fn register_behavior(attr: TokenStream, item: TokenStream) -> TokenStream {
    behavior::register_behavior(attr, item)
}

/// Registers an async channel connect function in
/// `mirra_core::CONNECT_REGISTRY`.
#[proc_macro_attribute]
pub fn register_connector(attr: TokenStream, item: TokenStream) -> TokenStream {
    connector::register_connector(attr, item)
}
