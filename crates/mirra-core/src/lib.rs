//! # Mirra Core
//!
//! Shared building blocks of the Mirra plugin display runtime:
//!
//! - **Channels**: [`ChannelHandle`], [`ChannelEvent`], [`ChannelHandler`] and
//!   the link-time [`CONNECT_REGISTRY`] transports publish into.
//! - **Plugin protocol**: command frames, [`ResourceSpec`], [`InvokeRequest`]
//!   and display commands ([`protocol`]).
//! - **API protocol**: [`ApiCall`] encoding and [`ApiResponse`] parsing
//!   ([`api`]).
//! - **Surface**: the [`Container`] a plugin renders into and the
//!   [`ResourceHost`] that fetches its assets.
//! - **Behaviors**: the [`Behavior`] capability trait, [`PluginConf`] and the
//!   link-time [`BEHAVIOR_REGISTRY`].
//!
//! ```text
//! orchestrator ──▶ Channel ──▶ PluginRuntime ──▶ ResourceHost
//!                                   │
//!                                   └──▶ Behavior (by name)
//! ```

pub mod api;
pub mod behavior;
pub mod channel;
pub mod container;
pub mod error;
pub mod protocol;
pub mod resource;

pub use api::{ApiAction, ApiCall, ApiResponse, ApiStatus, PLUGIN_API_ID};
pub use behavior::{
    BEHAVIOR_REGISTRY, Behavior, BehaviorEntry, BehaviorFactoryFn, BoxedBehavior, ConfigEvent,
    PluginConf,
};
pub use channel::{
    CONNECT_REGISTRY, ChannelConfig, ChannelEvent, ChannelHandle, ChannelHandler, ConnectFn,
    EventForwarder, registered_connector,
};
pub use container::Container;
pub use error::{
    BehaviorError, BehaviorResult, ProtocolError, ProtocolResult, ResourceError, ResourceResult,
    TransportError, TransportResult,
};
pub use protocol::{DisplayCommand, Inbound, InvokeRequest, RawCommand, ResourceSpec};
pub use resource::{MemoryResourceHost, ResourceHost, ResourceKind};

// Re-exported for `#[register_behavior]` expansions.
#[doc(hidden)]
pub use linkme;
