//! Behavior objects: the custom logic a plugin brings along.
//!
//! A behavior is constructed by name once the plugin's scripts have loaded.
//! Construction goes through named factories; factories defined in code are
//! published at link time into [`BEHAVIOR_REGISTRY`] with
//! `#[register_behavior("Name")]`.

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiAction, ApiCall, PLUGIN_API_ID};
use crate::channel::ChannelHandle;
use crate::error::{BehaviorResult, TransportResult};

/// Capability interface every behavior object implements.
#[async_trait]
pub trait Behavior: Send {
    /// Calls `method` with `args` and returns its result.
    ///
    /// Unknown methods should fail with
    /// [`BehaviorError::UnknownMethod`](crate::BehaviorError::UnknownMethod).
    async fn invoke(&mut self, method: &str, args: Value) -> BehaviorResult<Value>;

    /// Receives the answer to a [`PluginConf`] request.
    async fn on_config(&mut self, _event: ConfigEvent) {}

    /// Teardown hook, called once before the plugin is unloaded.
    async fn destroy(&mut self) {}
}

/// Boxed behavior object.
pub type BoxedBehavior = Box<dyn Behavior>;

/// Answer to a plugin configuration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// A setting was read.
    Get {
        /// Setting name.
        setting: String,
        /// Setting value.
        value: String,
    },
    /// A setting was written; carries the API's payload.
    Set(String),
}

/// The slice of the API a behavior object may use: reading and writing its
/// own plugin settings.
#[derive(Debug, Clone)]
pub struct PluginConf {
    container: String,
    channel: ChannelHandle,
}

impl PluginConf {
    /// Creates a configuration handle for `container` speaking over `channel`.
    pub fn new(container: impl Into<String>, channel: ChannelHandle) -> Self {
        Self {
            container: container.into(),
            channel,
        }
    }

    /// Container id the requests are made for.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Requests a setting; the answer arrives as [`ConfigEvent::Get`].
    pub async fn get(&self, data: &str) -> TransportResult<()> {
        self.forward(ApiAction::GetOpt, data).await
    }

    /// Adds or overwrites a setting; the answer arrives as [`ConfigEvent::Set`].
    pub async fn set(&self, data: &str) -> TransportResult<()> {
        self.forward(ApiAction::SetOpt, data).await
    }

    async fn forward(&self, action: ApiAction, data: &str) -> TransportResult<()> {
        debug!(container = %self.container, action = %action, "Forwarding plugin API call");
        let call = ApiCall::new(action)
            .with_id(PLUGIN_API_ID)
            .with_plugin(&self.container)
            .with_data(data);
        self.channel.send(call.encode()).await
    }
}

/// Constructor published for a behavior type.
pub type BehaviorFactoryFn = fn(PluginConf) -> BoxedBehavior;

/// One link-time behavior registration.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorEntry {
    /// Type name used by `load` payloads.
    pub name: &'static str,
    /// Constructor.
    pub factory: BehaviorFactoryFn,
}

/// Behaviors registered with `#[register_behavior("Name")]`.
#[distributed_slice]
pub static BEHAVIOR_REGISTRY: [BehaviorEntry];
