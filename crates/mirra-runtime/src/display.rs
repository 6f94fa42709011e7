//! Display host.
//!
//! The display host owns the orchestrator-facing display channel. It answers
//! `getsize`, and for every `load` it opens a plugin channel and spawns a
//! [`PluginRuntime`] bound to the requested container.
//!
//! ```text
//! Orchestrator ──display channel──▶ DisplayHost
//!                                      │ load { pName, pDiv }
//!                                      ▼
//!                         connect(url, pName) ──▶ PluginRuntime task
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use mirra_core::protocol::DISPLAY_READY;
use mirra_core::{
    ChannelConfig, ChannelEvent, ChannelHandle, ConnectFn, DisplayCommand, EventForwarder,
    ResourceHost,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MirraConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::lifecycle::{PluginRuntime, RuntimeOptions};
use crate::registry::BehaviorRegistry;

/// Map key of a plugin channel.
pub fn socket_key(plugin: &str) -> String {
    format!("{plugin}Socket")
}

/// Settings the display host passes down to plugin channels and runtimes.
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    /// Surface width reported by `getsize`.
    pub width: u32,
    /// Surface height reported by `getsize`.
    pub height: u32,
    /// Endpoint plugin channels connect to.
    pub plugin_url: String,
    /// Outbound queue capacity of each plugin channel.
    pub outbound_buffer: usize,
    /// Inbound event queue capacity of each plugin runtime.
    pub event_buffer: usize,
    pub runtime: RuntimeOptions,
}

impl DisplayOptions {
    pub fn from_config(config: &MirraConfig) -> Self {
        Self {
            width: config.display.width,
            height: config.display.height,
            plugin_url: config.display.url.clone(),
            outbound_buffer: config.display.outbound_buffer,
            event_buffer: config.plugins.event_buffer,
            runtime: RuntimeOptions::from(&config.plugins),
        }
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self::from_config(&MirraConfig::default())
    }
}

/// A running plugin.
struct PluginSlot {
    plugin: String,
    container: String,
    channel: ChannelHandle,
    task: JoinHandle<()>,
}

impl PluginSlot {
    async fn shutdown(self) {
        self.channel.close();
        if let Err(e) = self.task.await {
            warn!(plugin = %self.plugin, error = %e, "Plugin task ended abnormally");
        }
    }
}

/// Multiplexes plugin runtimes behind one display channel.
pub struct DisplayHost {
    channel: ChannelHandle,
    connect: ConnectFn,
    options: DisplayOptions,
    resources: Arc<dyn ResourceHost>,
    registry: Arc<BehaviorRegistry>,
    /// Active plugins by [`socket_key`].
    plugins: HashMap<String, PluginSlot>,
}

impl DisplayHost {
    pub fn new(
        channel: ChannelHandle,
        connect: ConnectFn,
        options: DisplayOptions,
        resources: Arc<dyn ResourceHost>,
        registry: Arc<BehaviorRegistry>,
    ) -> Self {
        Self {
            channel,
            connect,
            options,
            resources,
            registry,
            plugins: HashMap::new(),
        }
    }

    /// `<width>x<height>` of the surface.
    pub fn size(&self) -> String {
        format!("{}x{}", self.options.width, self.options.height)
    }

    /// Names of the plugins whose runtimes are still running, sorted.
    pub fn active_plugins(&self) -> Vec<&str> {
        let mut names: Vec<_> = self
            .plugins
            .values()
            .filter(|slot| !slot.task.is_finished())
            .map(|slot| slot.plugin.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Container bound to `plugin`, if it is active.
    pub fn container_of(&self, plugin: &str) -> Option<&str> {
        self.plugins
            .get(&socket_key(plugin))
            .filter(|slot| !slot.task.is_finished())
            .map(|slot| slot.container.as_str())
    }

    /// Handles one display channel message. Failures are logged.
    pub async fn handle_message(&mut self, text: &str) {
        let command = match DisplayCommand::parse(text) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Dropping display message");
                return;
            }
        };

        match command {
            DisplayCommand::Load { plugin, container } => {
                if let Err(e) = self.load_plugin(&plugin, &container).await {
                    error!(plugin = %plugin, container = %container, error = %e, "Plugin load rejected");
                }
            }
            DisplayCommand::Unload { plugin } => {
                if !self.unload_plugin(&plugin).await {
                    debug!(plugin = %plugin, "Unload for inactive plugin");
                }
            }
            DisplayCommand::GetSize => {
                let size = self.size();
                if let Err(e) = self.channel.send(size).await {
                    debug!(error = %e, "Size reply dropped");
                }
            }
        }
    }

    /// Connects `plugin` and starts its runtime on `container`.
    ///
    /// An active instance of the same plugin is shut down first. A container
    /// held by another active plugin is refused.
    pub async fn load_plugin(&mut self, plugin: &str, container: &str) -> RuntimeResult<()> {
        let key = socket_key(plugin);
        if let Some(previous) = self.plugins.remove(&key) {
            debug!(plugin = %plugin, "Replacing active plugin");
            previous.shutdown().await;
        }
        self.plugins.retain(|_, slot| !slot.task.is_finished());

        if let Some(owner) = self.plugins.values().find(|slot| slot.container == container) {
            return Err(RuntimeError::ContainerBusy {
                container: container.to_string(),
                plugin: owner.plugin.clone(),
            });
        }

        let config = ChannelConfig::new(self.options.plugin_url.clone(), plugin)
            .with_outbound_buffer(self.options.outbound_buffer);
        let (forwarder, events) = EventForwarder::channel(self.options.event_buffer);
        let channel = (self.connect)(config, Arc::new(forwarder)).await?;

        let runtime = PluginRuntime::new(
            container,
            channel.clone(),
            Arc::clone(&self.resources),
            Arc::clone(&self.registry),
            self.options.runtime.clone(),
        );
        let task = tokio::spawn(runtime.run(events));

        info!(plugin = %plugin, container = %container, "Plugin started");
        self.plugins.insert(
            key,
            PluginSlot {
                plugin: plugin.to_string(),
                container: container.to_string(),
                channel,
                task,
            },
        );
        Ok(())
    }

    /// Closes the channel of `plugin` and waits until its runtime has
    /// unloaded, so the container is free on return. Returns whether the
    /// plugin was known.
    pub async fn unload_plugin(&mut self, plugin: &str) -> bool {
        match self.plugins.remove(&socket_key(plugin)) {
            Some(slot) => {
                info!(plugin = %plugin, "Plugin unloading");
                slot.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Closes every plugin and waits for their runtimes to finish.
    pub async fn shutdown(&mut self) {
        for (_, slot) in self.plugins.drain() {
            slot.shutdown().await;
        }
    }

    /// Runs until the display channel closes or is lost.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ChannelEvent>) {
        let mut closed = self.channel.subscribe_close();

        info!(size = %self.size(), "Display host started");
        if let Err(e) = self.channel.send(DISPLAY_READY).await {
            warn!(error = %e, "Failed to announce display");
        }

        while !self.channel.is_closed() {
            tokio::select! {
                changed = closed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = inbound.recv() => match event {
                    Some(ChannelEvent::Message(text)) => self.handle_message(&text).await,
                    Some(ChannelEvent::Disconnected) | None => {
                        warn!("Display channel lost");
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
        self.channel.close();
        info!("Display host stopped");
    }
}
