//! Top-level orchestration.
//!
//! `MirraRuntime` loads configuration, initializes logging, connects the
//! display channel and runs a [`DisplayHost`] until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mirra_runtime::MirraRuntime;
//!
//! // Loads mirra.toml from the current directory if present
//! let runtime = MirraRuntime::new();
//! runtime.run().await?;
//!
//! // Custom configuration
//! let runtime = MirraRuntime::builder()
//!     .config_file("config/mirra.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::sync::Arc;

use mirra_core::{
    BoxedBehavior, ChannelConfig, ChannelHandle, ConnectFn, EventForwarder, MemoryResourceHost,
    PluginConf, ResourceHost, registered_connector,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, MirraConfig};
use crate::display::{DisplayHost, DisplayOptions};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::registry::BehaviorRegistry;

/// The Mirra display runtime.
pub struct MirraRuntime {
    config: MirraConfig,
    registry: BehaviorRegistry,
    resources: Option<Arc<dyn ResourceHost>>,
    connector: Option<ConnectFn>,
}

impl MirraRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, falling back to defaults.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                MirraConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from `config`.
    ///
    /// Initializes logging and collects every linked behavior.
    pub fn from_config(config: &MirraConfig) -> Self {
        logging::init_from_config(&config.logging);

        let registry = BehaviorRegistry::collect_all();

        info!(
            log_level = %config.logging.level,
            display = %config.display.url,
            behaviors = registry.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            registry,
            resources: None,
            connector: None,
        }
    }

    pub fn config(&self) -> &MirraConfig {
        &self.config
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Registers a behavior factory in addition to the linked ones.
    pub fn register_behavior<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(PluginConf) -> BoxedBehavior + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
    }

    /// Uses `host` for plugin resources instead of the configured default.
    pub fn with_resource_host(mut self, host: Arc<dyn ResourceHost>) -> Self {
        self.resources = Some(host);
        self
    }

    /// Uses `connect` for display and plugin channels instead of the
    /// registered connector.
    pub fn with_connector(mut self, connect: ConnectFn) -> Self {
        self.connector = Some(connect);
        self
    }

    fn connector(&self) -> RuntimeResult<ConnectFn> {
        if let Some(connect) = self.connector {
            return Ok(connect);
        }

        // Referencing the transport keeps it linked, so its connector is registered.
        #[cfg(feature = "ws-client")]
        let _ = mirra_transport::ws_connect;

        registered_connector().ok_or(RuntimeError::NoConnector)
    }

    fn resource_host(&self) -> RuntimeResult<Arc<dyn ResourceHost>> {
        if let Some(host) = &self.resources {
            return Ok(Arc::clone(host));
        }

        #[cfg(feature = "http-fetch")]
        {
            let resources = &self.config.resources;
            let host = mirra_transport::HttpResourceHost::new(
                resources.base_url.clone(),
                resources.fetch_timeout(),
            )?;
            debug!(base_url = %resources.base_url, "Using HTTP resource host");
            return Ok(Arc::new(host));
        }

        #[allow(unreachable_code)]
        {
            warn!("`http-fetch` is disabled, plugin resources are only tracked in memory");
            Ok(Arc::new(MemoryResourceHost::new()))
        }
    }

    /// Connects the display channel and spawns the display host.
    async fn start(&self) -> RuntimeResult<(ChannelHandle, JoinHandle<()>)> {
        let connect = self.connector()?;
        let resources = self.resource_host()?;

        let display_cfg = &self.config.display;
        let channel_config =
            ChannelConfig::new(display_cfg.url.clone(), display_cfg.protocol.clone())
                .with_outbound_buffer(display_cfg.outbound_buffer);
        let (forwarder, events) = EventForwarder::channel(self.config.plugins.event_buffer);

        let channel = connect(channel_config, Arc::new(forwarder)).await?;
        info!(
            url = %display_cfg.url,
            protocol = %display_cfg.protocol,
            "Display channel connected"
        );

        let host = DisplayHost::new(
            channel.clone(),
            connect,
            DisplayOptions::from_config(&self.config),
            resources,
            Arc::new(self.registry.clone()),
        );
        Ok((channel, tokio::spawn(host.run(events))))
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Mirra runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` resolves or the display channel is lost.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let (channel, mut task) = self.start().await?;

        let display_exited = tokio::select! {
            () = shutdown => false,
            result = &mut task => {
                if let Err(e) = result {
                    error!(error = %e, "Display host task failed");
                }
                true
            }
        };

        info!("Stopping Mirra runtime");
        channel.close();
        if !display_exited && let Err(e) = task.await {
            error!(error = %e, "Display host task failed");
        }
        info!("Runtime stopped");

        Ok(())
    }
}

impl Default for MirraRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`MirraRuntime`] with custom configuration loading.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Loads this file instead of searching.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables `MIRRA_*` environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically, above the defaults and below
    /// files and environment.
    pub fn merge(mut self, config: MirraConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<MirraRuntime> {
        let config = self.config_loader.load()?;
        Ok(MirraRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
