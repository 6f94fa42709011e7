//! Plugin lifecycle runtime.
//!
//! A [`PluginRuntime`] owns one plugin instance: its container, channel,
//! resource loader, dispatch table and behavior object. It runs as a single
//! task that multiplexes channel traffic, resource completions, the load
//! deadline and the channel's close signal.
//!
//! ```text
//! Uninitialized ──load──▶ AwaitingResources ──scripts done──▶ Instantiating ──▶ Ready
//!        ▲                        │                                              │
//!        └──────── load ◀── Closed ◀──────────── unload / close ◀────────────────┘
//! ```
//!
//! Two barriers gate a load. Once every script has completed the behavior
//! object named by `main` is constructed. Once every style and script has
//! completed a single `PluginClient Loaded` acknowledgement is sent.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mirra_core::protocol::{
    CSS_APPLIED, Inbound, LOADED_ACK, NO_INSTANCE, error_reply, parse_inbound,
};
use mirra_core::{
    ApiAction, ApiResponse, BoxedBehavior, ChannelEvent, ChannelHandle, ConfigEvent, Container,
    InvokeRequest, PluginConf, ProtocolResult, RawCommand, ResourceHost, ResourceKind,
    ResourceSpec,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::config::PluginsConfig;
use crate::dispatch::{Command, DispatchTable, invoke_reply};
use crate::error::RuntimeError;
use crate::loader::{LoadEvent, LoadRequest, ResourceLoader};
use crate::registry::BehaviorRegistry;

/// Lifecycle state of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Uninitialized,
    AwaitingResources,
    Instantiating,
    Ready,
    Unloading,
    Closed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::AwaitingResources => "awaiting-resources",
            Self::Instantiating => "instantiating",
            Self::Ready => "ready",
            Self::Unloading => "unloading",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Per-runtime tunables.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Time allowed for every resource of one load to complete.
    pub load_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&PluginsConfig> for RuntimeOptions {
    fn from(config: &PluginsConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
        }
    }
}

/// Progress of the current load.
#[derive(Debug)]
struct LoadBarrier {
    requested: LoadRequest,
    styles_loaded: usize,
    scripts_loaded: usize,
    main: Option<String>,
    instantiated: bool,
    acknowledged: bool,
    deadline: Option<Instant>,
}

impl LoadBarrier {
    fn new(requested: LoadRequest, main: Option<String>, deadline: Instant) -> Self {
        Self {
            requested,
            styles_loaded: 0,
            scripts_loaded: 0,
            main,
            instantiated: false,
            acknowledged: false,
            deadline: Some(deadline),
        }
    }

    fn scripts_ready(&self) -> bool {
        self.scripts_loaded >= self.requested.scripts
    }

    fn complete(&self) -> bool {
        self.scripts_ready() && self.styles_loaded >= self.requested.styles
    }
}

/// Runtime for a single plugin instance.
pub struct PluginRuntime {
    container: Container,
    channel: ChannelHandle,
    loader: ResourceLoader,
    load_events: mpsc::UnboundedReceiver<LoadEvent>,
    table: DispatchTable,
    behavior: Option<BoxedBehavior>,
    registry: Arc<BehaviorRegistry>,
    state: PluginState,
    generation: u64,
    barrier: Option<LoadBarrier>,
    options: RuntimeOptions,
}

impl PluginRuntime {
    pub fn new(
        container: impl Into<String>,
        channel: ChannelHandle,
        host: Arc<dyn ResourceHost>,
        registry: Arc<BehaviorRegistry>,
        options: RuntimeOptions,
    ) -> Self {
        let (events_tx, load_events) = mpsc::unbounded_channel();
        Self {
            container: Container::new(container),
            channel,
            loader: ResourceLoader::new(host, events_tx),
            load_events,
            table: DispatchTable::new(),
            behavior: None,
            registry,
            state: PluginState::Uninitialized,
            generation: 0,
            barrier: None,
            options,
        }
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    /// Current load generation; bumped by every load and unload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resources registered by the current load.
    pub fn registered_resources(&self) -> &[(ResourceKind, String)] {
        self.loader.registered()
    }

    /// Whether a load is still waiting for completions.
    pub fn is_loading(&self) -> bool {
        self.barrier.as_ref().is_some_and(|b| !b.acknowledged)
    }

    pub fn load_deadline(&self) -> Option<Instant> {
        self.barrier.as_ref().and_then(|b| b.deadline)
    }

    /// The dispatch table, for registering extra command aliases.
    pub fn dispatch_table_mut(&mut self) -> &mut DispatchTable {
        &mut self.table
    }

    // =========================================================================
    // Inbound traffic
    // =========================================================================

    /// Handles one inbound channel message.
    ///
    /// Commands are applied in order. A failing element is answered with an
    /// `error:` reply and the next element still runs.
    pub async fn handle_message(&mut self, text: &str) {
        match parse_inbound(text) {
            Inbound::Commands(commands) => {
                for command in commands {
                    if let Err(e) = self.dispatch(command).await {
                        warn!(container = %self.container.id(), error = %e, "Rejected command");
                        self.reply(error_reply(&e)).await;
                    }
                    if self.channel.is_closed() {
                        break;
                    }
                }
            }
            Inbound::ApiResponse(frame) => self.handle_api_response(&frame).await,
        }
    }

    async fn dispatch(&mut self, command: ProtocolResult<RawCommand>) -> ProtocolResult<()> {
        let command = self.table.parse(&command?)?;
        trace!(container = %self.container.id(), kind = ?command.kind(), "Applying command");
        self.apply(command).await;
        Ok(())
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::Write(text) => self.container.write(&text),
            Command::InnerDiv(markup) => self.container.set_content(markup),
            Command::Clear => self.container.clear(),
            Command::Load(spec) => self.load(spec).await,
            Command::Unload => self.unload().await,
            Command::SetCss(rules) => {
                self.container.apply_css(&rules);
                self.reply(CSS_APPLIED).await;
            }
            Command::GetCss(properties) => {
                let report = self.container.query_css(&properties);
                self.reply(report).await;
            }
            Command::Invoke(request) => self.invoke(request).await,
            Command::Close => self.close().await,
        }
    }

    async fn invoke(&mut self, request: InvokeRequest) {
        let InvokeRequest { method, args } = request;
        let reply = match self.behavior.as_mut() {
            Some(behavior) => {
                let result = behavior.invoke(&method, args).await;
                if let Err(e) = &result {
                    debug!(container = %self.container.id(), method = %method, error = %e, "Invoke failed");
                }
                invoke_reply(&method, &result)
            }
            None => NO_INSTANCE.to_string(),
        };
        self.reply(reply).await;
    }

    /// Routes the answer to a plugin configuration request to the behavior.
    async fn handle_api_response(&mut self, frame: &str) {
        let response = match ApiResponse::parse(frame) {
            Ok(response) => response,
            Err(e) => {
                warn!(container = %self.container.id(), error = %e, "Dropping unrecognised frame");
                return;
            }
        };

        if response.status.is_fail() {
            warn!(
                container = %self.container.id(),
                action = %response.action,
                payload = %response.payload,
                "Plugin API request failed"
            );
            return;
        }

        let event = match response.known_action() {
            Some(ApiAction::GetOpt) => {
                let (setting, value) = response
                    .payload
                    .split_once(':')
                    .unwrap_or((response.payload.as_str(), ""));
                ConfigEvent::Get {
                    setting: setting.to_string(),
                    value: value.to_string(),
                }
            }
            Some(ApiAction::SetOpt | ApiAction::SetCfg) => ConfigEvent::Set(response.payload),
            _ => {
                debug!(container = %self.container.id(), action = %response.action, "Ignoring API response");
                return;
            }
        };

        match self.behavior.as_mut() {
            Some(behavior) => behavior.on_config(event).await,
            None => debug!(container = %self.container.id(), "No behavior for config response"),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts loading `spec`, tearing down any previous load first.
    pub async fn load(&mut self, spec: ResourceSpec) {
        if !matches!(self.state, PluginState::Uninitialized | PluginState::Closed) {
            debug!(container = %self.container.id(), state = %self.state, "Replacing active load");
            self.unload().await;
        }

        self.container.attach();
        self.generation += 1;
        let requested = self.loader.request_load(&spec, self.generation);
        let main = spec.main_type().map(str::to_string);

        info!(
            container = %self.container.id(),
            generation = self.generation,
            styles = requested.styles,
            scripts = requested.scripts,
            main = ?main,
            "Plugin load started"
        );

        let deadline = Instant::now() + self.options.load_timeout;
        self.barrier = Some(LoadBarrier::new(requested, main, deadline));
        self.state = PluginState::AwaitingResources;
        self.evaluate_barriers().await;
    }

    /// Applies one resource completion. Completions from an earlier
    /// generation are ignored.
    pub async fn on_load_event(&mut self, event: LoadEvent) {
        if self.barrier.is_none() || event.generation != self.generation {
            trace!(
                container = %self.container.id(),
                url = %event.url,
                event_generation = event.generation,
                generation = self.generation,
                "Ignoring stale resource completion"
            );
            return;
        }

        if let Err(e) = event.result {
            warn!(container = %self.container.id(), error = %e, "Resource load failed");
            self.reply(error_reply(&e)).await;
            self.unload().await;
            return;
        }

        if let Some(barrier) = self.barrier.as_mut() {
            match event.kind {
                ResourceKind::Style => barrier.styles_loaded += 1,
                ResourceKind::Script => barrier.scripts_loaded += 1,
            }
        }
        trace!(container = %self.container.id(), kind = %event.kind, url = %event.url, "Resource loaded");
        self.evaluate_barriers().await;
    }

    /// Waits for the next resource completion and applies it.
    ///
    /// For driving a runtime by hand instead of through [`run`](Self::run).
    pub async fn process_load_event(&mut self) {
        if let Some(event) = self.load_events.recv().await {
            self.on_load_event(event).await;
        }
    }

    async fn evaluate_barriers(&mut self) {
        let Some(barrier) = self.barrier.as_mut() else {
            return;
        };

        if !barrier.instantiated && barrier.scripts_ready() {
            barrier.instantiated = true;
            let main = barrier.main.clone();
            self.instantiate(main).await;
        }

        let Some(barrier) = self.barrier.as_mut() else {
            return;
        };

        if !barrier.acknowledged && barrier.complete() {
            barrier.acknowledged = true;
            barrier.deadline = None;
            info!(container = %self.container.id(), generation = self.generation, "Plugin loaded");
            self.reply(LOADED_ACK).await;
        }
    }

    async fn instantiate(&mut self, main: Option<String>) {
        self.state = PluginState::Instantiating;

        if let Some(name) = main {
            let conf = PluginConf::new(self.container.id(), self.channel.clone());
            match self.registry.create(&name, conf) {
                Ok(behavior) => {
                    info!(container = %self.container.id(), behavior = %name, "Behavior constructed");
                    self.behavior = Some(behavior);
                }
                Err(e) => {
                    warn!(container = %self.container.id(), error = %e, "Behavior construction failed");
                    self.reply(error_reply(&e)).await;
                }
            }
        }

        self.state = PluginState::Ready;
    }

    /// Fails the current load if it is still incomplete.
    pub async fn on_deadline(&mut self) {
        if !self.is_loading() {
            return;
        }

        let error = RuntimeError::LoadTimeout(self.options.load_timeout.as_millis());
        warn!(container = %self.container.id(), generation = self.generation, "Resource load timed out");
        self.reply(error_reply(&error)).await;
        self.unload().await;
    }

    /// Tears the instance down. Valid from every state and idempotent.
    pub async fn unload(&mut self) {
        let previous = self.state;
        self.state = PluginState::Unloading;

        if let Some(mut behavior) = self.behavior.take() {
            behavior.destroy().await;
        }
        self.container.clear();
        self.loader.release_all();
        self.barrier = None;
        self.generation += 1;
        self.container.detach();
        self.state = PluginState::Closed;

        if previous != PluginState::Closed {
            info!(container = %self.container.id(), from = %previous, "Plugin unloaded");
        }
    }

    /// Closes the channel, then unloads.
    pub async fn close(&mut self) {
        self.channel.close();
        self.unload().await;
    }

    async fn reply(&mut self, text: impl Into<String>) {
        if let Err(e) = self.channel.send(text).await {
            debug!(container = %self.container.id(), error = %e, "Reply dropped");
        }
    }

    // =========================================================================
    // Task loop
    // =========================================================================

    /// Runs the instance until its channel closes or is lost.
    ///
    /// Sends the channel name as the opening handshake, then processes
    /// inbound events, resource completions and the load deadline one at a
    /// time. Always ends unloaded with the channel closed.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<ChannelEvent>) {
        let mut closed = self.channel.subscribe_close();
        let name = self.channel.name().to_string();

        info!(container = %self.container.id(), channel = %name, "Plugin runtime started");
        self.reply(name).await;

        while !self.channel.is_closed() {
            let deadline = self.load_deadline();
            tokio::select! {
                changed = closed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = inbound.recv() => match event {
                    Some(ChannelEvent::Message(text)) => self.handle_message(&text).await,
                    Some(ChannelEvent::Disconnected) | None => {
                        info!(container = %self.container.id(), "Plugin channel lost");
                        break;
                    }
                },
                Some(event) = self.load_events.recv() => self.on_load_event(event).await,
                () = wait_until(deadline) => self.on_deadline().await,
            }
        }

        self.close().await;
        info!(container = %self.container.id(), "Plugin runtime stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("container", &self.container.id())
            .field("channel", &self.channel.name())
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use async_trait::async_trait;
    use mirra_core::{
        Behavior, BehaviorError, BehaviorResult, MemoryResourceHost, ResourceError,
        ResourceResult,
    };
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn strip_query(url: &str) -> &str {
        url.split_once('?').map_or(url, |(path, _)| path)
    }

    /// Host whose fetches complete only when the test opens their gate.
    #[derive(Default)]
    struct GatedHost {
        gates: Mutex<HashMap<String, oneshot::Sender<ResourceResult<()>>>>,
        attached: Mutex<Vec<String>>,
    }

    impl GatedHost {
        async fn open(&self, path: &str, result: ResourceResult<()>) {
            loop {
                let gate = self.gates.lock().remove(path);
                if let Some(gate) = gate {
                    let _ = gate.send(result);
                    return;
                }
                tokio::task::yield_now().await;
            }
        }

        fn attached(&self) -> Vec<String> {
            self.attached.lock().clone()
        }
    }

    #[async_trait]
    impl ResourceHost for GatedHost {
        async fn attach(&self, _kind: ResourceKind, url: &str) -> ResourceResult<()> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(strip_query(url).to_string(), tx);
            let result = rx.await.unwrap_or(Ok(()));
            if result.is_ok() {
                self.attached.lock().push(url.to_string());
            }
            result
        }

        fn detach(&self, _kind: ResourceKind, url: &str) {
            self.attached.lock().retain(|u| u != url);
        }
    }

    #[derive(Debug, Default)]
    struct ProbeLog {
        constructed: usize,
        destroyed: usize,
        config: Vec<ConfigEvent>,
    }

    struct Probe {
        log: Arc<Mutex<ProbeLog>>,
    }

    #[async_trait]
    impl Behavior for Probe {
        async fn invoke(&mut self, method: &str, args: Value) -> BehaviorResult<Value> {
            match method {
                "echo" => Ok(args),
                "fail" => Err(BehaviorError::Failed("probe failed".into())),
                other => Err(BehaviorError::UnknownMethod(other.to_string())),
            }
        }

        async fn on_config(&mut self, event: ConfigEvent) {
            self.log.lock().config.push(event);
        }

        async fn destroy(&mut self) {
            self.log.lock().destroyed += 1;
        }
    }

    fn probe_registry() -> (Arc<BehaviorRegistry>, Arc<Mutex<ProbeLog>>) {
        let log = Arc::new(Mutex::new(ProbeLog::default()));
        let mut registry = BehaviorRegistry::new();
        let shared = Arc::clone(&log);
        registry.register("Probe", move |_conf| {
            shared.lock().constructed += 1;
            Box::new(Probe {
                log: Arc::clone(&shared),
            })
        });
        (Arc::new(registry), log)
    }

    fn runtime_with(
        host: Arc<dyn ResourceHost>,
    ) -> (PluginRuntime, mpsc::Receiver<String>, Arc<Mutex<ProbeLog>>) {
        let (channel, outbound) = ChannelHandle::pair("probe", 32);
        let (registry, log) = probe_registry();
        let runtime =
            PluginRuntime::new("probeDiv", channel, host, registry, RuntimeOptions::default());
        (runtime, outbound, log)
    }

    fn spec(css: &[&str], js: &[&str], main: Option<&str>) -> ResourceSpec {
        ResourceSpec {
            css: css.iter().map(|s| s.to_string()).collect(),
            js: js.iter().map(|s| s.to_string()).collect(),
            main: main.map(str::to_string),
        }
    }

    fn drain(outbound: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn assert_torn_down(runtime: &PluginRuntime) {
        assert_eq!(runtime.state(), PluginState::Closed);
        assert_eq!(runtime.container().content(), "");
        assert!(runtime.registered_resources().is_empty());
        assert!(!runtime.is_loading());
        assert!(runtime.load_deadline().is_none());
        assert!(!runtime.container().is_attached());
        assert!(!runtime.has_behavior());
    }

    // -------------------------------------------------------------------------
    // Barriers
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_ack_after_all_completions_and_behavior_after_scripts() {
        let host = Arc::new(GatedHost::default());
        let (mut runtime, mut outbound, log) = runtime_with(host.clone());

        runtime
            .load(spec(&["a.css", "b.css"], &["c.js"], Some("Probe")))
            .await;
        assert_eq!(runtime.state(), PluginState::AwaitingResources);

        host.open("a.css", Ok(())).await;
        runtime.process_load_event().await;
        assert!(!runtime.has_behavior());
        assert!(drain(&mut outbound).is_empty());

        host.open("c.js", Ok(())).await;
        runtime.process_load_event().await;
        assert_eq!(runtime.state(), PluginState::Ready);
        assert_eq!(log.lock().constructed, 1);
        assert!(drain(&mut outbound).is_empty());

        host.open("b.css", Ok(())).await;
        runtime.process_load_event().await;
        assert_eq!(drain(&mut outbound), [LOADED_ACK]);
        assert_eq!(log.lock().constructed, 1);
        assert!(!runtime.is_loading());
        assert_eq!(host.attached().len(), 3);
    }

    #[tokio::test]
    async fn test_no_main_still_acknowledges() {
        let host = Arc::new(GatedHost::default());
        let (mut runtime, mut outbound, log) = runtime_with(host.clone());

        runtime.load(spec(&[], &["c.js"], None)).await;
        host.open("c.js", Ok(())).await;
        runtime.process_load_event().await;

        assert_eq!(drain(&mut outbound), [LOADED_ACK]);
        assert_eq!(log.lock().constructed, 0);
        assert!(!runtime.has_behavior());
    }

    #[tokio::test]
    async fn test_empty_load_completes_immediately() {
        let (mut runtime, mut outbound, log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime.load(spec(&["", ""], &[], Some("Probe"))).await;

        assert_eq!(drain(&mut outbound), [LOADED_ACK]);
        assert_eq!(log.lock().constructed, 1);
        assert_eq!(runtime.state(), PluginState::Ready);
        assert!(runtime.registered_resources().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_main_reports_and_continues() {
        let (mut runtime, mut outbound, _log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime.load(spec(&[], &[], Some("Missing"))).await;

        assert_eq!(
            drain(&mut outbound),
            ["error:behavior 'Missing' is not registered", LOADED_ACK]
        );
        assert_eq!(runtime.state(), PluginState::Ready);
        assert!(!runtime.has_behavior());
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let host = Arc::new(GatedHost::default());
        let (mut runtime, mut outbound, _log) = runtime_with(host.clone());

        runtime.load(spec(&["a.css"], &[], None)).await;
        let stale = runtime.generation();
        runtime.load(spec(&["b.css"], &[], None)).await;

        runtime
            .on_load_event(LoadEvent {
                generation: stale,
                kind: ResourceKind::Style,
                url: "a.css?1".into(),
                result: Ok(()),
            })
            .await;
        assert!(runtime.is_loading());
        assert!(drain(&mut outbound).is_empty());

        host.open("b.css", Ok(())).await;
        runtime.process_load_event().await;
        assert_eq!(drain(&mut outbound), [LOADED_ACK]);
    }

    #[tokio::test]
    async fn test_fetch_failure_replies_and_unloads() {
        let host = Arc::new(GatedHost::default());
        let (mut runtime, mut outbound, _log) = runtime_with(host.clone());

        runtime.load(spec(&["a.css"], &["b.js"], Some("Probe"))).await;
        host.open("b.js", Err(ResourceError::fetch_failed("b.js?9", "404")))
            .await;
        runtime.process_load_event().await;

        assert_eq!(drain(&mut outbound), ["error:failed to load b.js?9: 404"]);
        assert_torn_down(&runtime);
    }

    #[tokio::test]
    async fn test_deadline_fails_incomplete_load() {
        let host = Arc::new(GatedHost::default());
        let (mut runtime, mut outbound, _log) = runtime_with(host.clone());

        runtime.load(spec(&["a.css"], &[], None)).await;
        assert!(runtime.load_deadline().is_some());
        runtime.on_deadline().await;

        assert_eq!(
            drain(&mut outbound),
            ["error:resource load timed out after 30000ms"]
        );
        assert_torn_down(&runtime);

        // Nothing left to time out.
        runtime.on_deadline().await;
        assert!(drain(&mut outbound).is_empty());
    }

    // -------------------------------------------------------------------------
    // Unload
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_unload_from_every_state_is_idempotent() {
        let host = Arc::new(GatedHost::default());

        // Uninitialized
        let (mut runtime, _outbound, _log) = runtime_with(host.clone());
        runtime.handle_message(r#"{"command":"write","data":"x"}"#).await;
        runtime.unload().await;
        assert_torn_down(&runtime);
        runtime.unload().await;
        assert_torn_down(&runtime);

        // AwaitingResources
        let (mut runtime, _outbound, _log) = runtime_with(host.clone());
        runtime.load(spec(&["a.css"], &["b.js"], Some("Probe"))).await;
        assert_eq!(runtime.registered_resources().len(), 2);
        runtime.unload().await;
        assert_torn_down(&runtime);
        runtime.unload().await;
        assert_torn_down(&runtime);

        // Ready
        let (mut runtime, _outbound, log) = runtime_with(Arc::new(MemoryResourceHost::new()));
        runtime.load(spec(&[], &[], Some("Probe"))).await;
        runtime.handle_message(r#"{"command":"innerdiv","data":"<b>hi</b>"}"#).await;
        runtime.unload().await;
        assert_torn_down(&runtime);
        runtime.unload().await;
        assert_eq!(log.lock().destroyed, 1);
    }

    #[tokio::test]
    async fn test_unload_detaches_attached_resources() {
        let host = Arc::new(MemoryResourceHost::new());
        let (mut runtime, _outbound, _log) = runtime_with(host.clone());

        runtime.load(spec(&["a.css"], &["b.js"], None)).await;
        runtime.process_load_event().await;
        runtime.process_load_event().await;
        assert_eq!(host.attached().len(), 2);

        runtime.handle_message(r#"{"command":"unload"}"#).await;
        assert!(host.attached().is_empty());
        assert_torn_down(&runtime);
    }

    #[tokio::test]
    async fn test_reload_tears_down_previous_instance() {
        let (mut runtime, mut outbound, log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime.load(spec(&[], &[], Some("Probe"))).await;
        runtime.load(spec(&[], &[], Some("Probe"))).await;

        let log = log.lock();
        assert_eq!(log.constructed, 2);
        assert_eq!(log.destroyed, 1);
        assert_eq!(drain(&mut outbound), [LOADED_ACK, LOADED_ACK]);
        assert!(runtime.container().is_attached());
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_content_commands() {
        let (mut runtime, _outbound, _log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime
            .handle_message(r#"[{"command":"write","data":"a\nb"},{"command":"write","data":"c"}]"#)
            .await;
        assert_eq!(runtime.container().content(), "a<br>bc");

        runtime.handle_message(r#"{"command":"innerdiv","data":"<i>x</i>"}"#).await;
        assert_eq!(runtime.container().content(), "<i>x</i>");

        runtime.handle_message(r#"{"command":"clear"}"#).await;
        assert_eq!(runtime.container().content(), "");
    }

    #[tokio::test]
    async fn test_css_round_trip() {
        let (mut runtime, mut outbound, _log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime
            .handle_message(r#"{"command":"setcss","data":"left=10px;top=5px;color=red;"}"#)
            .await;
        runtime
            .handle_message(r#"{"command":"setcss","data":"top=NULL;color="}"#)
            .await;
        runtime
            .handle_message(r#"{"command":"getcss","data":"left,top,,color"}"#)
            .await;

        assert_eq!(
            drain(&mut outbound),
            [CSS_APPLIED, CSS_APPLIED, "left=10px\ntop=NULL\ncolor=NULL\n"]
        );
    }

    #[tokio::test]
    async fn test_invoke_replies() {
        let (mut runtime, mut outbound, _log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime
            .handle_message(r#"{"command":"jsPluginCmd","data":{"method":"echo","args":1}}"#)
            .await;
        assert_eq!(drain(&mut outbound), [NO_INSTANCE]);

        runtime.load(spec(&[], &[], Some("Probe"))).await;
        drain(&mut outbound);

        runtime
            .handle_message(r#"{"command":"invoke","data":"{\"fn\":\"echo\",\"args\":\"hi\"}"}"#)
            .await;
        runtime
            .handle_message(r#"{"command":"invoke","data":{"method":"fail"}}"#)
            .await;
        runtime
            .handle_message(r#"{"command":"invoke","data":{"method":"spin"}}"#)
            .await;

        assert_eq!(
            drain(&mut outbound),
            ["echo:hi", "fail:probe failed", "spin:spin is not a function"]
        );
    }

    #[tokio::test]
    async fn test_bad_elements_do_not_stop_the_batch() {
        let (mut runtime, mut outbound, _log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime
            .handle_message(
                r#"[{"command":"write","data":"a"},{"command":"bogus"},{"data":"x"},{"command":"write","data":"b"}]"#,
            )
            .await;

        assert_eq!(runtime.container().content(), "ab");
        let replies = drain(&mut outbound);
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0], "error:unknown command 'bogus'");
        assert!(replies[1].starts_with("error:malformed message:"));
    }

    #[tokio::test]
    async fn test_close_command_closes_channel() {
        let (mut runtime, _outbound, log) = runtime_with(Arc::new(MemoryResourceHost::new()));

        runtime.load(spec(&[], &[], Some("Probe"))).await;
        runtime
            .handle_message(r#"[{"command":"close"},{"command":"write","data":"late"}]"#)
            .await;

        assert!(runtime.channel().is_closed());
        assert_torn_down(&runtime);
        assert_eq!(log.lock().destroyed, 1);
    }

    #[tokio::test]
    async fn test_config_responses_reach_behavior() {
        let (mut runtime, _outbound, log) = runtime_with(Arc::new(MemoryResourceHost::new()));
        runtime.load(spec(&[], &[], Some("Probe"))).await;

        runtime.handle_message("[API]:getopt:success:probeDiv:period:10").await;
        runtime.handle_message("[API]:setopt:success:probeDiv:saved").await;
        runtime.handle_message("[API]:getopt:fail:probeDiv:no such option").await;
        runtime.handle_message("[API]:list:success::a\nb").await;
        runtime.handle_message("garbage").await;

        assert_eq!(
            log.lock().config,
            [
                ConfigEvent::Get {
                    setting: "period".into(),
                    value: "10".into()
                },
                ConfigEvent::Set("saved".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_behavior_can_request_config() {
        let (channel, mut outbound) = ChannelHandle::pair("probe", 8);
        let mut registry = BehaviorRegistry::new();
        registry.register("Asker", |conf: PluginConf| {
            struct Asker(PluginConf);

            #[async_trait]
            impl Behavior for Asker {
                async fn invoke(&mut self, _method: &str, _args: Value) -> BehaviorResult<Value> {
                    self.0
                        .get("period")
                        .await
                        .map_err(|e| BehaviorError::Failed(e.to_string()))?;
                    Ok(json!(true))
                }
            }

            Box::new(Asker(conf))
        });
        let mut runtime = PluginRuntime::new(
            "askDiv",
            channel,
            Arc::new(MemoryResourceHost::new()),
            Arc::new(registry),
            RuntimeOptions::default(),
        );

        runtime.load(spec(&[], &[], Some("Asker"))).await;
        runtime
            .handle_message(r#"{"command":"invoke","data":{"method":"ask"}}"#)
            .await;

        assert_eq!(
            drain(&mut outbound),
            [LOADED_ACK, "[API]\ngetopt\naskDiv\nperiod", "ask:true"]
        );
    }

    // -------------------------------------------------------------------------
    // Task loop
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_run_end_to_end() {
        let host = Arc::new(MemoryResourceHost::new());
        let (channel, mut outbound) = ChannelHandle::pair("Foo", 16);
        let (registry, log) = probe_registry();
        let mut registry = Arc::unwrap_or_clone(registry);
        let shared = Arc::clone(&log);
        registry.register("Foo", move |_conf| {
            shared.lock().constructed += 1;
            Box::new(Probe {
                log: Arc::clone(&shared),
            })
        });

        let runtime = PluginRuntime::new(
            "fooDiv",
            channel.clone(),
            host.clone(),
            Arc::new(registry),
            RuntimeOptions::default(),
        );
        let (events_tx, events_rx) = mpsc::channel(8);
        let task = tokio::spawn(runtime.run(events_rx));

        assert_eq!(outbound.recv().await.unwrap(), "Foo");

        events_tx
            .send(ChannelEvent::Message(
                r#"{"command":"load","data":{"css":["a.css"],"js":["b.js"],"main":"Foo"}}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(outbound.recv().await.unwrap(), LOADED_ACK);
        assert_eq!(log.lock().constructed, 1);
        assert_eq!(host.attached().len(), 2);

        events_tx
            .send(ChannelEvent::Message(
                r#"{"command":"getcss","data":"left,top"}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(outbound.recv().await.unwrap(), "left=NULL\ntop=NULL\n");

        events_tx
            .send(ChannelEvent::Message(r#"{"command":"close"}"#.into()))
            .await
            .unwrap();
        task.await.unwrap();

        assert!(channel.is_closed());
        assert!(host.attached().is_empty());
        assert_eq!(log.lock().destroyed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_disconnect() {
        let host = Arc::new(MemoryResourceHost::new());
        let (channel, mut outbound) = ChannelHandle::pair("gone", 8);
        let (registry, _log) = probe_registry();
        let runtime =
            PluginRuntime::new("goneDiv", channel.clone(), host, registry, RuntimeOptions::default());

        let (events_tx, events_rx) = mpsc::channel(8);
        let task = tokio::spawn(runtime.run(events_rx));
        assert_eq!(outbound.recv().await.unwrap(), "gone");

        events_tx.send(ChannelEvent::Disconnected).await.unwrap();
        task.await.unwrap();
        assert!(channel.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_stalled_load() {
        let host = Arc::new(GatedHost::default());
        let (channel, mut outbound) = ChannelHandle::pair("slow", 8);
        let runtime = PluginRuntime::new(
            "slowDiv",
            channel.clone(),
            host.clone(),
            Arc::new(BehaviorRegistry::new()),
            RuntimeOptions {
                load_timeout: Duration::from_millis(250),
            },
        );

        let (events_tx, events_rx) = mpsc::channel(8);
        let task = tokio::spawn(runtime.run(events_rx));
        assert_eq!(outbound.recv().await.unwrap(), "slow");

        events_tx
            .send(ChannelEvent::Message(
                r#"{"command":"load","data":{"css":["a.css"]}}"#.into(),
            ))
            .await
            .unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            "error:resource load timed out after 250ms"
        );

        channel.close();
        task.await.unwrap();
        assert!(host.attached().is_empty());
    }
}
