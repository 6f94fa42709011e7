//! The API correlation client.
//!
//! One client speaks for one control panel over one channel. Every call it
//! sends carries the client's identifier; every response is matched back to
//! the client by that identifier and then routed by its action.
//!
//! ```text
//!            send(call)                 ┌──────────────┐
//! caller ──────────────▶ ApiClient ───▶│ orchestrator │
//!   ▲                       │           └──────┬───────┘
//!   │ waiter / callback     │ handle_frame     │ id:action:status:plugin:payload
//!   └───────────────────────┴◀─────────────────┘
//! ```
//!
//! A response goes to the oldest pending [`request`](ApiClient::request)
//! waiting on its action if there is one, and otherwise to the callback
//! registered with [`on`](ApiClient::on). Anything else is dropped.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mirra_core::{
    ApiAction, ApiCall, ApiResponse, ApiStatus, ChannelConfig, ChannelHandle, ChannelHandler,
    ConnectFn, registered_connector,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::decode::{ApiPayload, PayloadDecoders};
use crate::error::{ApiError, ApiResult};

/// Sub-protocol of the API channel.
pub const API_PROTOCOL: &str = "STDIN";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A routed, decoded API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEvent {
    pub action: ApiAction,
    pub status: ApiStatus,
    /// Target plugin, empty for global actions.
    pub plugin: String,
    pub payload: ApiPayload,
}

impl ApiEvent {
    pub fn is_success(&self) -> bool {
        self.status == ApiStatus::Success
    }
}

/// Callback invoked with every response for one action.
pub type Callback = Arc<dyn Fn(ApiEvent) + Send + Sync>;

/// Routing state shared between the client and its channel handler.
struct Router {
    id: String,
    decoders: RwLock<PayloadDecoders>,
    callbacks: Mutex<HashMap<ApiAction, Callback>>,
    waiters: Mutex<HashMap<ApiAction, VecDeque<oneshot::Sender<ApiEvent>>>>,
}

impl Router {
    fn new() -> Self {
        Self {
            id: format!("mirrorAPI{}", uuid::Uuid::new_v4().simple()),
            decoders: RwLock::new(PayloadDecoders::new()),
            callbacks: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    fn route(&self, frame: &str) -> bool {
        let response = match ApiResponse::parse(frame) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Dropping unparseable API frame");
                return false;
            }
        };

        if response.id != self.id {
            trace!(id = %response.id, "Dropping response for another client");
            return false;
        }

        let Some(action) = response.known_action() else {
            debug!(action = %response.action, "Dropping response for unknown action");
            return false;
        };

        // Failures carry a message, not the action's payload shape.
        let payload = if response.status.is_fail() {
            ApiPayload::Text {
                text: response.payload,
            }
        } else {
            match self.decoders.read().decode(action, &response.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(action = %action, error = %e, "Delivering undecodable payload as text");
                    ApiPayload::Text {
                        text: response.payload,
                    }
                }
            }
        };

        let mut event = ApiEvent {
            action,
            status: response.status,
            plugin: response.plugin,
            payload,
        };

        // Oldest live waiter first.
        loop {
            let waiter = self
                .waiters
                .lock()
                .get_mut(&action)
                .and_then(VecDeque::pop_front);
            let Some(waiter) = waiter else {
                break;
            };
            match waiter.send(event) {
                Ok(()) => return true,
                Err(returned) => event = returned,
            }
        }

        let callback = self.callbacks.lock().get(&action).cloned();
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => {
                trace!(action = %action, "No callback for response");
                false
            }
        }
    }
}

/// Feeds channel frames into a [`Router`].
struct RouterHandler(Arc<Router>);

#[async_trait]
impl ChannelHandler for RouterHandler {
    async fn on_message(&self, _channel: &str, text: String) {
        self.0.route(&text);
    }

    async fn on_disconnect(&self, channel: &str) {
        warn!(channel = %channel, "API channel lost");
        self.0.waiters.lock().clear();
    }
}

/// Client for the orchestrator's API.
#[derive(Clone)]
pub struct ApiClient {
    router: Arc<Router>,
    channel: ChannelHandle,
    request_timeout: Duration,
}

impl ApiClient {
    /// Wraps an already open channel. Inbound frames must be passed to
    /// [`handle_frame`](Self::handle_frame).
    pub fn new(channel: ChannelHandle) -> Self {
        Self {
            router: Arc::new(Router::new()),
            channel,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Connects to `url` with the `STDIN` sub-protocol through the registered
    /// connector. Returns once the channel is open.
    pub async fn connect(url: impl Into<String>) -> ApiResult<Self> {
        // Referencing the transport keeps it linked, so its connector is registered.
        #[cfg(feature = "ws-client")]
        let _ = mirra_transport::ws_connect;

        let connect = registered_connector().ok_or(ApiError::NotConnected)?;
        Self::connect_with(connect, ChannelConfig::new(url, API_PROTOCOL)).await
    }

    /// Connects through `connect` with an explicit channel configuration.
    pub async fn connect_with(connect: ConnectFn, config: ChannelConfig) -> ApiResult<Self> {
        let router = Arc::new(Router::new());
        let url = config.url.clone();
        let channel = connect(config, Arc::new(RouterHandler(Arc::clone(&router)))).await?;
        debug!(url = %url, id = %router.id, "API client connected");

        Ok(Self {
            router,
            channel,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Sets how long [`request`](Self::request) waits for its response.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// This client's correlation identifier.
    pub fn id(&self) -> &str {
        &self.router.id
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Sets the callback for `action`, replacing any previous one.
    pub fn on<F>(&self, action: ApiAction, callback: F)
    where
        F: Fn(ApiEvent) + Send + Sync + 'static,
    {
        if self
            .router
            .callbacks
            .lock()
            .insert(action, Arc::new(callback))
            .is_some()
        {
            debug!(action = %action, "Replaced API callback");
        }
    }

    /// Removes the callback for `action`. Returns whether there was one.
    pub fn off(&self, action: ApiAction) -> bool {
        self.router.callbacks.lock().remove(&action).is_some()
    }

    /// Replaces how payloads of `action` are decoded.
    pub fn register_decoder<F>(&self, action: ApiAction, decoder: F)
    where
        F: Fn(ApiAction, &str) -> ApiResult<ApiPayload> + Send + Sync + 'static,
    {
        self.router.decoders.write().register(action, decoder);
    }

    /// Routes one inbound frame. Returns whether it was delivered.
    pub fn handle_frame(&self, frame: &str) -> bool {
        self.router.route(frame)
    }

    /// Sends `call` stamped with this client's id.
    pub async fn send(&self, call: ApiCall) -> ApiResult<()> {
        let call = call.with_id(self.router.id.clone());
        trace!(action = %call.action, "Sending API call");
        self.channel.send(call.encode()).await?;
        Ok(())
    }

    /// Sends `call` and waits for the next response to its action.
    pub async fn request(&self, call: ApiCall) -> ApiResult<ApiEvent> {
        let action = call.action;
        let (tx, rx) = oneshot::channel();
        self.router
            .waiters
            .lock()
            .entry(action)
            .or_default()
            .push_back(tx);

        self.send(call).await?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(ApiError::Transport(mirra_core::TransportError::ConnectionClosed {
                reason: "API channel lost while waiting for a response".to_string(),
            })),
            Err(_) => Err(ApiError::Timeout {
                action,
                ms: self.request_timeout.as_millis(),
            }),
        }
    }

    /// Closes the API channel.
    pub fn close(&self) {
        self.channel.close();
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("id", &self.router.id)
            .field("channel", &self.channel.name())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::FutureExt;
    use futures::future::BoxFuture;
    use mirra_core::TransportResult;
    use tokio::sync::mpsc;

    use crate::call;

    fn client() -> (ApiClient, mpsc::Receiver<String>) {
        let (channel, outbound) = ChannelHandle::pair(API_PROTOCOL, 8);
        (ApiClient::new(channel), outbound)
    }

    fn collect(client: &ApiClient, action: ApiAction) -> Arc<Mutex<Vec<ApiEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on(action, move |event| sink.lock().push(event));
        seen
    }

    #[test]
    fn test_identifier_shape() {
        let (a, _rx) = client();
        let (b, _rx) = client();
        assert!(a.id().starts_with("mirrorAPI"));
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_send_stamps_id() {
        let (client, mut outbound) = client();
        client.send(call::getopt("clock", "period")).await.unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            format!("{}\ngetopt\nclock\nperiod", client.id())
        );
    }

    #[test]
    fn test_routes_by_action() {
        let (client, _rx) = client();
        let lists = collect(&client, ApiAction::List);
        let sizes = collect(&client, ApiAction::MirrorSize);

        let id = client.id().to_string();
        assert!(client.handle_frame(&format!("{id}:list:success::clock\nweather")));
        assert!(client.handle_frame(&format!("{id}:mirrorsize:success::800x480")));

        assert_eq!(
            lists.lock()[0].payload,
            ApiPayload::Lines {
                lines: vec!["clock".into(), "weather".into()]
            }
        );
        assert_eq!(
            sizes.lock()[0].payload,
            ApiPayload::Dimensions {
                width: 800,
                height: 480
            }
        );
    }

    #[test]
    fn test_uncallbacked_and_foreign_responses_are_dropped() {
        let (client, _rx) = client();
        let enables = collect(&client, ApiAction::Enable);
        let id = client.id().to_string();

        assert!(!client.handle_frame(&format!("{id}:disable:success:clock:")));
        assert!(!client.handle_frame("mirrorAPIother:enable:success:clock:"));
        assert!(!client.handle_frame(&format!("{id}:reboot:success::")));
        assert!(!client.handle_frame("nonsense"));
        assert!(enables.lock().is_empty());

        assert!(client.handle_frame(&format!("{id}:enable:fail:clock:not installed")));
        let event = enables.lock()[0].clone();
        assert!(!event.is_success());
        assert_eq!(event.plugin, "clock");
        assert_eq!(event.payload.as_text(), Some("not installed"));
    }

    #[test]
    fn test_reregistering_replaces_callback() {
        let (client, _rx) = client();
        let first = collect(&client, ApiAction::GetState);
        let second = collect(&client, ApiAction::GetState);

        client.handle_frame(&format!("{}:getstate:success:clock:enabled", client.id()));
        assert!(first.lock().is_empty());
        assert_eq!(second.lock().len(), 1);

        assert!(client.off(ApiAction::GetState));
        assert!(!client.handle_frame(&format!("{}:getstate:success:clock:enabled", client.id())));
    }

    #[tokio::test]
    async fn test_request_takes_precedence_over_callback() {
        let (client, mut outbound) = client();
        let callbacks = collect(&client, ApiAction::GetCss);

        let requester = client.clone();
        let pending =
            tokio::spawn(async move { requester.request(call::getcss("clock", &["left"])).await });

        assert!(outbound.recv().await.unwrap().ends_with("getcss\nclock\nleft"));
        client.handle_frame(&format!("{}:getcss:success:clock:left=10px\n", client.id()));
        client.handle_frame(&format!("{}:getcss:success:clock:left=20px\n", client.id()));

        let event = pending.await.unwrap().unwrap();
        let ApiPayload::Map { entries } = event.payload else {
            panic!("expected map");
        };
        assert_eq!(entries["left"], "10px");
        assert_eq!(callbacks.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_request_receives_failure_of_structured_action() {
        let (client, mut outbound) = client();

        let requester = client.clone();
        let pending = tokio::spawn(async move { requester.request(call::mirrorsize()).await });

        assert!(outbound.recv().await.unwrap().contains("\nmirrorsize\n"));
        assert!(client.handle_frame(&format!("{}:mirrorsize:fail::", client.id())));

        let event = pending.await.unwrap().unwrap();
        assert_eq!(event.action, ApiAction::MirrorSize);
        assert!(!event.is_success());
        assert_eq!(event.payload.as_text(), Some(""));
    }

    #[test]
    fn test_undecodable_payload_is_delivered_as_text() {
        let (client, _rx) = client();
        let sizes = collect(&client, ApiAction::MirrorSize);

        assert!(client.handle_frame(&format!("{}:mirrorsize:success::wide", client.id())));

        let event = sizes.lock()[0].clone();
        assert!(event.is_success());
        assert_eq!(event.payload.as_text(), Some("wide"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out() {
        let (client, _outbound) = client();
        let client = client.with_request_timeout(Duration::from_millis(100));

        let err = client.request(call::display()).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Timeout {
                action: ApiAction::Display,
                ms: 100
            }
        ));

        // The abandoned waiter does not swallow later responses.
        let displays = collect(&client, ApiAction::Display);
        assert!(client.handle_frame(&format!("{}:display:success::ws://x", client.id())));
        assert_eq!(displays.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_send_on_closed_channel_fails() {
        let (client, _outbound) = client();
        client.close();
        assert!(matches!(
            client.send(call::list()).await,
            Err(ApiError::Transport(_))
        ));
    }

    fn loopback(
        config: ChannelConfig,
        handler: Arc<dyn ChannelHandler>,
    ) -> BoxFuture<'static, TransportResult<ChannelHandle>> {
        async move {
            let (channel, mut outbound) = ChannelHandle::pair(config.protocol, 8);
            // Answers every call with success, echoing the data as payload.
            tokio::spawn(async move {
                while let Some(frame) = outbound.recv().await {
                    let mut fields = frame.splitn(4, '\n');
                    let id = fields.next().unwrap_or_default();
                    let action = fields.next().unwrap_or_default();
                    let plugin = fields.next().unwrap_or_default();
                    let data = fields.next().unwrap_or_default();
                    let reply = format!("{id}:{action}:success:{plugin}:{data}");
                    handler.on_message(API_PROTOCOL, reply).await;
                }
            });
            Ok(channel)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_connect_with_routes_channel_frames() {
        let client = ApiClient::connect_with(loopback, ChannelConfig::new("ws://x", API_PROTOCOL))
            .await
            .unwrap();
        assert_eq!(client.channel().name(), API_PROTOCOL);

        let event = client
            .request(call::jscmd("clock", &serde_json::json!("unused")))
            .await
            .unwrap();
        assert_eq!(event.action, ApiAction::JsCmd);
        assert_eq!(event.plugin, "clock");
        assert_eq!(
            event.payload,
            ApiPayload::Invocation {
                method: "\"unused\"".into(),
                value: String::new()
            }
        );
    }
}
