//! HTTP resource host.
//!
//! Fetches plugin resources from the orchestrator's HTTP endpoint and keeps
//! their bodies for as long as they stay attached.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, trace};

use mirra_core::{ResourceError, ResourceHost, ResourceKind, ResourceResult, TransportError};

/// Resource host backed by HTTP GET requests.
#[derive(Debug)]
pub struct HttpResourceHost {
    client: Client,
    base_url: String,
    attached: Mutex<HashMap<(ResourceKind, String), Vec<u8>>>,
}

impl HttpResourceHost {
    /// Creates a host resolving relative paths against `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            attached: Mutex::new(HashMap::new()),
        })
    }

    /// Absolute URL for a resource path.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Body of an attached resource.
    pub fn body(&self, kind: ResourceKind, url: &str) -> Option<Vec<u8>> {
        self.attached.lock().get(&(kind, url.to_string())).cloned()
    }

    /// Number of attached resources.
    pub fn attached_count(&self) -> usize {
        self.attached.lock().len()
    }
}

#[async_trait]
impl ResourceHost for HttpResourceHost {
    async fn attach(&self, kind: ResourceKind, url: &str) -> ResourceResult<()> {
        let target = self.resolve(url);
        debug!(kind = %kind, url = %target, "Fetching resource");

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ResourceError::fetch_failed(url, e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ResourceError::fetch_failed(url, e))?;

        trace!(kind = %kind, url = %target, len = body.len(), "Resource attached");
        self.attached
            .lock()
            .insert((kind, url.to_string()), body.to_vec());
        Ok(())
    }

    fn detach(&self, kind: ResourceKind, url: &str) {
        if self.attached.lock().remove(&(kind, url.to_string())).is_some() {
            trace!(kind = %kind, url = %url, "Resource detached");
        }
    }
}
