//! Asynchronous resource loading for one plugin instance.
//!
//! Every requested resource is fetched by its own task. Completions come back
//! as [`LoadEvent`]s tagged with the load generation they belong to, so the
//! owning runtime can ignore anything that outlived its load.

use std::sync::Arc;

use mirra_core::{ResourceHost, ResourceKind, ResourceResult, ResourceSpec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Completion of a single resource fetch.
#[derive(Debug)]
pub struct LoadEvent {
    pub generation: u64,
    pub kind: ResourceKind,
    /// Cache-busted URL that was fetched.
    pub url: String,
    pub result: ResourceResult<()>,
}

/// Number of resources started by one [`ResourceLoader::request_load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadRequest {
    pub styles: usize,
    pub scripts: usize,
}

impl LoadRequest {
    pub fn total(&self) -> usize {
        self.styles + self.scripts
    }
}

/// Appends a random `1..=1_000_000` query suffix so no cached copy is used.
pub fn cache_bust(path: &str) -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 1_000_000 + 1;
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{n}")
}

/// Starts, tracks and releases the resources of one plugin.
pub struct ResourceLoader {
    host: Arc<dyn ResourceHost>,
    registered: Vec<(ResourceKind, String)>,
    token: CancellationToken,
    events_tx: mpsc::UnboundedSender<LoadEvent>,
}

impl ResourceLoader {
    pub fn new(host: Arc<dyn ResourceHost>, events_tx: mpsc::UnboundedSender<LoadEvent>) -> Self {
        Self {
            host,
            registered: Vec::new(),
            token: CancellationToken::new(),
            events_tx,
        }
    }

    /// Registers every non-empty path of `spec` and starts fetching it.
    ///
    /// Styles are registered before scripts, each in payload order.
    pub fn request_load(&mut self, spec: &ResourceSpec, generation: u64) -> LoadRequest {
        let mut request = LoadRequest::default();

        for path in spec.styles() {
            self.start(ResourceKind::Style, path, generation);
            request.styles += 1;
        }
        for path in spec.scripts() {
            self.start(ResourceKind::Script, path, generation);
            request.scripts += 1;
        }

        debug!(
            generation,
            styles = request.styles,
            scripts = request.scripts,
            "Resource load requested"
        );
        request
    }

    fn start(&mut self, kind: ResourceKind, path: &str, generation: u64) {
        let url = cache_bust(path);
        self.registered.push((kind, url.clone()));

        let host = Arc::clone(&self.host);
        let token = self.token.clone();
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(kind = %kind, url = %url, "Resource fetch cancelled");
                    return;
                }
                result = host.attach(kind, &url) => result,
            };

            // Released while the attach was finishing.
            if token.is_cancelled() {
                if result.is_ok() {
                    host.detach(kind, &url);
                }
                return;
            }

            let _ = events_tx.send(LoadEvent {
                generation,
                kind,
                url,
                result,
            });
        });
    }

    /// Resources registered by the current load, in registration order.
    pub fn registered(&self) -> &[(ResourceKind, String)] {
        &self.registered
    }

    /// Cancels in-flight fetches and detaches every registered resource,
    /// newest first. Safe to call repeatedly.
    pub fn release_all(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();

        if self.registered.is_empty() {
            return;
        }
        debug!(count = self.registered.len(), "Releasing resources");
        while let Some((kind, url)) = self.registered.pop() {
            self.host.detach(kind, &url);
        }
    }
}

impl Drop for ResourceLoader {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
