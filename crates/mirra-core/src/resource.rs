//! Resource hosting: where a plugin's style and script assets get fetched
//! and attached.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ResourceResult;

/// Kind of plugin resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A stylesheet.
    Style,
    /// A script.
    Script,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Style => f.write_str("css"),
            Self::Script => f.write_str("js"),
        }
    }
}

/// Fetches and attaches resources on behalf of plugin runtimes.
#[async_trait]
pub trait ResourceHost: Send + Sync {
    /// Fetches `url` and attaches it; resolves once the resource is loaded.
    async fn attach(&self, kind: ResourceKind, url: &str) -> ResourceResult<()>;

    /// Removes an attached resource. Unknown URLs are ignored.
    fn detach(&self, kind: ResourceKind, url: &str);
}

/// In-process host: every attach succeeds immediately and is recorded.
#[derive(Debug, Default)]
pub struct MemoryResourceHost {
    attached: Mutex<Vec<(ResourceKind, String)>>,
}

impl MemoryResourceHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently attached resources, in attach order.
    pub fn attached(&self) -> Vec<(ResourceKind, String)> {
        self.attached.lock().clone()
    }
}

#[async_trait]
impl ResourceHost for MemoryResourceHost {
    async fn attach(&self, kind: ResourceKind, url: &str) -> ResourceResult<()> {
        self.attached.lock().push((kind, url.to_string()));
        Ok(())
    }

    fn detach(&self, kind: ResourceKind, url: &str) {
        self.attached
            .lock()
            .retain(|(k, u)| !(*k == kind && u == url));
    }
}
