//! Behavior registry: type name → factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mirra_core::{BEHAVIOR_REGISTRY, BehaviorError, BehaviorResult, BoxedBehavior, PluginConf};
use tracing::{debug, warn};

/// Constructor stored in a [`BehaviorRegistry`].
pub type BehaviorFactory = Arc<dyn Fn(PluginConf) -> BoxedBehavior + Send + Sync>;

/// Named behavior factories available to plugin runtimes.
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl BehaviorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every `#[register_behavior]` entry linked
    /// into the binary. When a name is registered twice the first entry wins.
    pub fn collect_all() -> Self {
        let mut registry = Self::new();
        for entry in BEHAVIOR_REGISTRY {
            if registry.contains(entry.name) {
                warn!(name = entry.name, "Behavior registered more than once, keeping first");
                continue;
            }
            let factory = entry.factory;
            registry
                .factories
                .insert(entry.name.to_string(), Arc::new(factory));
        }
        debug!(count = registry.len(), "Collected linked behaviors");
        registry
    }

    /// Registers `factory` under `name`, replacing any previous factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(PluginConf) -> BoxedBehavior + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            debug!(name = %name, "Replaced behavior factory");
        }
    }

    /// Constructs the behavior registered under `name`.
    pub fn create(&self, name: &str, conf: PluginConf) -> BehaviorResult<BoxedBehavior> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| BehaviorError::NotRegistered(name.to_string()))?;
        Ok(factory(conf))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
