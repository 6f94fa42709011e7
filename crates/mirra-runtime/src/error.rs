//! Runtime error types.

use mirra_core::{BehaviorError, ProtocolError, ResourceError, TransportError};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Resources of the current load did not all complete in time.
    #[error("resource load timed out after {0}ms")]
    LoadTimeout(u128),

    /// No channel connector is linked in.
    #[error("no channel connector registered, enable the `ws-client` feature")]
    NoConnector,

    /// A container is already bound to another active plugin.
    #[error("container '{container}' is in use by plugin '{plugin}'")]
    ContainerBusy { container: String, plugin: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
