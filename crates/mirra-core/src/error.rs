//! Unified error types for the Mirra core.
//!
//! Runtime-level errors (configuration, orchestration) live in
//! `mirra-runtime`; the API client has its own `ApiError` in `mirra-api`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur on a plugin or API channel.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// No transport registered that can open the requested channel.
    #[error("transport '{transport}' not available")]
    NotAvailable {
        /// The transport type that's not available.
        transport: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// Protocol Errors
// =============================================================================

/// Errors raised while decoding inbound command or API messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A command name with no entry in the dispatch table.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// A message or command element that does not have the expected shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A command whose payload could not be decoded.
    #[error("invalid payload for '{command}': {reason}")]
    InvalidPayload {
        /// The command whose payload was rejected.
        command: String,
        /// Reason for rejection.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates an invalid payload error.
    pub fn invalid_payload(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidPayload {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Behavior Errors
// =============================================================================

/// Errors raised by behavior objects and their registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BehaviorError {
    /// No factory registered under the requested type name.
    #[error("behavior '{0}' is not registered")]
    NotRegistered(String),

    /// The behavior does not expose the invoked method.
    #[error("{0} is not a function")]
    UnknownMethod(String),

    /// Arguments passed to a method were rejected.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The method ran and failed.
    #[error("{0}")]
    Failed(String),
}

// =============================================================================
// Resource Errors
// =============================================================================

/// Errors reported by a resource host while fetching a resource.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// The resource could not be fetched.
    #[error("failed to load {url}: {reason}")]
    FetchFailed {
        /// The cache-busted URL that failed.
        url: String,
        /// Reason for failure.
        reason: String,
    },
}

impl ResourceError {
    /// Creates a fetch failure.
    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for protocol decoding.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Result type for behavior invocations.
pub type BehaviorResult<T> = Result<T, BehaviorError>;

/// Result type for resource fetches.
pub type ResourceResult<T> = Result<T, ResourceError>;
