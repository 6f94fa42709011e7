//! API client errors.

use mirra_core::{ApiAction, ProtocolError, TransportError};
use thiserror::Error;

/// Errors returned by [`ApiClient`](crate::ApiClient).
#[derive(Debug, Error)]
pub enum ApiError {
    /// No channel connector is linked in.
    #[error("no channel connector registered, enable the `ws-client` feature")]
    NotConnected,

    /// No response arrived for a request in time.
    #[error("no '{action}' response within {ms}ms")]
    Timeout { action: ApiAction, ms: u128 },

    /// A payload did not have the shape its action promises.
    #[error("cannot decode '{action}' payload: {reason}")]
    Decode { action: ApiAction, reason: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub fn decode(action: ApiAction, reason: impl Into<String>) -> Self {
        Self::Decode {
            action,
            reason: reason.into(),
        }
    }
}

/// Result type for API client operations.
pub type ApiResult<T> = Result<T, ApiError>;
