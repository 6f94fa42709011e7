//! # Mirra API
//!
//! Client for the orchestrator's request/response API, multiplexed over a
//! single long-lived `STDIN` channel.
//!
//! ```rust,ignore
//! use mirra_api::{ApiAction, ApiClient, call};
//!
//! let client = ApiClient::connect("ws://127.0.0.1:5000").await?;
//!
//! client.on(ApiAction::List, |event| println!("{:?}", event.payload));
//! client.send(call::list()).await?;
//!
//! let size = client.request(call::mirrorsize()).await?;
//! ```
//!
//! Responses for other clients, for unknown actions and for actions with
//! neither a pending request nor a callback are dropped.

pub mod call;
pub mod client;
pub mod decode;
pub mod error;

pub use client::{API_PROTOCOL, ApiClient, ApiEvent, Callback};
pub use decode::{ApiPayload, Decoder, PayloadDecoders};
pub use error::{ApiError, ApiResult};
pub use mirra_core::{ApiAction, ApiCall, ApiStatus};
