//! Wire model for plugin and display channels.
//!
//! Plugin channels carry either JSON commands (`{command, data}` or an array
//! of them) or, when the frame is not a JSON object/array, a raw API
//! response. Display channels carry `{cmd, ...}` objects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Acknowledgement sent once every requested resource has loaded.
pub const LOADED_ACK: &str = "PluginClient Loaded";

/// Reply to a successful `setcss`.
pub const CSS_APPLIED: &str = "CSS Applied";

/// Reply to `jsPluginCmd` when no behavior object exists.
pub const NO_INSTANCE: &str = "No Behavior Instance Defined";

/// Prefix of every error reply sent over a plugin channel.
pub const ERROR_PREFIX: &str = "error:";

/// Literal used by `setcss`/`getcss` for an absent style value.
pub const NULL_LITERAL: &str = "NULL";

/// Handshake sent on a freshly opened display channel.
pub const DISPLAY_READY: &str = "ready";

/// Formats an error reply.
pub fn error_reply(message: impl std::fmt::Display) -> String {
    format!("{ERROR_PREFIX}{message}")
}

// =============================================================================
// Plugin channel
// =============================================================================

/// A command element as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    /// Command name, looked up in the dispatch table.
    pub command: String,
    /// Opaque payload.
    #[serde(default)]
    pub data: Value,
}

impl RawCommand {
    /// Creates a command element.
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }

    fn from_value(value: Value) -> ProtocolResult<Self> {
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// A decoded plugin channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// One or more command elements, in the order they must be applied.
    Commands(Vec<ProtocolResult<RawCommand>>),
    /// A frame that is not a JSON command: handled as an API response.
    ApiResponse(String),
}

/// Classifies an inbound plugin channel frame.
pub fn parse_inbound(text: &str) -> Inbound {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => {
            Inbound::Commands(items.into_iter().map(RawCommand::from_value).collect())
        }
        Ok(value @ Value::Object(_)) => Inbound::Commands(vec![RawCommand::from_value(value)]),
        _ => Inbound::ApiResponse(text.to_string()),
    }
}

/// Decodes a structured payload that may also arrive JSON-encoded in a string.
pub fn decode_payload<T: DeserializeOwned>(command: &str, data: &Value) -> ProtocolResult<T> {
    let decoded = match data {
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|e| ProtocolError::invalid_payload(command, e))
}

/// Decodes a payload that must be plain text.
pub fn text_payload(command: &str, data: &Value) -> ProtocolResult<String> {
    match data {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ProtocolError::invalid_payload(command, "expected text")),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Resources a plugin needs before it is considered loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Style resource paths.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub css: Vec<String>,
    /// Script resource paths.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub js: Vec<String>,
    /// Behavior type to construct once scripts are loaded.
    #[serde(default)]
    pub main: Option<String>,
}

impl ResourceSpec {
    /// Non-empty style paths.
    pub fn styles(&self) -> impl Iterator<Item = &str> {
        self.css.iter().map(String::as_str).filter(|p| !p.is_empty())
    }

    /// Non-empty script paths.
    pub fn scripts(&self) -> impl Iterator<Item = &str> {
        self.js.iter().map(String::as_str).filter(|p| !p.is_empty())
    }

    /// Behavior type name, if one was given.
    pub fn main_type(&self) -> Option<&str> {
        self.main.as_deref().filter(|m| !m.is_empty())
    }
}

/// Payload of `jsPluginCmd`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Behavior method to call.
    #[serde(alias = "fn")]
    pub method: String,
    /// Arguments handed to the method verbatim.
    #[serde(default)]
    pub args: Value,
}

impl InvokeRequest {
    /// Creates an invoke request.
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

// =============================================================================
// Display channel
// =============================================================================

/// Commands the orchestrator sends over the display channel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DisplayCommand {
    /// Bind plugin `plugin` to container `container` and start it.
    Load {
        /// Plugin name, also the plugin channel's sub-protocol.
        #[serde(rename = "pName")]
        plugin: String,
        /// Container id the plugin renders into.
        #[serde(rename = "pDiv")]
        container: String,
    },
    /// Stop plugin `plugin`.
    Unload {
        /// Plugin name.
        #[serde(rename = "pName")]
        plugin: String,
    },
    /// Report the surface size.
    GetSize,
}

impl DisplayCommand {
    /// Decodes a display channel frame.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}
