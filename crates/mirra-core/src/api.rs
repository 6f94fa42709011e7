//! API correlation wire format.
//!
//! Calls are newline-delimited, responses colon-delimited:
//!
//! ```text
//! call:      <id>\n<action>\n[<plugin>\n][<data>]
//! response:  <id>:<action>:<status>:<plugin>:<payload...>
//! ```
//!
//! `data` is always the last call field and is taken verbatim, so it may
//! contain newlines. The response payload is everything after the fourth
//! colon, rejoined, so it may contain colons.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, ProtocolResult};

/// Field delimiter of outbound calls.
pub const CALL_DELIMITER: char = '\n';

/// Field delimiter of inbound responses.
pub const RESPONSE_DELIMITER: char = ':';

/// Correlation id used by plugin channels to forward calls to the API.
pub const PLUGIN_API_ID: &str = "[API]";

/// Actions understood by the orchestrator's API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiAction {
    /// List the API's own commands.
    Commands,
    /// List installed plugins.
    List,
    /// Query a plugin's state.
    GetState,
    /// Enable a plugin.
    Enable,
    /// Disable a plugin.
    Disable,
    /// Set style properties on a plugin's container.
    SetCss,
    /// Read style properties from a plugin's container.
    GetCss,
    /// Persist a plugin's current style.
    SaveCss,
    /// Report the display surface size.
    MirrorSize,
    /// Report the display connection.
    Display,
    /// Read a plugin setting.
    GetOpt,
    /// Write a plugin setting.
    SetOpt,
    /// Report a plugin's install directory.
    GetDir,
    /// Invoke a behavior method.
    JsCmd,
    /// Read a plugin configuration value.
    GetCfg,
    /// Write a plugin configuration value.
    SetCfg,
}

impl ApiAction {
    /// Every action, in wire-name order of the API's command table.
    pub const ALL: [ApiAction; 16] = [
        Self::Commands,
        Self::List,
        Self::GetState,
        Self::Enable,
        Self::Disable,
        Self::SetCss,
        Self::GetCss,
        Self::SaveCss,
        Self::MirrorSize,
        Self::Display,
        Self::GetOpt,
        Self::SetOpt,
        Self::GetDir,
        Self::JsCmd,
        Self::GetCfg,
        Self::SetCfg,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commands => "commands",
            Self::List => "list",
            Self::GetState => "getstate",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::SetCss => "setcss",
            Self::GetCss => "getcss",
            Self::SaveCss => "savecss",
            Self::MirrorSize => "mirrorsize",
            Self::Display => "display",
            Self::GetOpt => "getopt",
            Self::SetOpt => "setopt",
            Self::GetDir => "getdir",
            Self::JsCmd => "jscmd",
            Self::GetCfg => "getcfg",
            Self::SetCfg => "setcfg",
        }
    }
}

impl fmt::Display for ApiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ProtocolError::Malformed(format!("unknown API action '{s}'")))
    }
}

/// Outcome reported by the API for a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    /// The call succeeded.
    Success,
    /// The call failed.
    Fail,
    /// The call was accepted and is still running.
    Pending,
    /// The API is handling another call.
    Busy,
    /// Any other status word.
    Other(String),
}

impl ApiStatus {
    /// Parses a status word.
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "fail" => Self::Fail,
            "pending" => Self::Pending,
            "busy" => Self::Busy,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns whether the call failed.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Fail => f.write_str("fail"),
            Self::Pending => f.write_str("pending"),
            Self::Busy => f.write_str("busy"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// An outbound API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    /// Correlation id; filled in by the client when absent.
    pub id: Option<String>,
    /// Action to perform.
    pub action: ApiAction,
    /// Target plugin.
    pub plugin: Option<String>,
    /// Action data, sent verbatim as the last field.
    pub data: Option<String>,
}

impl ApiCall {
    /// Creates a call with no plugin and no data.
    pub fn new(action: ApiAction) -> Self {
        Self {
            id: None,
            action,
            plugin: None,
            data: None,
        }
    }

    /// Sets the correlation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the target plugin.
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Sets the action data.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Encodes the call as one frame.
    pub fn encode(&self) -> String {
        let mut frame = String::new();
        if let Some(id) = &self.id {
            frame.push_str(id);
            frame.push(CALL_DELIMITER);
        }
        frame.push_str(self.action.as_str());
        frame.push(CALL_DELIMITER);
        if let Some(plugin) = self.plugin.as_deref().filter(|p| !p.is_empty()) {
            frame.push_str(plugin);
            frame.push(CALL_DELIMITER);
        }
        if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
            frame.push_str(data);
        }
        frame
    }
}

/// An inbound API response, before payload decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// Correlation id echoed by the API.
    pub id: String,
    /// Action name as sent by the API.
    pub action: String,
    /// Outcome.
    pub status: ApiStatus,
    /// Target plugin, empty when the call had none.
    pub plugin: String,
    /// Raw, action-specific payload.
    pub payload: String,
}

impl ApiResponse {
    /// Splits a response frame into its five fields.
    pub fn parse(frame: &str) -> ProtocolResult<Self> {
        let mut fields = frame.splitn(5, RESPONSE_DELIMITER);
        let (Some(id), Some(action), Some(status), Some(plugin)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ProtocolError::Malformed(format!(
                "API response needs at least 4 fields: {frame:?}"
            )));
        };

        Ok(Self {
            id: id.to_string(),
            action: action.to_string(),
            status: ApiStatus::parse(status),
            plugin: plugin.to_string(),
            payload: fields.next().unwrap_or_default().to_string(),
        })
    }

    /// The action, if it is one this crate knows.
    pub fn known_action(&self) -> Option<ApiAction> {
        self.action.parse().ok()
    }
}
