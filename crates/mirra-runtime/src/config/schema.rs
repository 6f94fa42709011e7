//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MirraConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Display channel and surface settings.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Plugin runtime settings.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// API client settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Resource fetching settings.
    #[serde(default)]
    pub resources: ResourcesConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Global level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the call site.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `mirra_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Display
// =============================================================================

/// Display channel and surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Orchestrator endpoint for the display and plugin channels.
    #[serde(default = "default_display_url")]
    pub url: String,

    /// Sub-protocol of the display channel.
    #[serde(default = "default_display_protocol")]
    pub protocol: String,

    /// Surface width reported by `getsize`.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Surface height reported by `getsize`.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Outbound queue length per channel.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            url: default_display_url(),
            protocol: default_display_protocol(),
            width: default_width(),
            height: default_height(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_display_url() -> String {
    "ws://127.0.0.1:5000".to_string()
}

fn default_display_protocol() -> String {
    "display".to_string()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_outbound_buffer() -> usize {
    256
}

// =============================================================================
// Plugins
// =============================================================================

/// Plugin runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Time allowed for all resources of one load to complete.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Inbound event queue length per plugin channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PluginsConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

fn default_load_timeout_ms() -> u64 {
    30000
}

fn default_event_buffer() -> usize {
    64
}

// =============================================================================
// API client
// =============================================================================

/// API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_display_url")]
    pub url: String,

    /// Sub-protocol of the API channel.
    #[serde(default = "default_api_protocol")]
    pub protocol: String,

    /// How long `request` waits for a response.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_display_url(),
            protocol: default_api_protocol(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_api_protocol() -> String {
    "STDIN".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

// =============================================================================
// Resources
// =============================================================================

/// Resource fetching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Base URL relative resource paths resolve against.
    #[serde(default = "default_resource_base_url")]
    pub base_url: String,

    /// Per-request fetch timeout.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            base_url: default_resource_base_url(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl ResourcesConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_resource_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    10000
}
