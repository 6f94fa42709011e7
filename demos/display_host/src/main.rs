//! Display Host Example
//!
//! Runs the Mirra display against an orchestrator, or talks to the
//! orchestrator's API from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Serve plugins, reading mirra.toml from the current directory
//! cargo run --package display-host -- serve
//!
//! # Query the API
//! cargo run --package display-host -- api list
//! cargo run --package display-host -- api invoke clock getPeriod
//! ```
//!
//! Besides the built-in `JSClock1`, this binary registers a `DemoCounter`
//! behavior that plugins can name as their `main` type.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mirra::prelude::*;
use mirra::runtime::logging::LoggingBuilder;
use tracing::info;

// ============================================================================
// Demo behavior
// ============================================================================

/// Counts `tick` calls; `reset` starts over.
struct Counter {
    container: String,
    count: u64,
}

#[async_trait]
impl Behavior for Counter {
    async fn invoke(&mut self, method: &str, _args: Value) -> BehaviorResult<Value> {
        match method {
            "tick" => {
                self.count += 1;
                Ok(Value::from(self.count))
            }
            "reset" => {
                self.count = 0;
                Ok(Value::Null)
            }
            other => Err(BehaviorError::UnknownMethod(other.to_string())),
        }
    }

    async fn destroy(&mut self) {
        info!(container = %self.container, count = self.count, "Counter destroyed");
    }
}

#[register_behavior("DemoCounter")]
fn counter(conf: PluginConf) -> BoxedBehavior {
    Box::new(Counter {
        container: conf.container().to_string(),
        count: 0,
    })
}

// ============================================================================
// Command line
// ============================================================================

#[derive(Parser)]
#[command(name = "display-host", about = "Mirra display host and API console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the display until Ctrl+C.
    Serve {
        /// Configuration file to load instead of searching.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Configuration profile, e.g. "production".
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Send one API call and print the response.
    Api {
        /// Orchestrator endpoint.
        #[arg(long, default_value = "ws://127.0.0.1:5000")]
        url: String,
        /// Seconds to wait for the response.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
        #[command(subcommand)]
        call: ApiCommand,
    },
}

#[derive(Subcommand)]
enum ApiCommand {
    /// List installed plugins.
    List,
    /// Report the surface size.
    Size,
    Status { plugin: String },
    Enable { plugin: String },
    Disable { plugin: String },
    /// Read style properties.
    Getcss { plugin: String, properties: Vec<String> },
    /// Read a plugin setting.
    Getopt { plugin: String, setting: String },
    /// Invoke a behavior method with optional JSON arguments.
    Invoke {
        plugin: String,
        method: String,
        args: Option<String>,
    },
}

impl ApiCommand {
    fn into_call(self) -> Result<mirra::core::ApiCall> {
        Ok(match self {
            Self::List => call::list(),
            Self::Size => call::mirrorsize(),
            Self::Status { plugin } => call::status(&plugin),
            Self::Enable { plugin } => call::enable(&plugin),
            Self::Disable { plugin } => call::disable(&plugin),
            Self::Getcss { plugin, properties } => call::getcss(&plugin, &properties),
            Self::Getopt { plugin, setting } => call::getopt(&plugin, &setting),
            Self::Invoke {
                plugin,
                method,
                args,
            } => {
                let args: Value = match args {
                    Some(raw) => serde_json::from_str(&raw)
                        .with_context(|| format!("arguments are not JSON: {raw}"))?,
                    None => Value::Null,
                };
                call::jscmd(&plugin, &serde_json::json!({ "fn": method, "args": args }))
            }
        })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Serve { config, profile } => {
            let mut builder = MirraRuntime::builder();
            if let Some(path) = config {
                builder = builder.config_file(path);
            }
            if let Some(profile) = profile {
                builder = builder.profile(profile);
            }
            let runtime = builder.build().context("failed to load configuration")?;

            info!(behaviors = ?runtime.registry().names(), "Serving display");
            runtime.run().await?;
        }
        Command::Api { url, timeout, call } => {
            LoggingBuilder::new().init();

            let client = ApiClient::connect(url)
                .await?
                .with_request_timeout(Duration::from_secs(timeout));
            let event = client.request(call.into_call()?).await?;

            println!("{} {} {}", event.action, event.status, event.plugin);
            println!("{}", serde_json::to_string_pretty(&event.payload)?);
            client.close();
        }
    }

    Ok(())
}
