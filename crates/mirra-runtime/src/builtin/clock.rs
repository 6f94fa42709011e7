//! The stock clock behavior, registered as `JSClock1`.
//!
//! Keeps the update period in seconds. Rendering is up to the plugin's own
//! resources; this object only answers the period calls and follows the
//! `period` plugin setting.

use async_trait::async_trait;
use mirra_core::{Behavior, BehaviorError, BehaviorResult, BoxedBehavior, ConfigEvent, PluginConf};
use mirra_macros::register_behavior;
use serde_json::{Value, json};
use tracing::{debug, info};

const DEFAULT_PERIOD_SECS: u64 = 5;
const PERIOD_SETTING: &str = "period";

#[derive(Debug)]
pub struct Clock {
    conf: PluginConf,
    period_secs: u64,
}

impl Clock {
    pub fn new(conf: PluginConf) -> Self {
        Self {
            conf,
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }

    pub fn period_secs(&self) -> u64 {
        self.period_secs
    }
}

#[register_behavior("JSClock1")]
fn clock(conf: PluginConf) -> BoxedBehavior {
    Box::new(Clock::new(conf))
}

/// Leading-integer parse: `"10"`, `10`, `10.7` and `" 10s"` all give 10.
fn parse_period(args: &Value) -> Option<u64> {
    match args {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        Value::Array(items) => items.first().and_then(parse_period),
        _ => None,
    }
}

#[async_trait]
impl Behavior for Clock {
    async fn invoke(&mut self, method: &str, args: Value) -> BehaviorResult<Value> {
        match method {
            "setPeriod" => {
                let period = parse_period(&args)
                    .ok_or_else(|| BehaviorError::InvalidArgs(format!("not a period: {args}")))?;
                debug!(container = %self.conf.container(), period, "Clock period set");
                self.period_secs = period;
                Ok(Value::Null)
            }
            "getPeriod" => Ok(json!(self.period_secs)),
            other => Err(BehaviorError::UnknownMethod(other.to_string())),
        }
    }

    async fn on_config(&mut self, event: ConfigEvent) {
        if let ConfigEvent::Get { setting, value } = event
            && setting == PERIOD_SETTING
            && let Some(period) = parse_period(&Value::String(value))
        {
            self.period_secs = period;
        }
    }

    async fn destroy(&mut self) {
        info!(container = %self.conf.container(), "Clock stopped");
    }
}
