//! Per-action payload decoding.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use mirra_core::ApiAction;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiPayload {
    /// Payload passed through as-is.
    Text { text: String },
    /// Non-empty lines.
    Lines { lines: Vec<String> },
    /// `name=value` lines.
    Map { entries: BTreeMap<String, String> },
    Dimensions { width: u32, height: u32 },
    Setting { setting: String, value: String },
    Invocation { method: String, value: String },
}

impl ApiPayload {
    /// The payload as plain text, if it was not decoded further.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Turns a raw payload into an [`ApiPayload`].
pub type Decoder = Arc<dyn Fn(ApiAction, &str) -> ApiResult<ApiPayload> + Send + Sync>;

/// Decoder table keyed by action. Actions without an entry pass their
/// payload through as [`ApiPayload::Text`].
#[derive(Clone)]
pub struct PayloadDecoders {
    decoders: HashMap<ApiAction, Decoder>,
}

impl PayloadDecoders {
    /// Creates the table with the stock decoders.
    pub fn new() -> Self {
        let mut decoders = Self::empty();
        decoders.register(ApiAction::List, |_, payload| Ok(lines(payload)));
        decoders.register(ApiAction::GetCss, |_, payload| Ok(css_map(payload)));
        decoders.register(ApiAction::MirrorSize, dimensions);
        decoders.register(ApiAction::GetOpt, |_, payload| Ok(setting(payload)));
        decoders.register(ApiAction::JsCmd, |_, payload| Ok(invocation(payload)));
        decoders
    }

    /// Creates a table where every action passes through.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Sets the decoder for `action`, replacing any previous one.
    pub fn register<F>(&mut self, action: ApiAction, decoder: F)
    where
        F: Fn(ApiAction, &str) -> ApiResult<ApiPayload> + Send + Sync + 'static,
    {
        self.decoders.insert(action, Arc::new(decoder));
    }

    pub fn decode(&self, action: ApiAction, payload: &str) -> ApiResult<ApiPayload> {
        match self.decoders.get(&action) {
            Some(decoder) => decoder(action, payload),
            None => Ok(ApiPayload::Text {
                text: payload.to_string(),
            }),
        }
    }
}

impl Default for PayloadDecoders {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PayloadDecoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<_> = self.decoders.keys().copied().collect();
        actions.sort_unstable();
        f.debug_struct("PayloadDecoders")
            .field("actions", &actions)
            .finish()
    }
}

fn lines(payload: &str) -> ApiPayload {
    ApiPayload::Lines {
        lines: payload
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn css_map(payload: &str) -> ApiPayload {
    let entries = payload
        .split('\n')
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    ApiPayload::Map { entries }
}

fn dimensions(action: ApiAction, payload: &str) -> ApiResult<ApiPayload> {
    let (width, height) = payload
        .trim()
        .split_once('x')
        .ok_or_else(|| ApiError::decode(action, format!("expected WxH, got {payload:?}")))?;
    let parse = |n: &str| {
        n.parse::<u32>()
            .map_err(|e| ApiError::decode(action, format!("{n:?}: {e}")))
    };
    Ok(ApiPayload::Dimensions {
        width: parse(width)?,
        height: parse(height)?,
    })
}

fn setting(payload: &str) -> ApiPayload {
    let (setting, value) = payload.split_once(':').unwrap_or((payload, ""));
    ApiPayload::Setting {
        setting: setting.to_string(),
        value: value.to_string(),
    }
}

fn invocation(payload: &str) -> ApiPayload {
    let (method, value) = payload.split_once(':').unwrap_or((payload, ""));
    ApiPayload::Invocation {
        method: method.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_drops_empty_lines() {
        let decoders = PayloadDecoders::new();
        assert_eq!(
            decoders.decode(ApiAction::List, "clock\n\nweather\n").unwrap(),
            ApiPayload::Lines {
                lines: vec!["clock".into(), "weather".into()]
            }
        );
    }

    #[test]
    fn test_getcss_builds_map() {
        let decoders = PayloadDecoders::new();
        let ApiPayload::Map { entries } = decoders
            .decode(ApiAction::GetCss, "left=10px\ntop=NULL\n")
            .unwrap()
        else {
            panic!("expected map");
        };
        assert_eq!(entries["left"], "10px");
        assert_eq!(entries["top"], "NULL");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_mirrorsize() {
        let decoders = PayloadDecoders::new();
        assert_eq!(
            decoders.decode(ApiAction::MirrorSize, "1920x1080").unwrap(),
            ApiPayload::Dimensions {
                width: 1920,
                height: 1080
            }
        );
        assert!(matches!(
            decoders.decode(ApiAction::MirrorSize, "wide"),
            Err(ApiError::Decode { .. })
        ));
    }

    #[test]
    fn test_getopt_and_jscmd_split_on_first_colon() {
        let decoders = PayloadDecoders::new();
        assert_eq!(
            decoders.decode(ApiAction::GetOpt, "url:http://x").unwrap(),
            ApiPayload::Setting {
                setting: "url".into(),
                value: "http://x".into()
            }
        );
        assert_eq!(
            decoders.decode(ApiAction::JsCmd, "getPeriod:5").unwrap(),
            ApiPayload::Invocation {
                method: "getPeriod".into(),
                value: "5".into()
            }
        );
    }

    #[test]
    fn test_default_is_text() {
        let decoders = PayloadDecoders::new();
        assert_eq!(
            decoders.decode(ApiAction::Enable, "a:b").unwrap().as_text(),
            Some("a:b")
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut decoders = PayloadDecoders::new();
        decoders.register(ApiAction::List, |_, payload| {
            Ok(ApiPayload::Text {
                text: payload.to_uppercase(),
            })
        });
        assert_eq!(
            decoders.decode(ApiAction::List, "a\nb").unwrap().as_text(),
            Some("A\nB")
        );
    }
}
