//! Typed builders for every API call.
//!
//! Each function returns an [`ApiCall`] without a correlation id; the client
//! fills its own id in when sending.

use mirra_core::{ApiAction, ApiCall};
use serde_json::Value;

/// Lists the API's own commands.
pub fn commands() -> ApiCall {
    ApiCall::new(ApiAction::Commands)
}

/// Lists installed plugins.
pub fn list() -> ApiCall {
    ApiCall::new(ApiAction::List)
}

/// Queries the state of `plugin`. Answered as `getstate`.
pub fn status(plugin: &str) -> ApiCall {
    ApiCall::new(ApiAction::GetState).with_plugin(plugin)
}

pub fn enable(plugin: &str) -> ApiCall {
    ApiCall::new(ApiAction::Enable).with_plugin(plugin)
}

pub fn disable(plugin: &str) -> ApiCall {
    ApiCall::new(ApiAction::Disable).with_plugin(plugin)
}

/// Sets style properties as `k=v;k=v`. Use `NULL` to clear one.
pub fn setcss<K, V>(plugin: &str, properties: &[(K, V)]) -> ApiCall
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let data = properties
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join(";");
    ApiCall::new(ApiAction::SetCss)
        .with_plugin(plugin)
        .with_data(data)
}

/// Reads style properties, sent comma-separated.
pub fn getcss<P: AsRef<str>>(plugin: &str, properties: &[P]) -> ApiCall {
    let data = properties
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",");
    ApiCall::new(ApiAction::GetCss)
        .with_plugin(plugin)
        .with_data(data)
}

/// Persists the current style of `plugin`. Answered as `savecss`.
pub fn dumpcss(plugin: &str) -> ApiCall {
    ApiCall::new(ApiAction::SaveCss).with_plugin(plugin)
}

pub fn mirrorsize() -> ApiCall {
    ApiCall::new(ApiAction::MirrorSize)
}

pub fn display() -> ApiCall {
    ApiCall::new(ApiAction::Display)
}

/// Reads a plugin setting.
pub fn getopt(plugin: &str, setting: &str) -> ApiCall {
    ApiCall::new(ApiAction::GetOpt)
        .with_plugin(plugin)
        .with_data(setting)
}

/// Writes a plugin setting; `data` is `setting=value`.
pub fn setopt(plugin: &str, data: &str) -> ApiCall {
    ApiCall::new(ApiAction::SetOpt)
        .with_plugin(plugin)
        .with_data(data)
}

pub fn getdir(plugin: &str) -> ApiCall {
    ApiCall::new(ApiAction::GetDir).with_plugin(plugin)
}

/// Invokes a behavior method; `request` is sent as JSON, e.g.
/// `{"fn": "setPeriod", "args": 10}`.
pub fn jscmd(plugin: &str, request: &Value) -> ApiCall {
    ApiCall::new(ApiAction::JsCmd)
        .with_plugin(plugin)
        .with_data(request.to_string())
}

pub fn getcfg(plugin: &str, key: &str) -> ApiCall {
    ApiCall::new(ApiAction::GetCfg)
        .with_plugin(plugin)
        .with_data(key)
}

pub fn setcfg(plugin: &str, data: &str) -> ApiCall {
    ApiCall::new(ApiAction::SetCfg)
        .with_plugin(plugin)
        .with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_status_maps_to_getstate() {
        let call = status("clock").with_id("id");
        assert_eq!(call.encode(), "id\ngetstate\nclock\n");
    }

    #[test]
    fn test_dumpcss_maps_to_savecss() {
        assert_eq!(dumpcss("clock").action, ApiAction::SaveCss);
    }

    #[test]
    fn test_setcss_joins_pairs() {
        let call = setcss("clock", &[("left", "10px"), ("top", "NULL")]);
        assert_eq!(call.data.as_deref(), Some("left=10px;top=NULL"));
    }

    #[test]
    fn test_getcss_joins_names() {
        let call = getcss("clock", &["left", "top"]);
        assert_eq!(call.data.as_deref(), Some("left,top"));
    }

    #[test]
    fn test_global_calls_have_no_plugin() {
        for call in [commands(), list(), mirrorsize(), display()] {
            assert!(call.plugin.is_none());
            assert!(call.data.is_none());
        }
    }

    #[test]
    fn test_jscmd_sends_json() {
        let call = jscmd("clock", &json!({"fn": "setPeriod", "args": 10}));
        let sent: Value = serde_json::from_str(call.data.as_deref().unwrap()).unwrap();
        assert_eq!(sent, json!({"fn": "setPeriod", "args": 10}));
    }
}
