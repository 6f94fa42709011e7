//! Command dispatch table.
//!
//! Maps inbound command names to a closed set of [`CommandKind`]s and decodes
//! their payloads into a typed [`Command`]. A table is built per runtime.

use std::collections::HashMap;

use mirra_core::protocol::{decode_payload, text_payload};
use mirra_core::{
    BehaviorResult, InvokeRequest, ProtocolError, ProtocolResult, RawCommand, ResourceSpec,
};
use serde_json::Value;

/// What a command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Write,
    InnerDiv,
    Clear,
    Load,
    Unload,
    SetCss,
    GetCss,
    Invoke,
    Close,
}

/// A decoded command, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append text.
    Write(String),
    /// Replace content with markup.
    InnerDiv(String),
    Clear,
    Load(ResourceSpec),
    Unload,
    /// `k=v;k=v` rules.
    SetCss(String),
    /// Comma-separated property names.
    GetCss(String),
    Invoke(InvokeRequest),
    Close,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Write(_) => CommandKind::Write,
            Self::InnerDiv(_) => CommandKind::InnerDiv,
            Self::Clear => CommandKind::Clear,
            Self::Load(_) => CommandKind::Load,
            Self::Unload => CommandKind::Unload,
            Self::SetCss(_) => CommandKind::SetCss,
            Self::GetCss(_) => CommandKind::GetCss,
            Self::Invoke(_) => CommandKind::Invoke,
            Self::Close => CommandKind::Close,
        }
    }
}

/// Name-indexed command table.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: HashMap<String, CommandKind>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    /// Creates the table with every standard command name.
    pub fn new() -> Self {
        let entries = [
            ("write", CommandKind::Write),
            ("innerdiv", CommandKind::InnerDiv),
            ("clear", CommandKind::Clear),
            ("load", CommandKind::Load),
            ("unload", CommandKind::Unload),
            ("setcss", CommandKind::SetCss),
            ("getcss", CommandKind::GetCss),
            ("jsPluginCmd", CommandKind::Invoke),
            ("invoke", CommandKind::Invoke),
            ("close", CommandKind::Close),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();

        Self { entries }
    }

    /// Binds `name` to `kind`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, kind: CommandKind) {
        self.entries.insert(name.into(), kind);
    }

    pub fn kind(&self, name: &str) -> Option<CommandKind> {
        self.entries.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves and decodes one raw command.
    pub fn parse(&self, raw: &RawCommand) -> ProtocolResult<Command> {
        let name = raw.command.as_str();
        let kind = self
            .kind(name)
            .ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))?;

        Ok(match kind {
            CommandKind::Write => Command::Write(text_payload(name, &raw.data)?),
            CommandKind::InnerDiv => Command::InnerDiv(text_payload(name, &raw.data)?),
            CommandKind::Clear => Command::Clear,
            CommandKind::Load => Command::Load(decode_payload(name, &raw.data)?),
            CommandKind::Unload => Command::Unload,
            CommandKind::SetCss => Command::SetCss(text_payload(name, &raw.data)?),
            CommandKind::GetCss => Command::GetCss(text_payload(name, &raw.data)?),
            CommandKind::Invoke => Command::Invoke(decode_payload(name, &raw.data)?),
            CommandKind::Close => Command::Close,
        })
    }
}

/// Formats the reply to an invoke: `<method>:<value>` or `<method>:<error>`.
///
/// String values are sent raw, anything else as JSON.
pub fn invoke_reply(method: &str, result: &BehaviorResult<Value>) -> String {
    match result {
        Ok(Value::String(text)) => format!("{method}:{text}"),
        Ok(value) => format!("{method}:{value}"),
        Err(e) => format!("{method}:{e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mirra_core::BehaviorError;
    use serde_json::json;

    #[test]
    fn test_standard_names() {
        let table = DispatchTable::new();
        assert_eq!(table.len(), 10);
        assert_eq!(table.kind("jsPluginCmd"), Some(CommandKind::Invoke));
        assert_eq!(table.kind("invoke"), Some(CommandKind::Invoke));
        assert_eq!(table.kind("innerDiv"), None);
    }

    #[test]
    fn test_unknown_command() {
        let table = DispatchTable::new();
        let err = table
            .parse(&RawCommand::new("reboot", Value::Null))
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownCommand("reboot".into()));
    }

    #[test]
    fn test_load_accepts_object_and_string() {
        let table = DispatchTable::new();
        let expected = ResourceSpec {
            css: vec!["a.css".into()],
            js: vec![],
            main: Some("Foo".into()),
        };

        let from_object = table
            .parse(&RawCommand::new(
                "load",
                json!({"css": ["a.css"], "js": null, "main": "Foo"}),
            ))
            .unwrap();
        let from_string = table
            .parse(&RawCommand::new(
                "load",
                json!(r#"{"css":["a.css"],"main":"Foo"}"#),
            ))
            .unwrap();

        assert_eq!(from_object, Command::Load(expected.clone()));
        assert_eq!(from_string, Command::Load(expected));
    }

    #[test]
    fn test_invoke_accepts_fn_alias() {
        let table = DispatchTable::new();
        let command = table
            .parse(&RawCommand::new(
                "jsPluginCmd",
                json!(r#"{"fn":"setPeriod","args":10}"#),
            ))
            .unwrap();
        assert_eq!(
            command,
            Command::Invoke(InvokeRequest::new("setPeriod", json!(10)))
        );
    }

    #[test]
    fn test_bad_payload() {
        let table = DispatchTable::new();
        assert!(matches!(
            table.parse(&RawCommand::new("write", json!({"text": "hi"}))),
            Err(ProtocolError::InvalidPayload { .. })
        ));
        assert!(matches!(
            table.parse(&RawCommand::new("invoke", json!("not json"))),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_register_alias() {
        let mut table = DispatchTable::new();
        table.register("append", CommandKind::Write);
        assert_eq!(
            table.parse(&RawCommand::new("append", json!("x"))).unwrap(),
            Command::Write("x".into())
        );
    }

    #[test]
    fn test_invoke_reply_rendering() {
        assert_eq!(invoke_reply("getPeriod", &Ok(json!(5))), "getPeriod:5");
        assert_eq!(invoke_reply("name", &Ok(json!("clock"))), "name:clock");
        assert_eq!(invoke_reply("setPeriod", &Ok(Value::Null)), "setPeriod:null");
        assert_eq!(
            invoke_reply("spin", &Err(BehaviorError::UnknownMethod("spin".into()))),
            "spin:spin is not a function"
        );
    }
}
