//! Outgoing messages: switch to the target chat, paste, send

use crate::controls::{find_input_field, find_send_button};
use crate::pacing;
use crate::ui::ChatUi;
use crate::{BridgeError, Key, UiNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A request to send `content` to the chat named `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub target: String,
    pub content: String,
}

/// Why a command body was refused before reaching the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRejection {
    EmptyBody,
    InvalidJson,
    TargetRequired,
}

impl CommandRejection {
    pub fn code(&self) -> &'static str {
        match self {
            CommandRejection::EmptyBody => "empty_body",
            CommandRejection::InvalidJson => "invalid_json",
            CommandRejection::TargetRequired => "target_required",
        }
    }
}

impl From<CommandRejection> for BridgeError {
    fn from(rejection: CommandRejection) -> Self {
        BridgeError::InvalidCommand(rejection.code().to_string())
    }
}

/// Empty for absent and falsy values (`null`, `false`, zero, empty string,
/// array or object); anything else is stringified.
fn loose_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => String::new(),
        Some(Value::Array(items)) if items.is_empty() => String::new(),
        Some(Value::Object(fields)) if fields.is_empty() => String::new(),
        Some(other) => other.to_string(),
    }
}

impl Command {
    /// Parse a raw request body. The target is trimmed; the content is kept
    /// verbatim. Falsy fields read as empty; other non-strings are stringified.
    pub fn from_json(body: &[u8]) -> Result<Self, CommandRejection> {
        if body.is_empty() {
            return Err(CommandRejection::EmptyBody);
        }
        let value: Value =
            serde_json::from_slice(body).map_err(|_| CommandRejection::InvalidJson)?;
        let Value::Object(fields) = value else {
            return Err(CommandRejection::InvalidJson);
        };
        let target = loose_string(fields.get("target")).trim().to_string();
        if target.is_empty() {
            return Err(CommandRejection::TargetRequired);
        }
        Ok(Self {
            target,
            content: loose_string(fields.get("content")),
        })
    }
}

pub struct CommandDispatcher {
    ui: Arc<ChatUi>,
}

impl CommandDispatcher {
    pub fn new(ui: Arc<ChatUi>) -> Self {
        Self { ui }
    }

    /// Deliver `command` through the client. Never fails loudly: any problem
    /// is logged and reported as `false`.
    #[instrument(level = "info", skip(self, command), fields(target = %command.target))]
    pub fn send(&self, command: &Command) -> bool {
        match self.try_send(command) {
            Ok(()) => {
                info!("message sent");
                true
            }
            Err(e) => {
                warn!("send failed: {}", e);
                false
            }
        }
    }

    fn try_send(&self, command: &Command) -> Result<(), BridgeError> {
        let ui = self.ui.as_ref();
        ui.pacer().pause(pacing::REACTION);

        // The whole sequence is one critical section.
        let _gate = ui.gate().enter("send");
        let window = ui.main_window()?;
        if let Err(e) = window.activate() {
            debug!("activating main window failed: {}", e);
        }

        if !ui.ensure_chat_target(&command.target) {
            return Err(BridgeError::NotFound(format!(
                "chat '{}' could not be opened",
                command.target
            )));
        }

        let title = ui.current_chat_title()?;
        let field = find_input_field(ui.backend(), &window, title.as_deref())
            .ok_or_else(|| BridgeError::NotFound("input field".to_string()))?;
        debug!("input field at {:?}", field.bounds());

        self.paste(&field, &command.content)?;
        ui.pacer().pause(pacing::BEFORE_SEND);

        if let Some(button) = find_send_button(ui.backend(), &window) {
            match button.click() {
                Ok(()) => return Ok(()),
                Err(e) => debug!("send button click failed, falling back to Enter: {}", e),
            }
        } else {
            debug!("no send button, falling back to Enter");
        }
        ui.backend().press_key(Key::Enter)
    }

    /// Focus the field, clear it and paste `text` through the clipboard.
    fn paste(&self, field: &UiNode, text: &str) -> Result<(), BridgeError> {
        let ui = self.ui.as_ref();
        field.click()?;
        ui.pacer().pause(pacing::AFTER_CLICK);
        field.send_key(Key::SelectAll)?;
        field.send_key(Key::Delete)?;
        ui.backend().set_clipboard(text)?;
        field.send_key(Key::Paste)?;
        ui.pacer().pause(pacing::AFTER_PASTE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::from_json(b""), Err(CommandRejection::EmptyBody));
        assert_eq!(Command::from_json(b"{nope"), Err(CommandRejection::InvalidJson));
        assert_eq!(Command::from_json(b"[1,2]"), Err(CommandRejection::InvalidJson));
        assert_eq!(
            Command::from_json(br#"{"target":"","content":"hi"}"#),
            Err(CommandRejection::TargetRequired)
        );
        assert_eq!(
            Command::from_json(br#"{"target":"   ","content":"hi"}"#),
            Err(CommandRejection::TargetRequired)
        );
        assert_eq!(
            Command::from_json(br#"{"target":" Alice ","content":" hi "}"#),
            Ok(Command {
                target: "Alice".into(),
                content: " hi ".into()
            })
        );
        assert_eq!(
            Command::from_json(br#"{"target":"Bob","content":42}"#).unwrap().content,
            "42"
        );
        assert_eq!(
            Command::from_json(br#"{"target":"Bob"}"#).unwrap().content,
            ""
        );
    }

    #[test]
    fn test_falsy_fields_read_as_empty() {
        for content in ["0", "0.0", "false", "null", "[]", "{}", "\"\""] {
            let body = format!(r#"{{"target":"Bob","content":{content}}}"#);
            assert_eq!(
                Command::from_json(body.as_bytes()).unwrap().content,
                "",
                "content {content}"
            );
        }
        assert_eq!(
            Command::from_json(br#"{"target":"Bob","content":[1]}"#).unwrap().content,
            "[1]"
        );
        for target in ["0", "false", "[]"] {
            let body = format!(r#"{{"target":{target},"content":"hi"}}"#);
            assert_eq!(
                Command::from_json(body.as_bytes()),
                Err(CommandRejection::TargetRequired),
                "target {target}"
            );
        }
        assert_eq!(
            Command::from_json(br#"{"target":7,"content":"hi"}"#).unwrap().target,
            "7"
        );
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(CommandRejection::EmptyBody.code(), "empty_body");
        assert_eq!(CommandRejection::InvalidJson.code(), "invalid_json");
        assert_eq!(CommandRejection::TargetRequired.code(), "target_required");
    }
}
