//! Control surface wire types.
//!
//! Hosts (CLI, IPC, GUI) drive the timer through `Command` values and get a
//! `CommandResult` back. The JSON shape is `{ "type": "START", ... }` in and
//! `{ "success": bool, "message"?, "data"? }` out, so a thin IPC boundary
//! can forward payloads verbatim.

use serde::{Deserialize, Serialize};

use crate::session::SessionType;
use crate::timer::EngineStatus;

/// A command issued against the timer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Start {
        /// Session length in seconds; must be greater than zero.
        duration: u64,
        session_type: SessionType,
        #[serde(default)]
        task_id: Option<i64>,
    },
    Pause,
    Resume,
    Stop,
    Reset,
    GetStatus,
}

/// Result of applying a command. Failures never carry partial state: a
/// rejected command leaves the engine exactly as it was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EngineStatus>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>, status: EngineStatus) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(status),
        }
    }

    /// Success with an optional persistence warning appended to the message.
    pub fn ok_with_warning(
        message: impl Into<String>,
        warning: Option<String>,
        status: EngineStatus,
    ) -> Self {
        let message = match warning {
            Some(warning) => format!("{}; warning: {warning}", message.into()),
            None => message.into(),
        };
        Self::ok(message, status)
    }

    pub fn ok_status(status: EngineStatus) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(status),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_screaming_snake_case_tags() {
        let json = serde_json::to_value(Command::GetStatus).unwrap();
        assert_eq!(json["type"], "GET_STATUS");

        let start: Command = serde_json::from_str(
            r#"{"type": "START", "duration": 1500, "session_type": "work"}"#,
        )
        .unwrap();
        match start {
            Command::Start {
                duration,
                session_type,
                task_id,
            } => {
                assert_eq!(duration, 1500);
                assert_eq!(session_type, SessionType::Work);
                assert_eq!(task_id, None);
            }
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn unknown_command_kind_is_rejected_at_parse() {
        let result = serde_json::from_str::<Command>(r#"{"type": "SNOOZE"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn failure_result_omits_data() {
        let json = serde_json::to_value(CommandResult::fail("Timer is not running")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
    }
}
