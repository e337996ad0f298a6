//! State-change events pushed to the notifier gateway.
//!
//! Every accepted transition produces exactly one event; `progress` fires on
//! each tick while running. Hosts (UI, `timer watch`) subscribe and render;
//! delivery is best-effort and never blocks the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionType;
use crate::timer::EngineStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Started {
        status: EngineStatus,
        task_id: Option<i64>,
        at: DateTime<Utc>,
    },
    Progress {
        status: EngineStatus,
        at: DateTime<Utc>,
    },
    Paused {
        status: EngineStatus,
        at: DateTime<Utc>,
    },
    Resumed {
        status: EngineStatus,
        at: DateTime<Utc>,
    },
    /// The session ran to zero. Carries the finished session's type because
    /// the status snapshot is already back to idle by the time this fires.
    Completed {
        session_type: SessionType,
        status: EngineStatus,
        at: DateTime<Utc>,
    },
    /// The engine returned to idle without natural completion (stop/reset).
    Reset {
        status: EngineStatus,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Started { .. } => "started",
            Event::Progress { .. } => "progress",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Completed { .. } => "completed",
            Event::Reset { .. } => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TimerState;

    fn idle_status() -> EngineStatus {
        EngineStatus {
            status: TimerState::Idle,
            remaining: 0,
            planned_duration: 0,
            session_type: None,
            completed_pomodoros: 0,
        }
    }

    #[test]
    fn events_tag_with_snake_case_kind() {
        let event = Event::Completed {
            session_type: SessionType::Work,
            status: idle_status(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["session_type"], "work");
    }

    #[test]
    fn kind_matches_serde_tag() {
        let event = Event::Reset {
            status: idle_status(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}
