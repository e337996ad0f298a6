//! Session record types.
//!
//! A session is one timer run of a given type. Rows are created eagerly at
//! start (`outcome = Started`) and move to exactly one terminal outcome when
//! the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of timer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Work => "work",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        }
    }

    /// Parse from a database string, defaulting to `Work` for unknown values.
    pub fn parse(s: &str) -> Self {
        match s {
            "short_break" => SessionType::ShortBreak,
            "long_break" => SessionType::LongBreak,
            _ => SessionType::Work,
        }
    }

    pub fn is_work(&self) -> bool {
        matches!(self, SessionType::Work)
    }
}

/// Lifecycle outcome of a session.
///
/// `Started` is the only non-terminal value; a row left in `Started` by a
/// crashed host is reconciled to `Canceled` on the next startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Started,
    Completed,
    Canceled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Started => "started",
            SessionOutcome::Completed => "completed",
            SessionOutcome::Canceled => "canceled",
        }
    }

    /// Parse from a database string, defaulting to `Started` for unknown values.
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => SessionOutcome::Completed,
            "canceled" => SessionOutcome::Canceled,
            _ => SessionOutcome::Started,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionOutcome::Started)
    }
}

/// A persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub planned_secs: u64,
    /// Seconds elapsed when the session ended; `None` while live.
    pub actual_secs: Option<u64>,
    pub session_type: SessionType,
    pub outcome: SessionOutcome,
    /// Optional back-reference to a task; no ownership implied.
    pub task_id: Option<i64>,
}

/// Payload for creating a session row; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub started_at: DateTime<Utc>,
    pub planned_secs: u64,
    pub session_type: SessionType,
    pub task_id: Option<i64>,
}

/// Query filter for listing sessions; results are ordered by `started_at`
/// descending.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub session_type: Option<SessionType>,
    pub outcome: Option<SessionOutcome>,
    pub limit: Option<u32>,
}
