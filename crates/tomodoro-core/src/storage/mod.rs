pub mod config;
pub mod database;

pub use config::Config;
pub use database::{Database, Stats};

use std::path::PathBuf;

use crate::error::DatabaseError;
use crate::session::{NewSession, Session, SessionFilter, SessionOutcome};

/// Persistence contract consumed by the timer service.
///
/// The store is a durability sink, not a concurrency coordinator: the
/// service treats every failure as a logged warning and the in-memory state
/// stays authoritative.
pub trait SessionStore: Send + Sync {
    /// Insert a session row with `outcome = Started`; returns the new id.
    fn create_session(&self, session: &NewSession) -> Result<i64, DatabaseError>;

    /// Move a session to a terminal outcome. Returns false if no row matched.
    fn finalize_session(
        &self,
        id: i64,
        actual_secs: u64,
        outcome: SessionOutcome,
    ) -> Result<bool, DatabaseError>;

    /// Sessions matching `filter`, ordered by `started_at` descending.
    fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, DatabaseError>;

    /// Credit one completed pomodoro to a task.
    fn record_task_pomodoro(&self, task_id: i64) -> Result<bool, DatabaseError>;

    fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError>;

    fn save_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
}

/// Returns `~/.config/tomodoro[-dev]/` based on TOMODORO_ENV.
///
/// Set TOMODORO_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TOMODORO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tomodoro-dev")
    } else {
        base_dir.join("tomodoro")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
