//! SQLite-based session, task, and settings storage.
//!
//! Provides persistent storage for:
//! - Timer sessions (live and finalized)
//! - Tasks with pomodoro estimates
//! - Aggregate statistics (daily and all-time)
//! - Key-value store for host state

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};

use super::{data_dir, SessionStore};
use crate::error::{CoreError, DatabaseError};
use crate::session::{NewSession, Session, SessionFilter, SessionOutcome, SessionType};
use crate::task::{NewTask, Priority, Task, TaskUpdate};

/// Aggregate statistics over sessions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_pomodoros: u64,
    pub canceled_pomodoros: u64,
    pub work_minutes: u64,
    pub break_minutes: u64,
}

/// SQLite database for sessions, tasks, and settings.
///
/// The connection sits behind a mutex so the database can be shared with
/// the tick driver as an `Arc<dyn SessionStore>`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/tomodoro/tomodoro.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("tomodoro.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (and migrate) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and ephemeral use).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    started_at   TEXT NOT NULL,
                    planned_secs INTEGER NOT NULL,
                    actual_secs  INTEGER,
                    session_type TEXT NOT NULL,
                    outcome      TEXT NOT NULL,
                    task_id      INTEGER
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                    content             TEXT NOT NULL,
                    priority            TEXT NOT NULL DEFAULT 'medium',
                    due_date            TEXT,
                    completed           INTEGER NOT NULL DEFAULT 0,
                    completed_at        TEXT,
                    estimated_pomodoros INTEGER NOT NULL DEFAULT 1,
                    actual_pomodoros    INTEGER NOT NULL DEFAULT 0,
                    created_at          TEXT NOT NULL,
                    updated_at          TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS settings (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                -- Indexes for the list/stats query patterns
                CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
                CREATE INDEX IF NOT EXISTS idx_sessions_outcome ON sessions(outcome);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Mark orphaned live rows as canceled, keeping `keep` (the session a
    /// restored engine snapshot still owns) untouched. Returns the number of
    /// rows reconciled. Run once at host startup.
    pub fn reconcile_started_sessions(&self, keep: Option<i64>) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let n = match keep {
            Some(id) => conn.execute(
                "UPDATE sessions SET outcome = 'canceled' WHERE outcome = 'started' AND id <> ?1",
                params![id],
            )?,
            None => conn.execute(
                "UPDATE sessions SET outcome = 'canceled' WHERE outcome = 'started'",
                [],
            )?,
        };
        Ok(n)
    }

    pub fn stats_today(&self) -> Result<Stats, DatabaseError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.collect_stats(Some(format!("{today}T00:00:00+00:00")))
    }

    pub fn stats_all(&self) -> Result<Stats, DatabaseError> {
        self.collect_stats(None)
    }

    fn collect_stats(&self, since: Option<String>) -> Result<Stats, DatabaseError> {
        let conn = self.conn();
        let mut sql = String::from(
            "SELECT session_type, outcome, COUNT(*), COALESCE(SUM(actual_secs), 0)
             FROM sessions",
        );
        if since.is_some() {
            sql.push_str(" WHERE started_at >= ?1");
        }
        sql.push_str(" GROUP BY session_type, outcome");

        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        };
        let rows: Vec<(String, String, u64, u64)> = match &since {
            Some(s) => stmt.query_map(params![s], map_row)?.collect::<Result<_, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<_, _>>()?,
        };

        let mut stats = Stats::default();
        for (session_type, outcome, count, secs) in rows {
            stats.total_sessions += count;
            let session_type = SessionType::parse(&session_type);
            match (session_type, SessionOutcome::parse(&outcome)) {
                (SessionType::Work, SessionOutcome::Completed) => {
                    stats.completed_pomodoros += count;
                    stats.work_minutes += secs / 60;
                }
                (SessionType::Work, SessionOutcome::Canceled) => {
                    stats.canceled_pomodoros += count;
                    stats.work_minutes += secs / 60;
                }
                (_, SessionOutcome::Completed) | (_, SessionOutcome::Canceled) => {
                    stats.break_minutes += secs / 60;
                }
                _ => {}
            }
        }
        Ok(stats)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn add_task(&self, task: &NewTask) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tasks (content, priority, due_date, estimated_pomodoros, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                task.content,
                task.priority.as_str(),
                task.due_date.map(|d| d.to_rfc3339()),
                task.estimated_pomodoros,
                now,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{TASK_SELECT} WHERE id = ?1"))?;
        Ok(stmt.query_row(params![id], row_to_task).optional()?)
    }

    /// Tasks ordered by priority (urgent first), then nearest due date.
    pub fn list_tasks(&self, include_completed: bool) -> Result<Vec<Task>, DatabaseError> {
        let mut sql = String::from(TASK_SELECT);
        if !include_completed {
            sql.push_str(" WHERE completed = 0");
        }
        sql.push_str(
            " ORDER BY
                CASE priority
                  WHEN 'urgent' THEN 1
                  WHEN 'high' THEN 2
                  WHEN 'medium' THEN 3
                  WHEN 'low' THEN 4
                  ELSE 5
                END,
                due_date IS NULL, due_date ASC",
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Apply a partial update. Setting `completed = true` also stamps
    /// `completed_at`. Returns false if no row matched.
    pub fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<bool, DatabaseError> {
        let mut fields: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(content) = &update.content {
            fields.push("content = ?");
            values.push(Box::new(content.clone()));
        }
        if let Some(priority) = update.priority {
            fields.push("priority = ?");
            values.push(Box::new(priority.as_str()));
        }
        if let Some(due_date) = update.due_date {
            fields.push("due_date = ?");
            values.push(Box::new(due_date.to_rfc3339()));
        }
        if let Some(estimate) = update.estimated_pomodoros {
            fields.push("estimated_pomodoros = ?");
            values.push(Box::new(estimate));
        }
        if let Some(completed) = update.completed {
            fields.push("completed = ?");
            values.push(Box::new(completed));
            if completed {
                fields.push("completed_at = ?");
                values.push(Box::new(Utc::now().to_rfc3339()));
            }
        }
        if fields.is_empty() {
            return Ok(false);
        }
        fields.push("updated_at = ?");
        values.push(Box::new(Utc::now().to_rfc3339()));
        values.push(Box::new(id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", fields.join(", "));
        let conn = self.conn();
        let n = conn.execute(
            &sql,
            rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
        )?;
        Ok(n > 0)
    }

    pub fn complete_task(&self, id: i64) -> Result<bool, DatabaseError> {
        self.update_task(
            id,
            &TaskUpdate {
                completed: Some(true),
                ..TaskUpdate::default()
            },
        )
    }

    pub fn delete_task(&self, id: i64) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let n = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}

impl SessionStore for Database {
    fn create_session(&self, session: &NewSession) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (started_at, planned_secs, session_type, outcome, task_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.started_at.to_rfc3339(),
                session.planned_secs,
                session.session_type.as_str(),
                SessionOutcome::Started.as_str(),
                session.task_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finalize_session(
        &self,
        id: i64,
        actual_secs: u64,
        outcome: SessionOutcome,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE sessions SET actual_secs = ?1, outcome = ?2 WHERE id = ?3",
            params![actual_secs, outcome.as_str(), id],
        )?;
        Ok(n > 0)
    }

    fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, DatabaseError> {
        let mut sql = String::from(
            "SELECT id, started_at, planned_secs, actual_secs, session_type, outcome, task_id
             FROM sessions WHERE 1=1",
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(since) = filter.since {
            values.push(Box::new(since.to_rfc3339()));
            sql.push_str(&format!(" AND started_at >= ?{}", values.len()));
        }
        if let Some(until) = filter.until {
            values.push(Box::new(until.to_rfc3339()));
            sql.push_str(&format!(" AND started_at <= ?{}", values.len()));
        }
        if let Some(session_type) = filter.session_type {
            values.push(Box::new(session_type.as_str()));
            sql.push_str(&format!(" AND session_type = ?{}", values.len()));
        }
        if let Some(outcome) = filter.outcome {
            values.push(Box::new(outcome.as_str()));
            sql.push_str(&format!(" AND outcome = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY started_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                row_to_session,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn record_task_pomodoro(&self, task_id: i64) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE tasks SET actual_pomodoros = actual_pomodoros + 1, updated_at = ?1
             WHERE id = ?2",
            params![Utc::now().to_rfc3339(), task_id],
        )?;
        Ok(n > 0)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        Ok(stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?)
    }

    fn save_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

const TASK_SELECT: &str = "SELECT id, content, priority, due_date, completed, completed_at,
            estimated_pomodoros, actual_pomodoros, created_at, updated_at
     FROM tasks";

/// Parse a datetime from an RFC 3339 string, falling back to now.
fn parse_datetime(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_session(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    let started_at: String = row.get(1)?;
    let session_type: String = row.get(4)?;
    let outcome: String = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        started_at: parse_datetime(&started_at),
        planned_secs: row.get(2)?,
        actual_secs: row.get(3)?,
        session_type: SessionType::parse(&session_type),
        outcome: SessionOutcome::parse(&outcome),
        task_id: row.get(6)?,
    })
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let priority: String = row.get(2)?;
    let due_date: Option<String> = row.get(3)?;
    let completed_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    Ok(Task {
        id: row.get(0)?,
        content: row.get(1)?,
        priority: Priority::parse(&priority),
        due_date: due_date.as_deref().map(parse_datetime),
        completed: row.get(4)?,
        completed_at: completed_at.as_deref().map(parse_datetime),
        estimated_pomodoros: row.get(6)?,
        actual_pomodoros: row.get(7)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}
