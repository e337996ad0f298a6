//! # Tomodoro Core Library
//!
//! Core business logic for the Tomodoro Pomodoro timer: a wall-clock-based
//! timer session engine, SQLite-backed session/task/settings storage, and a
//! typed command surface. Hosts (the CLI binary, a GUI bridge) stay thin:
//! they construct a [`TimerService`] with a store and a notifier and forward
//! commands to it.
//!
//! ## Architecture
//!
//! - **Timer Engine**: [`TimerEngine`] is a pure state machine whose
//!   remaining time is always recomputed from elapsed wall-clock time;
//!   [`TimerService`] adds mutation serialization, the one-second tick
//!   driver, persistence, and notification on top
//! - **Storage**: [`Database`] persists sessions, tasks, and settings in
//!   SQLite; [`Config`] holds TOML-based preferences
//! - **Control surface**: [`Command`]/[`CommandResult`] wire types for
//!   UI/IPC/CLI boundaries
//! - **Notifier gateway**: [`Notifier`] implementations fan state-change
//!   [`Event`]s out to observers, best-effort

pub mod control;
pub mod error;
pub mod events;
pub mod notify;
pub mod session;
pub mod storage;
pub mod task;
pub mod timer;

pub use control::{Command, CommandResult};
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use notify::{ChannelNotifier, Notifier, NullNotifier};
pub use session::{NewSession, Session, SessionFilter, SessionOutcome, SessionType};
pub use storage::{Config, Database, SessionStore, Stats};
pub use task::{NewTask, Priority, Task, TaskUpdate};
pub use timer::{EngineStatus, TimerEngine, TimerService, TimerState};
