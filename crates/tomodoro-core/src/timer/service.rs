//! Timer session service.
//!
//! `TimerService` wraps the pure `TimerEngine` with everything the engine
//! deliberately does not own: mutation serialization, the one-second tick
//! driver, session persistence, and event notification. One instance per
//! host; store and notifier are injected, so tests run against fakes.
//!
//! Per transition the order is: state mutated, store write issued,
//! notification pushed. The in-memory state is authoritative -- a failed
//! store write is logged and surfaced as a warning in the command result,
//! never allowed to block or revert the transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::engine::{Completion, EngineStatus, SessionEnd, TimerEngine, TimerState};
use crate::control::{Command, CommandResult};
use crate::events::Event;
use crate::notify::Notifier;
use crate::session::{NewSession, SessionOutcome, SessionType};
use crate::storage::SessionStore;

pub struct TimerService {
    engine: Mutex<TimerEngine>,
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    /// Live tick task, present only between start/resume and the next
    /// transition that leaves Running.
    ticker: Mutex<Option<AbortHandle>>,
    /// Whether transitions into Running should spawn the tick task. Off for
    /// one-shot hosts that have no async runtime and tick explicitly.
    drive_ticks: AtomicBool,
}

impl TimerService {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_engine(TimerEngine::new(), store, notifier)
    }

    /// Build around a restored engine snapshot.
    pub fn with_engine(
        engine: TimerEngine,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine: Mutex::new(engine),
            store,
            notifier,
            ticker: Mutex::new(None),
            drive_ticks: AtomicBool::new(false),
        }
    }

    /// Turn on the one-second tick driver. Must be called from within a
    /// tokio runtime; if the engine is already Running the task starts
    /// immediately.
    pub fn enable_ticker(self: &Arc<Self>) {
        self.drive_ticks.store(true, Ordering::Relaxed);
        let running = self.engine().state() == TimerState::Running;
        if running {
            self.spawn_ticker();
        }
    }

    /// Clone of the current engine state, for hosts that park it between
    /// invocations.
    pub fn snapshot(&self) -> TimerEngine {
        self.engine().clone()
    }

    /// Apply a control-surface command.
    pub fn handle(self: &Arc<Self>, command: Command) -> CommandResult {
        match command {
            Command::Start {
                duration,
                session_type,
                task_id,
            } => self.start(duration, session_type, task_id),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
            Command::Reset => self.reset(),
            Command::GetStatus => self.status(),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn start(
        self: &Arc<Self>,
        duration_secs: u64,
        session_type: SessionType,
        task_id: Option<i64>,
    ) -> CommandResult {
        if duration_secs == 0 {
            return CommandResult::fail("Duration must be greater than zero");
        }
        let now = Utc::now();
        let mut engine = self.engine();
        self.catch_up(&mut engine, now);

        let prior = match engine.start_at(now, duration_secs, session_type, task_id) {
            Ok(prior) => prior,
            Err(e) => return CommandResult::fail(e.to_string()),
        };
        let mut warning = prior.and_then(|end| self.finalize_end(&end));

        let row = NewSession {
            started_at: now,
            planned_secs: duration_secs,
            session_type,
            task_id,
        };
        match self.store.create_session(&row) {
            Ok(id) => engine.bind_session(id),
            Err(e) => {
                warn!(error = %e, "failed to persist session start");
                warning = Some(format!("session not persisted: {e}"));
            }
        }
        let status = engine.status_at(now);
        drop(engine);

        self.spawn_ticker_if_enabled();
        self.notifier.notify(&Event::Started {
            status: status.clone(),
            task_id,
            at: now,
        });
        debug!(session_type = session_type.as_str(), duration_secs, "session started");
        CommandResult::ok_with_warning("Timer started", warning, status)
    }

    pub fn pause(&self) -> CommandResult {
        let now = Utc::now();
        let mut engine = self.engine();
        self.catch_up(&mut engine, now);
        if let Err(e) = engine.pause_at(now) {
            return CommandResult::fail(e.to_string());
        }
        self.cancel_ticker();
        let status = engine.status_at(now);
        drop(engine);

        self.notifier.notify(&Event::Paused {
            status: status.clone(),
            at: now,
        });
        CommandResult::ok("Timer paused", status)
    }

    pub fn resume(self: &Arc<Self>) -> CommandResult {
        let now = Utc::now();
        let mut engine = self.engine();
        if let Err(e) = engine.resume_at(now) {
            return CommandResult::fail(e.to_string());
        }
        let status = engine.status_at(now);
        drop(engine);

        self.spawn_ticker_if_enabled();
        self.notifier.notify(&Event::Resumed {
            status: status.clone(),
            at: now,
        });
        CommandResult::ok("Timer resumed", status)
    }

    pub fn stop(&self) -> CommandResult {
        let now = Utc::now();
        let mut engine = self.engine();
        self.catch_up(&mut engine, now);
        let end = match engine.stop_at(now) {
            Ok(end) => end,
            Err(e) => return CommandResult::fail(e.to_string()),
        };
        self.cancel_ticker();
        let warning = self.finalize_end(&end);
        let status = engine.status_at(now);
        drop(engine);

        self.notifier.notify(&Event::Reset {
            status: status.clone(),
            at: now,
        });
        CommandResult::ok_with_warning("Timer stopped", warning, status)
    }

    pub fn reset(&self) -> CommandResult {
        let now = Utc::now();
        let mut engine = self.engine();
        self.cancel_ticker();
        let warning = engine.reset_at(now).and_then(|end| self.finalize_end(&end));
        let status = engine.status_at(now);
        drop(engine);

        self.notifier.notify(&Event::Reset {
            status: status.clone(),
            at: now,
        });
        CommandResult::ok_with_warning("Timer reset", warning, status)
    }

    /// Pure read; recomputes remaining from the wall clock, mutates nothing.
    pub fn status(&self) -> CommandResult {
        let engine = self.engine();
        CommandResult::ok_status(engine.status_at(Utc::now()))
    }

    /// Catch-up tick for hosts without the driver: applies a completion that
    /// fell due since the last command, then reports the status.
    pub fn poll(&self) -> EngineStatus {
        let now = Utc::now();
        let mut engine = self.engine();
        self.catch_up(&mut engine, now);
        engine.status_at(now)
    }

    // ── Tick driver ──────────────────────────────────────────────────

    /// One driver pass. Returns false once the engine is no longer Running.
    fn tick(&self) -> bool {
        let now = Utc::now();
        let mut engine = self.engine();
        if engine.state() != TimerState::Running {
            return false;
        }
        match engine.tick_at(now) {
            Some(done) => {
                self.handle_completion(&engine, done, now);
                false
            }
            None => {
                self.notifier.notify(&Event::Progress {
                    status: engine.status_at(now),
                    at: now,
                });
                true
            }
        }
    }

    fn spawn_ticker_if_enabled(self: &Arc<Self>) {
        if self.drive_ticks.load(Ordering::Relaxed) {
            self.spawn_ticker();
        }
    }

    fn spawn_ticker(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick resolves immediately; it doubles as the initial
            // progress push after start/resume.
            loop {
                interval.tick().await;
                if !service.tick() {
                    break;
                }
            }
        });
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.replace(handle.abort_handle()) {
            old.abort();
        }
    }

    fn cancel_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn engine(&self) -> MutexGuard<'_, TimerEngine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn catch_up(&self, engine: &mut TimerEngine, now: DateTime<Utc>) {
        if let Some(done) = engine.tick_at(now) {
            self.handle_completion(engine, done, now);
        }
    }

    fn handle_completion(&self, engine: &TimerEngine, done: Completion, now: DateTime<Utc>) {
        self.cancel_ticker();
        if let Some(id) = done.session_id {
            if let Err(e) =
                self.store
                    .finalize_session(id, done.planned_secs, SessionOutcome::Completed)
            {
                warn!(error = %e, session_id = id, "failed to record session completion");
            }
        }
        if done.session_type.is_work() {
            if let Some(task_id) = done.task_id {
                if let Err(e) = self.store.record_task_pomodoro(task_id) {
                    warn!(error = %e, task_id, "failed to credit pomodoro to task");
                }
            }
        }
        self.notifier.notify(&Event::Completed {
            session_type: done.session_type,
            status: engine.status_at(now),
            at: now,
        });
        debug!(session_type = done.session_type.as_str(), "session completed");
    }

    /// Persist a finalized session. Returns a warning message on failure;
    /// the in-memory transition has already applied either way.
    fn finalize_end(&self, end: &SessionEnd) -> Option<String> {
        let id = end.session_id?;
        match self
            .store
            .finalize_session(id, end.actual_secs, end.outcome)
        {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, session_id = id, "failed to finalize session");
                Some(format!("session not persisted: {e}"))
            }
        }
    }
}
