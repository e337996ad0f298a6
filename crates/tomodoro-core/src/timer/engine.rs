//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine. Remaining time is always
//! recomputed from elapsed wall-clock time, never decremented per interval,
//! so missed ticks and system suspend cannot desynchronize the countdown
//! from real elapsed time.
//!
//! ## State transitions
//!
//! ```text
//! Idle -> Running -> (Paused | completed)
//! Paused -> (Running | Idle)
//! Running -> Idle   (explicit stop)
//! ```
//!
//! Completion is transient: `tick_at` reports it once and the engine is back
//! in `Idle`, so the observable states are Idle, Running and Paused.
//!
//! Every mutating operation takes `now` explicitly, which keeps timing
//! semantics testable without sleeping; callers pass `Utc::now()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::{SessionOutcome, SessionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// A transition requested from a state that does not permit it.
///
/// Not part of the `CoreError` hierarchy: the control surface reports these
/// as `{ success: false, message }` and the engine state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Timer is not running")]
    NotRunning,
    #[error("Timer is not paused")]
    NotPaused,
    #[error("Timer is not active")]
    NotActive,
    #[error("Duration must be greater than zero")]
    ZeroDuration,
}

/// Snapshot of the live engine state returned by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub status: TimerState,
    /// Seconds left in the current session; 0 while idle.
    pub remaining: u64,
    pub planned_duration: u64,
    pub session_type: Option<SessionType>,
    pub completed_pomodoros: u32,
}

/// A live session finalized by stop, reset, or an implicit restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    /// Row id, if the start was persisted.
    pub session_id: Option<i64>,
    pub session_type: SessionType,
    pub outcome: SessionOutcome,
    pub actual_secs: u64,
    pub task_id: Option<i64>,
}

/// A session that ran to zero, reported by `tick_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub session_id: Option<i64>,
    pub session_type: SessionType,
    pub planned_secs: u64,
    pub task_id: Option<i64>,
}

/// Core timer state machine.
///
/// Owns no threads and performs no I/O; the `TimerService` layers the tick
/// driver, persistence, and notifications on top. Serializable so a
/// short-lived host can park the state between invocations -- a stale
/// snapshot stays correct because remaining time is wall-clock-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    session_type: Option<SessionType>,
    planned_secs: u64,
    /// Frozen remaining seconds; authoritative only while Paused.
    remaining_secs: u64,
    /// Wall-clock anchor (ms since epoch) for the elapsed-time formula.
    /// Rebased on resume so pauses do not count as elapsed time.
    #[serde(default)]
    anchor_epoch_ms: Option<i64>,
    /// When the session began; persisted on the session row.
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    /// Store row id of the live session, once created.
    #[serde(default)]
    session_id: Option<i64>,
    #[serde(default)]
    task_id: Option<i64>,
    #[serde(default)]
    completed_pomodoros: u32,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            session_type: None,
            planned_secs: 0,
            remaining_secs: 0,
            anchor_epoch_ms: None,
            started_at: None,
            session_id: None,
            task_id: None,
            completed_pomodoros: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    pub fn completed_pomodoros(&self) -> u32 {
        self.completed_pomodoros
    }

    /// Seconds left at `now`. Recomputed from the wall clock while Running;
    /// the frozen value otherwise. Never mutates.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match self.state {
            TimerState::Running => self.planned_secs.saturating_sub(self.elapsed_secs_at(now)),
            _ => self.remaining_secs,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> EngineStatus {
        EngineStatus {
            status: self.state,
            remaining: self.remaining_at(now),
            planned_duration: self.planned_secs,
            session_type: self.session_type,
            completed_pomodoros: self.completed_pomodoros,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new session, implicitly finalizing any live one.
    ///
    /// Returns the finalized prior session for the caller to persist, if
    /// there was one.
    pub fn start_at(
        &mut self,
        now: DateTime<Utc>,
        planned_secs: u64,
        session_type: SessionType,
        task_id: Option<i64>,
    ) -> Result<Option<SessionEnd>, TransitionError> {
        if planned_secs == 0 {
            return Err(TransitionError::ZeroDuration);
        }
        let prior = self.end_live_at(now);
        self.state = TimerState::Running;
        self.session_type = Some(session_type);
        self.planned_secs = planned_secs;
        self.remaining_secs = planned_secs;
        self.anchor_epoch_ms = Some(now.timestamp_millis());
        self.started_at = Some(now);
        self.session_id = None;
        self.task_id = task_id;
        Ok(prior)
    }

    /// Attach the store-assigned row id to the live session.
    pub fn bind_session(&mut self, id: i64) {
        self.session_id = Some(id);
    }

    /// Freeze the countdown. Valid only while Running.
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != TimerState::Running {
            return Err(TransitionError::NotRunning);
        }
        self.remaining_secs = self.remaining_at(now);
        self.state = TimerState::Paused;
        self.anchor_epoch_ms = None;
        Ok(())
    }

    /// Continue a paused countdown. Re-anchors the wall clock so the
    /// elapsed-time formula picks up exactly where pause froze it.
    pub fn resume_at(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != TimerState::Paused {
            return Err(TransitionError::NotPaused);
        }
        let elapsed_ms = self.planned_secs.saturating_sub(self.remaining_secs) as i64 * 1000;
        self.anchor_epoch_ms = Some(now.timestamp_millis() - elapsed_ms);
        self.state = TimerState::Running;
        Ok(())
    }

    /// End the current session early. Valid from Running or Paused.
    pub fn stop_at(&mut self, now: DateTime<Utc>) -> Result<SessionEnd, TransitionError> {
        match self.end_live_at(now) {
            Some(end) => Ok(end),
            None => Err(TransitionError::NotActive),
        }
    }

    /// Unconditionally return to Idle. The finalized live session is
    /// returned if there was one. The pomodoro tally survives: it is a
    /// per-process counter, not per-session state.
    pub fn reset_at(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        self.end_live_at(now)
    }

    /// Recompute remaining time; reports the completion when it hits zero.
    ///
    /// After a completion the engine is back in `Idle` with the pomodoro
    /// tally already incremented for Work sessions.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_secs = self.remaining_at(now);
        if self.remaining_secs > 0 {
            return None;
        }
        let completion = Completion {
            session_id: self.session_id,
            session_type: self.session_type.unwrap_or(SessionType::Work),
            planned_secs: self.planned_secs,
            task_id: self.task_id,
        };
        if completion.session_type.is_work() {
            self.completed_pomodoros += 1;
        }
        self.clear_session();
        Some(completion)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn elapsed_secs_at(&self, now: DateTime<Utc>) -> u64 {
        match self.anchor_epoch_ms {
            Some(anchor) => {
                let elapsed_ms = (now.timestamp_millis() - anchor).max(0) as u64;
                elapsed_ms / 1000
            }
            None => 0,
        }
    }

    /// Finalize the live session by elapsed-time check and return to Idle.
    fn end_live_at(&mut self, now: DateTime<Utc>) -> Option<SessionEnd> {
        if self.state == TimerState::Idle {
            return None;
        }
        let remaining = self.remaining_at(now);
        let outcome = if remaining == 0 {
            SessionOutcome::Completed
        } else {
            SessionOutcome::Canceled
        };
        let end = SessionEnd {
            session_id: self.session_id,
            session_type: self.session_type.unwrap_or(SessionType::Work),
            outcome,
            actual_secs: self.planned_secs.saturating_sub(remaining),
            task_id: self.task_id,
        };
        self.clear_session();
        Some(end)
    }

    fn clear_session(&mut self) {
        self.state = TimerState::Idle;
        self.session_type = None;
        self.planned_secs = 0;
        self.remaining_secs = 0;
        self.anchor_epoch_ms = None;
        self.started_at = None;
        self.session_id = None;
        self.task_id = None;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn started(planned: u64, session_type: SessionType) -> TimerEngine {
        let mut engine = TimerEngine::new();
        engine.start_at(t0(), planned, session_type, None).unwrap();
        engine
    }

    #[test]
    fn start_sets_running_with_full_remaining() {
        let engine = started(1500, SessionType::Work);
        let status = engine.status_at(t0());
        assert_eq!(status.status, TimerState::Running);
        assert_eq!(status.remaining, 1500);
        assert_eq!(status.planned_duration, 1500);
        assert_eq!(status.session_type, Some(SessionType::Work));
    }

    #[test]
    fn zero_duration_is_rejected_without_mutation() {
        let mut engine = TimerEngine::new();
        let err = engine
            .start_at(t0(), 0, SessionType::Work, None)
            .unwrap_err();
        assert_eq!(err, TransitionError::ZeroDuration);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn remaining_is_monotonically_non_increasing() {
        let engine = started(60, SessionType::Work);
        let r1 = engine.remaining_at(t0() + Duration::seconds(1));
        let r2 = engine.remaining_at(t0() + Duration::seconds(1));
        let r3 = engine.remaining_at(t0() + Duration::seconds(3));
        assert!(r2 <= r1);
        assert!(r3 <= r2);
        assert_eq!(r3, 57);
    }

    #[test]
    fn pause_freezes_and_resume_restores_remaining() {
        let mut engine = started(60, SessionType::Work);
        let pause_at = t0() + Duration::seconds(5);
        engine.pause_at(pause_at).unwrap();
        assert_eq!(engine.status_at(pause_at).remaining, 55);

        // A long pause must not count as elapsed time.
        let resume_at = pause_at + Duration::seconds(120);
        assert_eq!(engine.status_at(resume_at).remaining, 55);
        engine.resume_at(resume_at).unwrap();
        assert_eq!(engine.status_at(resume_at).remaining, 55);
        assert_eq!(
            engine.status_at(resume_at + Duration::seconds(2)).remaining,
            53
        );
    }

    #[test]
    fn stop_before_completion_is_canceled_with_elapsed() {
        let mut engine = started(60, SessionType::Work);
        let end = engine.stop_at(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(end.outcome, SessionOutcome::Canceled);
        assert_eq!(end.actual_secs, 5);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn stop_at_zero_remaining_is_completed() {
        let mut engine = started(10, SessionType::Work);
        let end = engine.stop_at(t0() + Duration::seconds(11)).unwrap();
        assert_eq!(end.outcome, SessionOutcome::Completed);
        assert_eq!(end.actual_secs, 10);
    }

    #[test]
    fn tick_completes_work_session_and_increments_tally() {
        let mut engine = started(1, SessionType::Work);
        assert!(engine.tick_at(t0()).is_none());
        let done = engine.tick_at(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(done.session_type, SessionType::Work);
        assert_eq!(done.planned_secs, 1);
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.completed_pomodoros(), 1);
    }

    #[test]
    fn break_completion_does_not_count_a_pomodoro() {
        let mut engine = started(1, SessionType::ShortBreak);
        engine.tick_at(t0() + Duration::seconds(2)).unwrap();
        assert_eq!(engine.completed_pomodoros(), 0);
    }

    #[test]
    fn pause_from_idle_is_rejected_without_side_effects() {
        let mut engine = TimerEngine::new();
        let before = engine.status_at(t0());
        assert_eq!(engine.pause_at(t0()), Err(TransitionError::NotRunning));
        assert_eq!(engine.status_at(t0()), before);
    }

    #[test]
    fn resume_from_running_is_rejected() {
        let mut engine = started(60, SessionType::Work);
        assert_eq!(
            engine.resume_at(t0() + Duration::seconds(1)),
            Err(TransitionError::NotPaused)
        );
        assert_eq!(engine.state(), TimerState::Running);
    }

    #[test]
    fn stop_from_idle_is_rejected() {
        let mut engine = TimerEngine::new();
        assert_eq!(engine.stop_at(t0()), Err(TransitionError::NotActive));
    }

    #[test]
    fn start_over_running_finalizes_the_prior_session() {
        let mut engine = started(60, SessionType::Work);
        engine.bind_session(7);
        let prior = engine
            .start_at(
                t0() + Duration::seconds(10),
                300,
                SessionType::ShortBreak,
                None,
            )
            .unwrap()
            .expect("prior session should be finalized");
        assert_eq!(prior.session_id, Some(7));
        assert_eq!(prior.outcome, SessionOutcome::Canceled);
        assert_eq!(prior.actual_secs, 10);
        assert_eq!(engine.session_id(), None);
        assert_eq!(
            engine.status_at(t0() + Duration::seconds(10)).remaining,
            300
        );
    }

    #[test]
    fn stop_from_paused_uses_frozen_remaining() {
        let mut engine = started(60, SessionType::Work);
        engine.pause_at(t0() + Duration::seconds(20)).unwrap();
        // Wall-clock time during the pause does not count.
        let end = engine.stop_at(t0() + Duration::seconds(500)).unwrap();
        assert_eq!(end.actual_secs, 20);
        assert_eq!(end.outcome, SessionOutcome::Canceled);
    }

    #[test]
    fn reset_clears_session_but_keeps_tally() {
        let mut engine = started(1, SessionType::Work);
        engine.tick_at(t0() + Duration::seconds(1)).unwrap();
        engine.start_at(t0() + Duration::seconds(2), 60, SessionType::Work, None)
            .unwrap();
        let end = engine.reset_at(t0() + Duration::seconds(3));
        assert!(end.is_some());
        assert_eq!(engine.state(), TimerState::Idle);
        assert_eq!(engine.status_at(t0()).planned_duration, 0);
        assert_eq!(engine.completed_pomodoros(), 1);
    }

    #[test]
    fn reset_while_idle_is_a_no_op() {
        let mut engine = TimerEngine::new();
        assert!(engine.reset_at(t0()).is_none());
    }

    #[test]
    fn snapshot_roundtrip_preserves_countdown() {
        let mut engine = started(300, SessionType::Work);
        engine.bind_session(42);
        let json = serde_json::to_string(&engine).unwrap();
        let restored: TimerEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.session_id(), Some(42));
        assert_eq!(
            restored.status_at(t0() + Duration::seconds(30)).remaining,
            270
        );
    }

    proptest! {
        /// Pausing must not lose or gain elapsed time, for any run/pause split.
        #[test]
        fn pause_resume_roundtrip_preserves_remaining(
            planned in 1u64..7200,
            run_ms in 0i64..3_600_000,
            idle_ms in 0i64..600_000,
        ) {
            let mut engine = TimerEngine::new();
            engine.start_at(t0(), planned, SessionType::Work, None).unwrap();
            let pause_at = t0() + Duration::milliseconds(run_ms);
            engine.pause_at(pause_at).unwrap();
            let frozen = engine.status_at(pause_at).remaining;
            let resume_at = pause_at + Duration::milliseconds(idle_ms);
            engine.resume_at(resume_at).unwrap();
            prop_assert_eq!(engine.status_at(resume_at).remaining, frozen);
        }
    }
}
