//! Timer control commands.
//!
//! One-shot commands restore the engine snapshot from the settings store,
//! apply the command, print the result as JSON, and save the snapshot back.
//! The wall-clock countdown stays correct across invocations because
//! remaining time is recomputed, never stored as a running count.
//!
//! `watch` runs the live tick driver and streams events as JSON lines.

use std::sync::Arc;

use clap::Subcommand;
use tokio::sync::broadcast::error::RecvError;

use tomodoro_core::notify::completion_message;
use tomodoro_core::{
    ChannelNotifier, Command, Config, Database, Event, NullNotifier, SessionStore, SessionType,
    TimerEngine, TimerService, TimerState,
};

const ENGINE_KEY: &str = "timer_engine";

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SessionTypeArg {
    Work,
    ShortBreak,
    LongBreak,
}

impl From<SessionTypeArg> for SessionType {
    fn from(arg: SessionTypeArg) -> Self {
        match arg {
            SessionTypeArg::Work => SessionType::Work,
            SessionTypeArg::ShortBreak => SessionType::ShortBreak,
            SessionTypeArg::LongBreak => SessionType::LongBreak,
        }
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a session
    Start {
        /// Session type
        #[arg(long, value_enum, default_value = "work")]
        session_type: SessionTypeArg,
        /// Duration in minutes; defaults to the configured value for the type
        #[arg(long)]
        minutes: Option<u64>,
        /// Task ID to link the session to
        #[arg(long)]
        task_id: Option<i64>,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop the current session
    Stop,
    /// Reset to idle
    Reset,
    /// Print current timer status as JSON
    Status,
    /// Run the live tick loop, streaming events as JSON lines
    Watch,
}

fn load_engine(db: &Database) -> TimerEngine {
    if let Ok(Some(json)) = db.get_setting(ENGINE_KEY) {
        if let Ok(engine) = serde_json::from_str::<TimerEngine>(&json) {
            return engine;
        }
    }
    TimerEngine::new()
}

fn save_engine(db: &Database, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(engine)?;
    db.save_setting(ENGINE_KEY, &json)?;
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);
    let engine = load_engine(&db);
    // Rows orphaned by a dead host become canceled; the snapshot's own
    // session stays live.
    db.reconcile_started_sessions(engine.session_id())?;

    if let TimerAction::Watch = action {
        return watch(db, engine);
    }

    let service = Arc::new(TimerService::with_engine(
        engine,
        db.clone(),
        Arc::new(NullNotifier),
    ));
    let result = match action {
        TimerAction::Start {
            session_type,
            minutes,
            task_id,
        } => {
            let session_type = SessionType::from(session_type);
            let config = Config::load_or_default();
            let duration = match minutes {
                Some(m) => m * 60,
                None => config.duration_secs(session_type),
            };
            service.handle(Command::Start {
                duration,
                session_type,
                task_id,
            })
        }
        TimerAction::Pause => service.handle(Command::Pause),
        TimerAction::Resume => service.handle(Command::Resume),
        TimerAction::Stop => service.handle(Command::Stop),
        TimerAction::Reset => service.handle(Command::Reset),
        TimerAction::Status => {
            // Catch up first so an expired session completes and persists.
            service.poll();
            service.handle(Command::GetStatus)
        }
        TimerAction::Watch => unreachable!(),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    save_engine(&db, &service.snapshot())?;
    Ok(())
}

/// Session type to chain after `finished`, per the configured cadence.
fn next_session(finished: SessionType, completed_pomodoros: u32, config: &Config) -> SessionType {
    match finished {
        SessionType::Work => {
            let interval = config.timer.long_break_interval.max(1);
            if completed_pomodoros % interval == 0 {
                SessionType::LongBreak
            } else {
                SessionType::ShortBreak
            }
        }
        SessionType::ShortBreak | SessionType::LongBreak => SessionType::Work,
    }
}

fn watch(db: Arc<Database>, engine: TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = Config::load_or_default();
        let notifier = Arc::new(ChannelNotifier::new(64));
        let mut rx = notifier.subscribe();
        let service = Arc::new(TimerService::with_engine(engine, db.clone(), notifier));
        service.enable_ticker();

        if service.poll().status != TimerState::Running {
            println!("No running session; start one with `tomodoro timer start`.");
            save_engine(&db, &service.snapshot())?;
            return Ok(());
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if let Event::Completed {
                        session_type,
                        status,
                        ..
                    } = &event
                    {
                        if config.notifications.enabled {
                            let (title, body) = completion_message(*session_type);
                            eprintln!("{title} -- {body}");
                        }
                        // Auto-chaining is host policy, not engine behavior.
                        if !config.timer.auto_start_next {
                            break;
                        }
                        let next = next_session(*session_type, status.completed_pomodoros, &config);
                        let result = service.handle(Command::Start {
                            duration: config.duration_secs(next),
                            session_type: next,
                            task_id: None,
                        });
                        if !result.success {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        save_engine(&db, &service.snapshot())?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_interval(interval: u32) -> Config {
        let mut config = Config::default();
        config.timer.long_break_interval = interval;
        config
    }

    #[test]
    fn work_chains_into_short_break_until_the_interval() {
        let config = config_with_interval(4);
        assert_eq!(
            next_session(SessionType::Work, 1, &config),
            SessionType::ShortBreak
        );
        assert_eq!(
            next_session(SessionType::Work, 3, &config),
            SessionType::ShortBreak
        );
        assert_eq!(
            next_session(SessionType::Work, 4, &config),
            SessionType::LongBreak
        );
        assert_eq!(
            next_session(SessionType::Work, 8, &config),
            SessionType::LongBreak
        );
    }

    #[test]
    fn breaks_chain_back_into_work() {
        let config = config_with_interval(4);
        assert_eq!(
            next_session(SessionType::ShortBreak, 2, &config),
            SessionType::Work
        );
        assert_eq!(
            next_session(SessionType::LongBreak, 4, &config),
            SessionType::Work
        );
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        let config = config_with_interval(0);
        assert_eq!(
            next_session(SessionType::Work, 1, &config),
            SessionType::LongBreak
        );
    }
}
