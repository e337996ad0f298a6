//! Notifier gateway.
//!
//! The timer service pushes every state-change event through a `Notifier`.
//! Delivery is best-effort: an implementation must not block and has no way
//! to fail the engine's transition.

use tokio::sync::broadcast;

use crate::events::Event;
use crate::session::SessionType;

pub trait Notifier: Send + Sync {
    /// Push an event to the gateway. Must not block the caller.
    fn notify(&self, event: &Event);
}

/// Discards every event. Useful for one-shot hosts and tests.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &Event) {}
}

/// Fans events out to broadcast subscribers (the `timer watch` loop, a GUI
/// bridge). Sending to zero receivers is not an error.
pub struct ChannelNotifier {
    tx: broadcast::Sender<Event>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &Event) {
        let _ = self.tx.send(event.clone());
    }
}

/// Notification title and body for a finished session, keyed by type.
pub fn completion_message(session_type: SessionType) -> (&'static str, &'static str) {
    match session_type {
        SessionType::Work => ("Work session finished", "Time for a break!"),
        SessionType::ShortBreak => ("Short break finished", "Ready to get back to work?"),
        SessionType::LongBreak => ("Long break finished", "Ready for a new work cycle?"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{EngineStatus, TimerState};
    use chrono::Utc;

    fn reset_event() -> Event {
        Event::Reset {
            status: EngineStatus {
                status: TimerState::Idle,
                remaining: 0,
                planned_duration: 0,
                session_type: None,
                completed_pomodoros: 0,
            },
            at: Utc::now(),
        }
    }

    #[test]
    fn channel_notifier_delivers_to_subscribers() {
        let notifier = ChannelNotifier::new(16);
        let mut rx = notifier.subscribe();
        notifier.notify(&reset_event());
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), "reset");
    }

    #[test]
    fn notify_without_subscribers_is_fine() {
        let notifier = ChannelNotifier::new(16);
        notifier.notify(&reset_event());
    }

    #[test]
    fn completion_messages_distinguish_session_types() {
        let (work_title, _) = completion_message(SessionType::Work);
        let (short_title, _) = completion_message(SessionType::ShortBreak);
        let (long_title, _) = completion_message(SessionType::LongBreak);
        assert_ne!(work_title, short_title);
        assert_ne!(short_title, long_title);
    }
}
