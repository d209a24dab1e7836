//! Interaction-driven `last_activity` bookkeeping. Signals arrive over a
//! channel from whatever front end observes the user (the gate emits one per
//! admitted request; a UI shell would forward input events); the tracker
//! throttles the resulting writes so a busy user does not hammer the store.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use super::clock::Clock;
use super::manager::{SessionManager, SessionPatch};
use super::ACTIVITY_THROTTLE_SECONDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    /// Ordinary user interaction. Throttled.
    Interaction,
    /// The client came back into view; write through regardless of throttle.
    VisibilityRegained,
    /// Last-chance write before shutdown; also ends the consumer task.
    Teardown,
}

/// Convenience constructor for the signal channel.
#[must_use]
pub fn channel() -> (UnboundedSender<ActivitySignal>, UnboundedReceiver<ActivitySignal>) {
    mpsc::unbounded_channel()
}

/// Turns activity signals into `last_activity` updates. Never creates or
/// destroys sessions.
#[derive(Debug)]
pub struct ActivityTracker {
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    last_write: Mutex<Option<DateTime<Utc>>>,
}

impl ActivityTracker {
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions,
            clock,
            last_write: Mutex::new(None),
        }
    }

    /// Apply one signal. Returns whether a `last_activity` write happened.
    /// The throttle is only armed by an actual write, so a signal arriving
    /// while no session exists never suppresses a later one.
    pub fn observe(&self, signal: ActivitySignal) -> bool {
        let now = self.clock.now();

        if signal == ActivitySignal::Interaction {
            if let Ok(last_write) = self.last_write.lock() {
                if let Some(last) = *last_write {
                    if now - last < Duration::seconds(ACTIVITY_THROTTLE_SECONDS) {
                        return false;
                    }
                }
            }
        }

        if !self.sessions.update(SessionPatch::default()) {
            return false;
        }
        if let Ok(mut last_write) = self.last_write.lock() {
            *last_write = Some(now);
        }
        true
    }

    /// Consume signals until the channel closes or `Teardown` arrives.
    pub fn spawn(self: Arc<Self>, mut rx: UnboundedReceiver<ActivitySignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                self.observe(signal);
                if signal == ActivitySignal::Teardown {
                    break;
                }
            }
            debug!("activity tracker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::store::{MemoryStore, SessionStore, StoreError, KEY_LAST_ACTIVITY};
    use crate::session::{ClientContext, SessionUser};
    use crate::token::Role;

    fn setup() -> (Arc<ManualClock>, Arc<MemoryStore>, ActivityTracker) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionManager::new(store.clone(), clock.clone()));
        let user = SessionUser {
            id: "usr_01".to_string(),
            email: "amira.hassan@example.edu".to_string(),
            role: Role::Teacher,
        };
        sessions
            .create(&user, "tok", false, ClientContext::default())
            .expect("session should be created");
        let tracker = ActivityTracker::new(sessions, clock.clone());
        (clock, store, tracker)
    }

    fn last_activity(store: &MemoryStore) -> Result<Option<String>, StoreError> {
        store.get(KEY_LAST_ACTIVITY)
    }

    #[test]
    fn interactions_inside_window_are_throttled() -> Result<(), StoreError> {
        let (clock, store, tracker) = setup();

        clock.advance(Duration::seconds(10));
        assert!(tracker.observe(ActivitySignal::Interaction));
        let first = last_activity(&store)?;

        // Second signal 5 seconds later: swallowed
        clock.advance(Duration::seconds(5));
        assert!(!tracker.observe(ActivitySignal::Interaction));
        assert_eq!(last_activity(&store)?, first);

        // Past the window the next one writes again
        clock.advance(Duration::seconds(ACTIVITY_THROTTLE_SECONDS));
        assert!(tracker.observe(ActivitySignal::Interaction));
        assert_ne!(last_activity(&store)?, first);
        Ok(())
    }

    #[test]
    fn visibility_and_teardown_bypass_throttle() -> Result<(), StoreError> {
        let (clock, store, tracker) = setup();

        assert!(tracker.observe(ActivitySignal::Interaction));
        let first = last_activity(&store)?;

        clock.advance(Duration::seconds(1));
        assert!(tracker.observe(ActivitySignal::VisibilityRegained));
        let second = last_activity(&store)?;
        assert_ne!(second, first);

        clock.advance(Duration::seconds(1));
        assert!(tracker.observe(ActivitySignal::Teardown));
        assert_ne!(last_activity(&store)?, second);
        Ok(())
    }

    #[test]
    fn signal_without_session_does_not_arm_throttle() -> Result<(), StoreError> {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(SessionManager::new(store.clone(), clock.clone()));
        let tracker = ActivityTracker::new(sessions.clone(), clock.clone());

        // Nobody is signed in yet; nothing to write
        assert!(!tracker.observe(ActivitySignal::Interaction));
        assert!(last_activity(&store)?.is_none());

        let user = SessionUser {
            id: "usr_01".to_string(),
            email: "amira.hassan@example.edu".to_string(),
            role: Role::Teacher,
        };
        sessions.create(&user, "tok", false, ClientContext::default())?;

        // The first signal after sign-in writes immediately
        clock.advance(Duration::seconds(1));
        assert!(tracker.observe(ActivitySignal::Interaction));
        Ok(())
    }

    #[tokio::test]
    async fn consumer_stops_on_teardown() {
        let (_clock, _store, tracker) = setup();
        let (tx, rx) = channel();
        let handle = Arc::new(tracker).spawn(rx);

        tx.send(ActivitySignal::Interaction).expect("send");
        tx.send(ActivitySignal::Teardown).expect("send");

        handle.await.expect("tracker task should finish");
    }
}
