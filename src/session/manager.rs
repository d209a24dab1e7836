use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error};
use ulid::Ulid;

use super::clock::Clock;
use super::store::{
    SessionStore, StoreError, KEY_EXPIRY, KEY_LAST_ACTIVITY, KEY_RECORD, KEY_SESSION_ID,
    SESSION_KEYS,
};
use super::{ClientContext, Session, SessionInfo, SessionUser, ACTIVITY_TIMEOUT_SECONDS};

/// Fields that `update` may merge into the current session. `last_activity`
/// is always bumped, whether or not the patch carries anything.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub token: Option<String>,
}

/// Owns the single current session: creation, validity, refresh, extension,
/// and teardown. Storage backend and clock are injected so tests run against
/// an in-memory store and a manual clock.
///
/// Storage failures on the read path are logged and reported as "no session";
/// they never reach the caller.
#[derive(Debug)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a new session for `user`, implicitly retiring any prior one.
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted.
    pub fn create(
        &self,
        user: &SessionUser,
        token: &str,
        remember_me: bool,
        client: ClientContext,
    ) -> Result<Session, StoreError> {
        let now = self.clock.now();
        let session = Session {
            id: Ulid::new().to_string(),
            user_id: user.id.clone(),
            token: token.to_string(),
            created_at: now,
            expires_at: now
                + Duration::seconds(if remember_me {
                    super::REMEMBER_ME_TTL_SECONDS
                } else {
                    super::SESSION_TTL_SECONDS
                }),
            last_activity: now,
            remember_me,
            client,
        };
        self.persist(&session)?;
        debug!(session_id = %session.id, remember_me, "session created");
        Ok(session)
    }

    /// Current session, or `None`. An invalid record is destroyed on the way
    /// out (lazy invalidation), so callers never observe a dead session even
    /// if the cleanup sweep has not run.
    #[must_use]
    pub fn get(&self) -> Option<Session> {
        let session = self.load()?;
        if self.is_valid(&session) {
            Some(session)
        } else {
            debug!(session_id = %session.id, "session no longer valid, purging");
            self.clear();
            None
        }
    }

    /// The one validity rule, used by `get` and the cleanup sweep alike:
    /// unexpired, and either remember-me or recently active.
    #[must_use]
    pub fn is_valid(&self, session: &Session) -> bool {
        let now = self.clock.now();
        if now >= session.expires_at {
            return false;
        }
        if session.remember_me {
            return true;
        }
        now - session.last_activity <= Duration::seconds(ACTIVITY_TIMEOUT_SECONDS)
    }

    /// Merge `patch` into the current session and bump `last_activity`.
    /// Returns whether a write happened; no-op (and `false`) when there is
    /// no current session or the write fails.
    pub fn update(&self, patch: SessionPatch) -> bool {
        let Some(mut session) = self.get() else {
            return false;
        };
        if let Some(token) = patch.token {
            session.token = token;
        }
        session.last_activity = self.clock.now();
        if let Err(err) = self.persist(&session) {
            error!("failed to persist session update: {err}");
            return false;
        }
        true
    }

    /// Push `expires_at` a full duration class into the future and bump
    /// `last_activity`. The new expiry is strictly later than the old one,
    /// even when no time has passed since it was last set. Returns the
    /// renewed session, or `None` when there is no current session.
    pub fn refresh(&self) -> Option<Session> {
        let mut session = self.get()?;
        let now = self.clock.now();
        let renewed = now + Duration::seconds(session.ttl_seconds());
        session.expires_at = if renewed > session.expires_at {
            renewed
        } else {
            session.expires_at + Duration::seconds(1)
        };
        session.last_activity = now;
        if let Err(err) = self.persist(&session) {
            error!("failed to persist session refresh: {err}");
            return None;
        }
        debug!(session_id = %session.id, expires_at = %session.expires_at, "session refreshed");
        Some(session)
    }

    /// Add `extra` (default one hour) to the existing expiry without touching
    /// `last_activity`.
    pub fn extend(&self, extra: Option<Duration>) {
        let Some(mut session) = self.get() else {
            return;
        };
        session.expires_at += extra.unwrap_or_else(|| Duration::hours(1));
        if let Err(err) = self.persist(&session) {
            error!("failed to persist session extension: {err}");
        }
    }

    /// Remove every persisted session artifact. Idempotent.
    pub fn clear(&self) {
        for key in SESSION_KEYS {
            if let Err(err) = self.store.remove(key) {
                error!(key, "failed to remove session key: {err}");
            }
        }
    }

    /// Derived read view, or `None` when there is no current session.
    #[must_use]
    pub fn info(&self) -> Option<SessionInfo> {
        let session = self.get()?;
        let remaining = (session.expires_at - self.clock.now()).num_seconds();
        Some(SessionInfo {
            id: session.id,
            user_id: session.user_id,
            expires_at: session.expires_at,
            remember_me: session.remember_me,
            time_remaining_seconds: remaining.max(0),
        })
    }

    /// Load the raw record, reconstructing temporal fields from their own
    /// slots. Storage and parse failures read as "no session".
    fn load(&self) -> Option<Session> {
        let raw = match self.store.get(KEY_RECORD) {
            Ok(raw) => raw?,
            Err(err) => {
                error!("failed to read session record: {err}");
                return None;
            }
        };
        let mut session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(err) => {
                error!("corrupt session record, discarding: {err}");
                self.clear();
                return None;
            }
        };

        // The expiry and last-activity slots are written on every mutation
        // and win over the snapshot inside the record.
        if let Some(expires_at) = self.read_timestamp(KEY_EXPIRY) {
            session.expires_at = expires_at;
        }
        if let Some(last_activity) = self.read_timestamp(KEY_LAST_ACTIVITY) {
            session.last_activity = last_activity;
        }

        Some(session)
    }

    fn read_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.store.get(key).ok()??;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                error!(key, "unparseable session timestamp: {err}");
                None
            }
        }
    }

    fn persist(&self, session: &Session) -> Result<(), StoreError> {
        let record = serde_json::to_string(session)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        self.store.set(KEY_RECORD, &record)?;
        self.store.set(KEY_EXPIRY, &session.expires_at.to_rfc3339())?;
        self.store
            .set(KEY_LAST_ACTIVITY, &session.last_activity.to_rfc3339())?;
        self.store.set(KEY_SESSION_ID, &session.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::store::MemoryStore;
    use crate::session::{
        ACTIVITY_TIMEOUT_SECONDS, REMEMBER_ME_TTL_SECONDS, SESSION_TTL_SECONDS,
    };
    use crate::token::Role;

    const NOW: i64 = 1_700_000_000;

    fn test_user() -> SessionUser {
        SessionUser {
            id: "usr_01".to_string(),
            email: "amira.hassan@example.edu".to_string(),
            role: Role::Teacher,
        }
    }

    fn manager() -> (Arc<ManualClock>, SessionManager) {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store, clock.clone());
        (clock, manager)
    }

    #[test]
    fn create_then_get_roundtrips() -> Result<(), StoreError> {
        let (_clock, manager) = manager();
        let created = manager.create(&test_user(), "tok", false, ClientContext::default())?;

        let loaded = manager.get().expect("session should be current");
        assert_eq!(loaded, created);
        assert_eq!(loaded.created_at, loaded.last_activity);
        assert_eq!(
            (loaded.expires_at - loaded.created_at).num_seconds(),
            SESSION_TTL_SECONDS
        );
        Ok(())
    }

    #[test]
    fn create_retires_prior_session() -> Result<(), StoreError> {
        let (_clock, manager) = manager();
        let first = manager.create(&test_user(), "tok-1", false, ClientContext::default())?;
        let second = manager.create(&test_user(), "tok-2", false, ClientContext::default())?;

        let current = manager.get().expect("session should be current");
        assert_ne!(current.id, first.id);
        assert_eq!(current.id, second.id);
        assert_eq!(current.token, "tok-2");
        Ok(())
    }

    #[test]
    fn expired_session_reads_as_none_regardless_of_activity() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", true, ClientContext::default())?;

        clock.advance(Duration::seconds(REMEMBER_ME_TTL_SECONDS));
        assert!(manager.get().is_none());
        // Lazy invalidation removed the record, not just hid it
        assert!(manager.info().is_none());
        Ok(())
    }

    #[test]
    fn inactivity_kills_regular_session_before_expiry() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", false, ClientContext::default())?;

        clock.advance(Duration::seconds(ACTIVITY_TIMEOUT_SECONDS + 1));
        assert!(manager.get().is_none());
        Ok(())
    }

    #[test]
    fn remember_me_bypasses_inactivity() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", true, ClientContext::default())?;

        clock.advance(Duration::seconds(ACTIVITY_TIMEOUT_SECONDS * 10));
        assert!(manager.get().is_some());
        Ok(())
    }

    #[test]
    fn activity_keeps_regular_session_alive() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", false, ClientContext::default())?;

        for _ in 0..4 {
            clock.advance(Duration::seconds(ACTIVITY_TIMEOUT_SECONDS - 60));
            manager.update(SessionPatch::default());
        }
        assert!(manager.get().is_some());
        Ok(())
    }

    #[test]
    fn refresh_moves_expiry_forward_and_is_monotonic() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        let created = manager.create(&test_user(), "tok", false, ClientContext::default())?;

        clock.advance(Duration::seconds(600));
        let refreshed = manager.refresh().expect("session should refresh");
        assert!(refreshed.expires_at > created.expires_at);
        assert!(refreshed.last_activity >= created.last_activity);
        assert_eq!(
            (refreshed.expires_at - clock.now()).num_seconds(),
            SESSION_TTL_SECONDS
        );
        Ok(())
    }

    #[test]
    fn refresh_at_same_instant_still_extends() -> Result<(), StoreError> {
        let (_clock, manager) = manager();
        let created = manager.create(&test_user(), "tok", false, ClientContext::default())?;

        // No time has passed; the expiry must still move forward
        let refreshed = manager.refresh().expect("session should refresh");
        assert!(refreshed.expires_at > created.expires_at);

        let again = manager.refresh().expect("session should refresh");
        assert!(again.expires_at > refreshed.expires_at);
        Ok(())
    }

    #[test]
    fn refresh_without_session_is_none() {
        let (_clock, manager) = manager();
        assert!(manager.refresh().is_none());
    }

    #[test]
    fn extend_leaves_last_activity_alone() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        let created = manager.create(&test_user(), "tok", false, ClientContext::default())?;

        clock.advance(Duration::seconds(120));
        manager.extend(Some(Duration::hours(2)));

        let session = manager.get().expect("session should be current");
        assert_eq!(session.expires_at, created.expires_at + Duration::hours(2));
        assert_eq!(session.last_activity, created.last_activity);
        Ok(())
    }

    #[test]
    fn clear_then_get_is_none() -> Result<(), StoreError> {
        let (_clock, manager) = manager();
        manager.create(&test_user(), "tok", false, ClientContext::default())?;

        manager.clear();
        assert!(manager.get().is_none());
        // Idempotent
        manager.clear();
        assert!(manager.get().is_none());
        Ok(())
    }

    #[test]
    fn update_without_session_is_noop() {
        let (_clock, manager) = manager();
        assert!(!manager.update(SessionPatch {
            token: Some("tok".to_string()),
        }));
        assert!(manager.get().is_none());
    }

    #[test]
    fn update_merges_token_and_bumps_activity() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        let created = manager.create(&test_user(), "tok", false, ClientContext::default())?;

        clock.advance(Duration::seconds(300));
        manager.update(SessionPatch {
            token: Some("tok-2".to_string()),
        });

        let session = manager.get().expect("session should be current");
        assert_eq!(session.token, "tok-2");
        assert_eq!(
            session.last_activity,
            created.last_activity + Duration::seconds(300)
        );
        Ok(())
    }

    #[test]
    fn info_reports_clamped_time_remaining() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", false, ClientContext::default())?;

        // stay under the activity timeout so only expiry counts down
        for step in [1500, 1500, 600] {
            clock.advance(Duration::seconds(step));
            manager.update(SessionPatch::default());
        }
        let info = manager.info().expect("session should be current");
        assert_eq!(info.time_remaining_seconds, SESSION_TTL_SECONDS - 3600);
        assert!(!info.remember_me);
        Ok(())
    }

    #[test]
    fn invariant_holds_on_every_read() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", false, ClientContext::default())?;

        for _ in 0..3 {
            clock.advance(Duration::seconds(600));
            manager.update(SessionPatch::default());
            let session = manager.get().expect("session should be current");
            assert!(session.created_at <= session.last_activity);
            assert!(session.last_activity <= session.expires_at);
        }
        Ok(())
    }

    #[derive(Debug)]
    struct FailingStore;

    impl SessionStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk on fire".to_string()))
        }
    }

    #[test]
    fn storage_errors_read_as_no_session() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let manager = SessionManager::new(Arc::new(FailingStore), clock);
        assert!(manager.get().is_none());
        assert!(manager.info().is_none());
        // clear on a broken store must not panic
        manager.clear();
    }

    #[test]
    fn corrupt_record_is_discarded() -> Result<(), StoreError> {
        let (_clock, manager) = manager();
        manager.store.set(KEY_RECORD, "not json")?;
        assert!(manager.get().is_none());
        assert!(manager.store.get(KEY_RECORD)?.is_none());
        Ok(())
    }

    #[test]
    fn expiry_slot_wins_over_record_snapshot() -> Result<(), StoreError> {
        let (clock, manager) = manager();
        manager.create(&test_user(), "tok", true, ClientContext::default())?;

        // Simulate another writer moving expiry up through its own slot
        let soon = clock.now() + Duration::seconds(5);
        manager.store.set(KEY_EXPIRY, &soon.to_rfc3339())?;

        let session = manager.get().expect("still valid for five seconds");
        assert_eq!(session.expires_at, soon);

        clock.advance(Duration::seconds(6));
        assert!(manager.get().is_none());
        Ok(())
    }
}
