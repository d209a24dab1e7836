//! Session lifecycle: the authoritative local record of the authenticated
//! actor, its validity rules, activity bookkeeping, and the advisory
//! background maintenance tasks.

pub mod activity;
pub mod clock;
pub mod manager;
pub mod store;
pub mod tasks;

pub use activity::{ActivitySignal, ActivityTracker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{SessionManager, SessionPatch};
pub use store::{MemoryStore, SessionStore, StoreError};

use crate::token::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Validity window for a regular session.
pub const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Validity window when the user asked to be remembered.
pub const REMEMBER_ME_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
/// Maximum idle gap before a non-remember-me session is considered dead.
pub const ACTIVITY_TIMEOUT_SECONDS: i64 = 30 * 60;
/// Minimum gap between two activity-driven `last_activity` writes.
pub const ACTIVITY_THROTTLE_SECONDS: i64 = 60;
/// How often the cleanup sweep runs. Advisory only; validity is always
/// re-checked on read.
pub const CLEANUP_INTERVAL_SECONDS: u64 = 60;
/// How often the auto-refresh check runs.
pub const REFRESH_CHECK_INTERVAL_SECONDS: u64 = 5 * 60;
/// Remaining lifetime below which the auto-refresh check renews the session.
pub const REFRESH_THRESHOLD_SECONDS: i64 = 60 * 60;

/// Identity of the actor a session is created for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// Client metadata captured at session creation. Informational only, never
/// consulted for authorization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientContext {
    pub user_agent: Option<String>,
    pub address: Option<String>,
}

/// The authoritative local session record.
///
/// Invariant at every valid read: `created_at <= last_activity <= expires_at`.
/// Only `SessionManager` mutates the temporal fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub remember_me: bool,
    #[serde(default)]
    pub client: ClientContext,
}

impl Session {
    /// Seconds of validity for this session's duration class.
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        if self.remember_me {
            REMEMBER_ME_TTL_SECONDS
        } else {
            SESSION_TTL_SECONDS
        }
    }
}

/// Derived read view over the current session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionInfo {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub remember_me: bool,
    /// Seconds until expiry, clamped at zero.
    pub time_remaining_seconds: i64,
}
