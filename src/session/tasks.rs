//! Advisory background maintenance. Neither task is load-bearing for
//! correctness: validity is always re-checked on read, so a missed tick only
//! delays cleanup or refresh.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::manager::SessionManager;
use super::{CLEANUP_INTERVAL_SECONDS, REFRESH_CHECK_INTERVAL_SECONDS, REFRESH_THRESHOLD_SECONDS};

/// Spawn the cleanup sweep and the auto-refresh check. Both stop when the
/// shutdown channel flips to `true`.
pub fn spawn_maintenance(
    sessions: Arc<SessionManager>,
    shutdown: watch::Receiver<bool>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let sweep = tokio::spawn(sweep_task(sessions.clone(), shutdown.clone()));
    let refresh = tokio::spawn(refresh_task(sessions, shutdown));
    (sweep, refresh)
}

/// Periodically reads the session so an expired or idle one gets cleared
/// promptly instead of on the next request.
async fn sweep_task(sessions: Arc<SessionManager>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECONDS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // get() clears the record when it is no longer valid
                if sessions.get().is_none() {
                    debug!("cleanup sweep: no valid session");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("cleanup sweep stopped");
                    return;
                }
            }
        }
    }
}

/// Renews the session before it runs out so an active user never sees an
/// expiry mid-use.
async fn refresh_task(sessions: Arc<SessionManager>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(REFRESH_CHECK_INTERVAL_SECONDS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let near_expiry = sessions
                    .info()
                    .map(|info| info.time_remaining_seconds < REFRESH_THRESHOLD_SECONDS)
                    .unwrap_or(false);
                if near_expiry {
                    if let Some(session) = sessions.refresh() {
                        info!(session_id = %session.id, "session auto-refreshed");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("auto-refresh check stopped");
                    return;
                }
            }
        }
    }
}
