use std::sync::Arc;
use std::time::Duration;

use icebrg_async_utils::OrCancelExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::REFRESH_INTERVAL;
use crate::store::SessionStore;
use crate::token_data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No token, or the token is comfortably valid.
    Idle,
    /// The token had already expired; the session was logged out.
    Expired,
    Refreshed,
    /// The refresh call failed; the store has already logged out.
    RefreshFailed,
}

/// One pass of the session check.
pub async fn check_session(store: &SessionStore) -> TickOutcome {
    let Some(token) = store.access_token() else {
        return TickOutcome::Idle;
    };

    if token_data::is_expired(&token) {
        store.expire();
        return TickOutcome::Expired;
    }

    let lead = store.config().refresh_lead();
    if !token_data::should_refresh_within(&token, chrono::Utc::now(), lead) {
        return TickOutcome::Idle;
    }

    match store.refresh().await {
        Ok(()) => TickOutcome::Refreshed,
        Err(err) => {
            warn!("failed to auto-refresh token: {err}");
            TickOutcome::RefreshFailed
        }
    }
}

/// Background task that keeps the session fresh.
///
/// Checks once on start, then every `interval`, and immediately whenever the
/// access token changes (which also re-arms the interval). Dropping the loop
/// cancels it; a refresh in flight at that moment is abandoned.
#[derive(Debug)]
pub struct RefreshLoop {
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshLoop {
    pub fn spawn(store: Arc<SessionStore>) -> Self {
        let interval = store.config().refresh_interval();
        Self::spawn_with_interval(store, interval)
    }

    /// A zero `interval` falls back to [`REFRESH_INTERVAL`].
    pub fn spawn_with_interval(store: Arc<SessionStore>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("refresh interval must be > 0, using {REFRESH_INTERVAL:?}");
            REFRESH_INTERVAL
        } else {
            interval
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(store, interval, shutdown.clone()));
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the loop and waits for the task to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!("session refresh loop ended abnormally: {err}");
        }
    }
}

impl Drop for RefreshLoop {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run(store: Arc<SessionStore>, interval: Duration, shutdown: CancellationToken) {
    let token_rx = store.subscribe();
    drive(token_rx, interval, shutdown, move || {
        let store = Arc::clone(&store);
        async move { check_session(&store).await }
    })
    .await;
}

/// Runs `check` once immediately, on every `interval` tick, and whenever the
/// token channel changes. A change re-arms the interval.
async fn drive<F, Fut>(
    mut token_rx: watch::Receiver<Option<String>>,
    interval: Duration,
    shutdown: CancellationToken,
    mut check: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = TickOutcome> + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            changed = token_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("access token changed, checking session");
                ticker.reset();
            }
            _ = ticker.tick() => {}
        }

        match check().or_cancel(&shutdown).await {
            Ok(outcome) => debug!("session check finished: {outcome:?}"),
            Err(_) => break,
        }
    }
    debug!("session refresh loop stopped");
}
