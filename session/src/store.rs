use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use icebrg_kv_store::KeyValueStore;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::AuthClient;
use crate::client::TokenResponse;
use crate::config::ClientConfig;
use crate::error::ErrorKind;
use crate::error::Result;
use crate::error::SessionError;

/// Storage key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "token";
/// Storage key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub last_error: Option<ErrorKind>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Owner of the current session and the only writer of persisted tokens.
///
/// Consumers hold an `Arc<SessionStore>`; token changes are published on a
/// watch channel so background tasks can react without polling.
#[derive(Debug)]
pub struct SessionStore {
    state: RwLock<Session>,
    storage: Arc<dyn KeyValueStore>,
    client: AuthClient,
    access_tx: watch::Sender<Option<String>>,
    // Holds the outcome of the most recent refresh; `refresh_epoch` bumps
    // while the lock is held so waiters can tell a refresh finished under them.
    refresh_gate: Mutex<Option<Result<()>>>,
    refresh_epoch: AtomicU64,
    // Bumped under the state write lock whenever the session is replaced or
    // cleared. A refresh only applies its outcome to the generation it read.
    generation: AtomicU64,
}

impl SessionStore {
    pub fn new(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        let client = AuthClient::new(config)?;
        Ok(Self::with_client(client, storage))
    }

    pub fn shared(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(config, storage)?))
    }

    /// Hydrates the session from `storage`. This is the only read of persisted
    /// state; afterwards memory is authoritative.
    pub fn with_client(client: AuthClient, storage: Arc<dyn KeyValueStore>) -> Self {
        let session = Session {
            access_token: load_key(storage.as_ref(), ACCESS_TOKEN_KEY),
            refresh_token: load_key(storage.as_ref(), REFRESH_TOKEN_KEY),
            last_error: None,
        };
        debug!(
            "hydrated session, authenticated={}",
            session.is_authenticated()
        );
        let (access_tx, _) = watch::channel(session.access_token.clone());
        Self {
            state: RwLock::new(session),
            storage,
            client,
            access_tx,
            refresh_gate: Mutex::new(None),
            refresh_epoch: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    pub fn session(&self) -> Session {
        self.read_state().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_state().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_state().refresh_token.clone()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.read_state().last_error
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().is_authenticated()
    }

    /// Receiver that observes every change of the access token value.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.access_tx.subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        match self.client.login(email, password).await {
            Ok(tokens) => {
                self.apply_tokens(tokens, None);
                info!("login succeeded");
                Ok(())
            }
            Err(err) => {
                warn!("login failed: {err}");
                self.write_state().last_error = Some(ErrorKind::AuthFailed);
                Err(err)
            }
        }
    }

    pub fn logout(&self) {
        self.clear_session(None, None);
    }

    /// Local expiry detected: logs out and records `SessionExpired`.
    pub fn expire(&self) {
        info!("access token expired, logging out");
        self.clear_session(Some(ErrorKind::SessionExpired), None);
    }

    /// Exchanges the stored refresh token for new tokens.
    ///
    /// Calls are serialized. A call that arrives while another refresh is in
    /// flight waits for it and returns its result instead of sending a second
    /// request.
    ///
    /// If the session is logged out or replaced while the request is in
    /// flight, the outcome is discarded and the newer session is left as is.
    pub async fn refresh(&self) -> Result<()> {
        let observed = self.refresh_epoch.load(Ordering::Acquire);
        let mut last_outcome = self.refresh_gate.lock().await;
        if self.refresh_epoch.load(Ordering::Acquire) != observed
            && let Some(outcome) = last_outcome.as_ref()
        {
            debug!("joined in-flight token refresh");
            return outcome.clone();
        }

        let outcome = self.refresh_once().await;
        *last_outcome = Some(outcome.clone());
        self.refresh_epoch.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn refresh_once(&self) -> Result<()> {
        let (session, generation) = {
            let state = self.read_state();
            ((*state).clone(), self.generation.load(Ordering::Acquire))
        };
        let Some(refresh_token) = session.refresh_token else {
            return self.fail_refresh(
                SessionError::RefreshFailed("no refresh token stored".to_string()),
                generation,
            );
        };

        match self
            .client
            .refresh(&refresh_token, session.access_token.as_deref())
            .await
        {
            Ok(tokens) => {
                if self.apply_tokens(tokens, Some(generation)) {
                    info!("token refresh succeeded");
                    Ok(())
                } else {
                    debug!("session changed during token refresh, discarding new tokens");
                    Err(SessionError::RefreshFailed(
                        "session changed during refresh".to_string(),
                    ))
                }
            }
            Err(err) => self.fail_refresh(err, generation),
        }
    }

    fn fail_refresh(&self, err: SessionError, generation: u64) -> Result<()> {
        if self.clear_session(Some(ErrorKind::RefreshFailed), Some(generation)) {
            warn!("token refresh failed, logging out: {err}");
        } else {
            debug!("token refresh failed for a replaced session: {err}");
        }
        Err(err)
    }

    /// Stores whichever tokens are present and clears `last_error`.
    ///
    /// With `expected` set, nothing changes unless the session generation
    /// still matches; without it the tokens start a new generation. Returns
    /// whether the tokens were applied.
    fn apply_tokens(&self, tokens: TokenResponse, expected: Option<u64>) -> bool {
        let access = {
            let mut state = self.write_state();
            if !self.advance_generation(expected, expected.is_none()) {
                return false;
            }
            if let Some(access_token) = tokens.access_token {
                self.persist(ACCESS_TOKEN_KEY, &access_token);
                state.access_token = Some(access_token);
            }
            if let Some(refresh_token) = tokens.refresh_token {
                self.persist(REFRESH_TOKEN_KEY, &refresh_token);
                state.refresh_token = Some(refresh_token);
            }
            state.last_error = None;
            state.access_token.clone()
        };
        self.publish(access);
        true
    }

    /// Logs out, optionally recording `error`. Same `expected` rule as
    /// [`Self::apply_tokens`].
    fn clear_session(&self, error: Option<ErrorKind>, expected: Option<u64>) -> bool {
        {
            let mut state = self.write_state();
            if !self.advance_generation(expected, true) {
                return false;
            }
            if let Some(error) = error {
                state.last_error = Some(error);
            }
            if state.access_token.take().is_some() {
                self.remove(ACCESS_TOKEN_KEY);
            }
            if state.refresh_token.take().is_some() {
                self.remove(REFRESH_TOKEN_KEY);
            }
        }
        self.publish(None);
        true
    }

    /// Must be called with the state write lock held.
    fn advance_generation(&self, expected: Option<u64>, bump: bool) -> bool {
        if let Some(expected) = expected
            && self.generation.load(Ordering::Acquire) != expected
        {
            return false;
        }
        if bump {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
        true
    }

    fn publish(&self, access: Option<String>) {
        self.access_tx.send_if_modified(|current| {
            if *current == access {
                false
            } else {
                *current = access;
                true
            }
        });
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(err) = self.storage.save(key, value) {
            warn!("failed to persist {key}: {err}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.storage.delete(key) {
            warn!("failed to remove {key} from storage: {err}");
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Session> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Session> {
        self.state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn load_key(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.load(key) {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to read {key} from storage: {err}");
            None
        }
    }
}
