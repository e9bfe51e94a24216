use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use icebrg_async_utils::OrCancelExt;
use icebrg_session::SessionStore;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::client::SearchBackend;
use crate::client::SearchClient;
use crate::error::Result;
use crate::model::SearchResponse;
use crate::model::SuggestionItem;
use crate::model::flatten_suggestions;

pub const DEFAULT_PLACEHOLDER: &str = "Search...";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub raw_input: String,
    pub debounced_input: String,
    pub is_open: bool,
    pub is_loading: bool,
    pub results: Vec<SuggestionItem>,
    pub input_focused: bool,
    /// Trimmed query of the newest request, `None` once results are dropped.
    pub issued_query: Option<String>,
}

/// Where a pointer/activation event landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Input,
    Panel,
    Outside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    Loading,
    Suggestions(Vec<String>),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryView {
    pub input: String,
    pub placeholder: String,
    /// `None` while the suggestion panel is closed.
    pub panel: Option<PanelView>,
}

/// Debounced autocomplete over a [`SearchBackend`].
///
/// Keystrokes update `raw_input` immediately; once input has been quiet for
/// the configured debounce window the value moves to `debounced_input` and,
/// if the panel is open and the session is authenticated, one search request
/// is issued. Only the most recently issued request may write results.
pub struct QueryController {
    inner: Arc<Inner>,
    input_tx: mpsc::UnboundedSender<()>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    session: Arc<SessionStore>,
    backend: Arc<dyn SearchBackend>,
    state: watch::Sender<QueryState>,
    // Sequence number of the request allowed to apply its response. Only
    // touched while the state channel is locked.
    latest_request: AtomicU64,
    debounce: Duration,
    min_query_len: usize,
    placeholder: String,
    shutdown: CancellationToken,
}

fn meets_min_len(value: &str, min_query_len: usize) -> bool {
    value.trim().chars().count() >= min_query_len
}

impl QueryController {
    pub fn spawn(session: Arc<SessionStore>, backend: Arc<dyn SearchBackend>) -> Self {
        let config = session.config();
        let debounce = config.debounce();
        let min_query_len = config.min_query_len;
        let (state, _) = watch::channel(QueryState::default());
        let inner = Arc::new(Inner {
            session,
            backend,
            state,
            latest_request: AtomicU64::new(0),
            debounce,
            min_query_len,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            shutdown: CancellationToken::new(),
        });
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive_debounce(Arc::clone(&inner), input_rx));
        Self {
            inner,
            input_tx,
            driver: Some(driver),
        }
    }

    /// Controller backed by the HTTP search endpoint from the session config.
    pub fn with_http(session: Arc<SessionStore>) -> Result<Self> {
        let client = SearchClient::new(session.config())?;
        Ok(Self::spawn(session, Arc::new(client)))
    }

    pub fn state(&self) -> QueryState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.inner.state.subscribe()
    }

    pub fn input(&self, value: impl Into<String>) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let value = value.into();
        let min_query_len = self.inner.min_query_len;
        let changed = self.inner.state.send_if_modified(|state| {
            if state.raw_input == value {
                return false;
            }
            state.is_open = meets_min_len(&value, min_query_len);
            if !state.is_open {
                state.results.clear();
                state.is_loading = false;
                state.debounced_input.clear();
                state.issued_query = None;
                self.inner.latest_request.fetch_add(1, Ordering::SeqCst);
            }
            state.raw_input = value;
            true
        });
        if changed {
            self.schedule_debounce();
        }
    }

    pub fn pointer_down(&self, target: PointerTarget) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.state.send_if_modified(|state| match target {
            PointerTarget::Input => !std::mem::replace(&mut state.input_focused, true),
            PointerTarget::Panel => false,
            PointerTarget::Outside => {
                let was_open = std::mem::replace(&mut state.is_open, false);
                let was_focused = std::mem::replace(&mut state.input_focused, false);
                was_open || was_focused
            }
        });
    }

    /// The input gained focus; reopens the panel if the input is long enough.
    ///
    /// A reopened panel whose debounced query differs from the last issued
    /// one is searched again.
    pub fn focus(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let authenticated = self.inner.session.is_authenticated();
        let min_query_len = self.inner.min_query_len;
        let mut issue = None;
        self.inner.state.send_if_modified(|state| {
            let reopen = !state.is_open && meets_min_len(&state.raw_input, min_query_len);
            let changed = reopen || !state.input_focused;
            state.input_focused = true;
            if reopen {
                state.is_open = true;
                if authenticated
                    && meets_min_len(&state.debounced_input, min_query_len)
                    && state.issued_query.as_deref() != Some(state.debounced_input.trim())
                {
                    issue = Some(self.inner.begin_request(state));
                }
            }
            changed
        });
        if let Some((seq, query)) = issue {
            self.inner.issue(seq, query);
        }
    }

    /// Takes a suggestion into the input. Items without a name are ignored.
    pub fn select(&self, item: &SuggestionItem) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let Some(name) = item.name.as_deref() else {
            return;
        };
        let mut raw_changed = false;
        self.inner.state.send_if_modified(|state| {
            raw_changed = state.raw_input != name;
            if raw_changed {
                state.raw_input = name.to_string();
            }
            let was_open = std::mem::replace(&mut state.is_open, false);
            let was_focused = std::mem::replace(&mut state.input_focused, true);
            raw_changed || was_open || !was_focused
        });
        if raw_changed {
            self.schedule_debounce();
        }
    }

    pub fn render(&self) -> Option<QueryView> {
        if !self.inner.session.is_authenticated() {
            return None;
        }
        let state = self.state();
        let panel = state.is_open.then(|| {
            if state.is_loading {
                PanelView::Loading
            } else if state.results.is_empty() {
                PanelView::Empty
            } else {
                PanelView::Suggestions(
                    state
                        .results
                        .iter()
                        .map(|item| item.name.clone().unwrap_or_default())
                        .collect(),
                )
            }
        });
        Some(QueryView {
            input: state.raw_input,
            placeholder: self.inner.placeholder.clone(),
            panel,
        })
    }

    /// Cancels the debounce timer and abandons in-flight requests, then waits
    /// for the driver task to exit.
    pub async fn shutdown(mut self) {
        self.inner.shutdown.cancel();
        if let Some(driver) = self.driver.take()
            && let Err(err) = driver.await
        {
            warn!("query controller driver ended abnormally: {err}");
        }
    }

    fn schedule_debounce(&self) {
        if self.input_tx.send(()).is_err() {
            debug!("debounce driver is gone; dropping input");
        }
    }
}

impl Drop for QueryController {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    fn apply_debounced(self: &Arc<Self>, value: String) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let authenticated = self.session.is_authenticated();
        let mut issue = None;
        self.state.send_if_modified(|state| {
            if state.debounced_input == value {
                return false;
            }
            state.debounced_input = value;
            if authenticated
                && state.is_open
                && meets_min_len(&state.debounced_input, self.min_query_len)
            {
                issue = Some(self.begin_request(state));
            }
            true
        });

        if let Some((seq, query)) = issue {
            self.issue(seq, query);
        }
    }

    /// Makes the debounced query the newest request. Call with the state
    /// channel locked.
    fn begin_request(&self, state: &mut QueryState) -> (u64, String) {
        let query = state.debounced_input.trim().to_string();
        let seq = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        state.is_loading = true;
        state.issued_query = Some(query.clone());
        (seq, query)
    }

    fn issue(self: &Arc<Self>, seq: u64, query: String) {
        debug!("issuing search #{seq} for {query:?}");
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let token = inner.session.access_token();
            let outcome = inner
                .backend
                .search(&query, token.as_deref())
                .or_cancel(&inner.shutdown)
                .await;
            match outcome {
                Ok(result) => inner.apply_response(seq, &query, result),
                Err(_) => debug!("search #{seq} abandoned on shutdown"),
            }
        });
    }

    fn apply_response(&self, seq: u64, query: &str, result: Result<SearchResponse>) {
        self.state.send_if_modified(|state| {
            if self.latest_request.load(Ordering::SeqCst) != seq {
                debug!("discarding stale response #{seq} for {query:?}");
                return false;
            }
            state.results = match result {
                Ok(response) => flatten_suggestions(response),
                Err(err) => {
                    warn!("search for {query:?} failed: {err}");
                    Vec::new()
                }
            };
            state.is_loading = false;
            true
        });
    }
}

async fn drive_debounce(inner: Arc<Inner>, mut input_rx: mpsc::UnboundedReceiver<()>) {
    let mut timer: Option<Pin<Box<Sleep>>> = None;
    loop {
        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break,
            maybe = input_rx.recv() => {
                if maybe.is_none() {
                    break;
                }
                timer = Some(Box::pin(sleep(inner.debounce)));
            }
            _ = async {
                if let Some(timer) = &mut timer {
                    timer.await;
                }
            }, if timer.is_some() => {
                timer = None;
                let value = inner.state.borrow().raw_input.clone();
                inner.apply_debounced(value);
            }
        }
    }
    debug!("query controller stopped");
}
