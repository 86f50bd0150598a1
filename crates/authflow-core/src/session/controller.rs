use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::api::{AuthError, Authenticator};
use crate::auth::{AuthToken, Credentials, SecretBackend, StoreError, TokenStore};

use super::state::{SessionDiagnostic, SessionEvent, SessionState};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the intent event queue.
/// UI producers rarely have more than a handful of events outstanding.
const EVENT_QUEUE_CAPACITY: usize = 32;

/// Buffer size for login results. Only one attempt is current at a time;
/// the headroom absorbs results of abandoned attempts.
const OUTCOME_QUEUE_CAPACITY: usize = 8;

/// Published states retained for slow subscribers before they lag.
const STATE_CHANNEL_CAPACITY: usize = 64;

/// Diagnostics retained for slow subscribers before they lag.
const DIAGNOSTIC_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Session controller has stopped")]
pub struct SessionClosed;

struct LoginOutcome {
    attempt: u64,
    result: Result<AuthToken, AuthError>,
}

/// Owns the session state and applies intent events one at a time.
///
/// Runs as a single tokio task; see [`SessionController::spawn`].
pub struct SessionController<A, B> {
    client: Arc<A>,
    store: Arc<TokenStore<B>>,
    state: SessionState,
    attempt: u64,
    in_flight: Option<AbortHandle>,
    current_tx: watch::Sender<SessionState>,
    states_tx: broadcast::Sender<SessionState>,
    diagnostics_tx: broadcast::Sender<SessionDiagnostic>,
    outcomes_tx: mpsc::Sender<LoginOutcome>,
}

impl<A, B> SessionController<A, B>
where
    A: Authenticator,
    B: SecretBackend + 'static,
{
    /// Start the controller on the current tokio runtime.
    ///
    /// The controller stops, aborting any in-flight login, once every
    /// returned handle has been dropped.
    pub fn spawn(client: A, store: Arc<TokenStore<B>>) -> SessionHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_QUEUE_CAPACITY);
        let (current_tx, current_rx) = watch::channel(SessionState::Initial);
        let (states_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let (diagnostics_tx, _) = broadcast::channel(DIAGNOSTIC_CHANNEL_CAPACITY);

        let controller = Self {
            client: Arc::new(client),
            store,
            state: SessionState::Initial,
            attempt: 0,
            in_flight: None,
            current_tx,
            states_tx: states_tx.clone(),
            diagnostics_tx: diagnostics_tx.clone(),
            outcomes_tx,
        };
        tokio::spawn(controller.run(events_rx, outcomes_rx));

        SessionHandle {
            events_tx,
            current_rx,
            states_tx,
            diagnostics_tx,
        }
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        mut outcomes: mpsc::Receiver<LoginOutcome>,
    ) {
        debug!("Session controller started");
        loop {
            // Queued intent always goes first so a result never jumps ahead
            // of an event that was raised before it arrived.
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome).await,
            }
        }
        self.abort_in_flight();
        debug!("Session controller stopped");
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        debug!(?event, state = self.state.name(), "Handling session event");
        match event {
            SessionEvent::Submit(credentials) => match self.state {
                SessionState::Initial | SessionState::Failed { .. } => {
                    self.start_login(credentials)
                }
                SessionState::Loading => debug!("Login already in flight, ignoring submit"),
                SessionState::Authenticated { .. } => self.ignore("submit"),
            },
            SessionEvent::Reset => match self.state {
                SessionState::Authenticated { .. } => {
                    info!("Logging out");
                    self.clear_store().await;
                    self.publish(SessionState::Initial);
                }
                SessionState::Failed { .. } => self.publish(SessionState::Initial),
                SessionState::Loading => {
                    info!(attempt = self.attempt, "Abandoning in-flight login");
                    self.abort_in_flight();
                    self.publish(SessionState::Initial);
                }
                SessionState::Initial => self.ignore("reset"),
            },
            SessionEvent::CheckStoredSession => match self.state {
                SessionState::Initial => self.check_stored_session().await,
                _ => self.ignore("check stored session"),
            },
        }
    }

    fn ignore(&self, event: &str) {
        debug!(event, state = self.state.name(), "Event not valid in current state, ignoring");
    }

    fn start_login(&mut self, credentials: Credentials) {
        self.attempt += 1;
        let attempt = self.attempt;

        let client = Arc::clone(&self.client);
        let login = tokio::spawn(async move { client.login(&credentials).await });
        self.in_flight = Some(login.abort_handle());

        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = match login.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => return,
                Err(e) => Err(AuthError::Unknown(format!("login task failed: {}", e))),
            };
            // The controller may already be gone; nothing to report to then
            let _ = outcomes.send(LoginOutcome { attempt, result }).await;
        });

        info!(attempt, "Login started");
        self.publish(SessionState::Loading);
    }

    async fn handle_outcome(&mut self, outcome: LoginOutcome) {
        if outcome.attempt != self.attempt || self.state != SessionState::Loading {
            debug!(
                attempt = outcome.attempt,
                current = self.attempt,
                "Discarding result of abandoned login"
            );
            return;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(token) => {
                let stored = token.clone();
                if let Err(e) = self.with_store(move |store| store.write(&stored)).await {
                    warn!(error = %e, "Failed to persist token, session remains authenticated");
                    self.report(SessionDiagnostic::TokenWriteFailed {
                        detail: e.to_string(),
                    });
                }
                info!(attempt = outcome.attempt, "Login successful");
                self.publish(SessionState::Authenticated { token });
            }
            Err(err) => {
                let reason = err.kind();
                error!(attempt = outcome.attempt, kind = %reason, error = %err, "Login failed");
                self.publish(SessionState::Failed {
                    reason,
                    detail: reason.user_message().to_string(),
                });
            }
        }
    }

    async fn check_stored_session(&mut self) {
        self.publish(SessionState::Loading);

        let stored = self
            .with_store(|store| Ok(store.read()))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read stored token, treating as logged out");
                None
            });
        match stored {
            Some(token) if !token.is_expired() => {
                info!("Restored stored session");
                self.publish(SessionState::Authenticated { token });
            }
            stored => {
                if stored.is_some() {
                    info!("Stored token expired, clearing");
                } else {
                    debug!("No stored token");
                }
                self.clear_store().await;
                self.publish(SessionState::Initial);
            }
        }
    }

    async fn clear_store(&self) {
        if let Err(e) = self.with_store(|store| store.clear()).await {
            warn!(error = %e, "Failed to clear stored token");
            self.report(SessionDiagnostic::TokenClearFailed {
                detail: e.to_string(),
            });
        }
    }

    /// Run a store operation on the blocking pool; backends do file I/O.
    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&TokenStore<B>) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Backend(format!("storage task failed: {}", e)))?
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    fn report(&self, diagnostic: SessionDiagnostic) {
        // No subscribers is not an error
        let _ = self.diagnostics_tx.send(diagnostic);
    }

    fn publish(&mut self, state: SessionState) {
        debug!(from = self.state.name(), to = state.name(), "Session state transition");
        self.state = state.clone();
        self.current_tx.send_replace(state.clone());
        let _ = self.states_tx.send(state);
    }
}

/// Cloneable front end to a running [`SessionController`].
#[derive(Clone)]
pub struct SessionHandle {
    events_tx: mpsc::Sender<SessionEvent>,
    current_rx: watch::Receiver<SessionState>,
    states_tx: broadcast::Sender<SessionState>,
    diagnostics_tx: broadcast::Sender<SessionDiagnostic>,
}

impl SessionHandle {
    /// Queue an event. Events are applied in the order they are queued.
    pub async fn dispatch(&self, event: SessionEvent) -> Result<(), SessionClosed> {
        self.events_tx.send(event).await.map_err(|_| SessionClosed)
    }

    pub async fn submit(&self, credentials: Credentials) -> Result<(), SessionClosed> {
        self.dispatch(SessionEvent::Submit(credentials)).await
    }

    pub async fn reset(&self) -> Result<(), SessionClosed> {
        self.dispatch(SessionEvent::Reset).await
    }

    pub async fn check_stored_session(&self) -> Result<(), SessionClosed> {
        self.dispatch(SessionEvent::CheckStoredSession).await
    }

    /// The most recently published state
    pub fn state(&self) -> SessionState {
        self.current_rx.borrow().clone()
    }

    /// Every state published from now on, in emission order
    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.states_tx.subscribe()
    }

    /// Latest-value view of the state, for renderers that only need the
    /// current state
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.current_rx.clone()
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<SessionDiagnostic> {
        self.diagnostics_tx.subscribe()
    }
}
