//! Operator session against the ticketing server.
//!
//! The server hands out two unrelated CSRF tokens: one guarding the login
//! form, one guarding ticket controls. [`SessionManager`] owns both, along
//! with the logged-in flag, and is the only writer of [`SessionState`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use crate::config::CredentialStore;
use crate::endpoints;
use crate::error::{Error, Result};
use crate::host::HttpClient;

/// Present in the login page. Finding it in a login response means the
/// server sent the form back, i.e. the credentials were refused.
pub const LOGIN_FORM_MARKER: &str = "signin_username";

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 16;

/// Authentication state. `control_csrf_token` is cleared every time
/// `logged_in` goes back to false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub logged_in: bool,
    pub csrf_token: String,
    pub control_csrf_token: String,
}

/// Session transitions, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Established,
    AuthenticationFailed(String),
}

/// Settled login: the failure carries a printable reason.
pub type Outcome = std::result::Result<(), String>;

/// Handle on an authentication attempt.
///
/// Every caller that asks for authentication while a login is in flight gets
/// a handle on that same login. Dropping the handle does not cancel it.
#[derive(Debug)]
pub enum PendingAuth {
    Ready(Outcome),
    InFlight(watch::Receiver<Option<Outcome>>),
}

impl PendingAuth {
    /// Wait for the login to settle.
    pub async fn wait(self) -> Result<()> {
        let outcome = match self {
            Self::Ready(outcome) => outcome,
            Self::InFlight(mut rx) => match rx.wait_for(Option::is_some).await {
                Ok(settled) => settled.clone().unwrap_or(Ok(())),
                Err(_) => Err("login task ended without an outcome".to_string()),
            },
        };
        outcome.map_err(Error::AuthenticationFailed)
    }
}

struct Inner {
    state: SessionState,
    in_flight: Option<watch::Receiver<Option<Outcome>>>,
    /// Bumped by every invalidation. A login started under an older
    /// generation settles without touching the state.
    generation: u64,
}

/// Owns authentication state and both CSRF tokens.
pub struct SessionManager {
    http: Arc<dyn HttpClient>,
    settings: Arc<CredentialStore>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(http: Arc<dyn HttpClient>, settings: Arc<CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            settings,
            inner: Mutex::new(Inner {
                state: SessionState::default(),
                in_flight: None,
                generation: 0,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().state.logged_in
    }

    pub fn control_csrf_token(&self) -> String {
        self.lock().state.control_csrf_token.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Forget the server session. The next [`authenticate`](Self::authenticate)
    /// logs in again, even if a login is still running: that login is
    /// abandoned and its outcome only reaches the callers already waiting on it.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        if inner.state.logged_in {
            info!("Session invalidated");
        }
        if inner.in_flight.take().is_some() {
            debug!("Abandoning login in flight");
        }
        inner.generation += 1;
        log_out(&mut inner.state);
    }

    /// Log in unless already logged in.
    ///
    /// The login runs on its own task, so it completes even if the returned
    /// handle is dropped. Outcomes are also published as [`SessionEvent`]s.
    pub fn authenticate(self: &Arc<Self>) -> PendingAuth {
        let mut inner = self.lock();
        if inner.state.logged_in {
            return PendingAuth::Ready(Ok(()));
        }
        if let Some(rx) = &inner.in_flight {
            debug!("Joining login already in flight");
            return PendingAuth::InFlight(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        inner.in_flight = Some(rx.clone());
        let generation = inner.generation;
        drop(inner);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.login().await.map_err(|e| e.to_string());
            this.settle(generation, &outcome);
            tx.send_replace(Some(outcome));
        });
        PendingAuth::InFlight(rx)
    }

    #[instrument(skip(self))]
    async fn login(&self) -> Result<()> {
        let settings = self.settings.snapshot();
        if settings.server_url.is_empty() {
            return Err(Error::AuthenticationFailed("no server configured".into()));
        }

        self.http.clear_cookies();
        let token = self.fetch_csrf().await?;

        let fields = vec![
            ("signin[username]".to_string(), settings.username.clone()),
            ("signin[password]".to_string(), settings.password.clone()),
            ("signin[_csrf_token]".to_string(), token),
        ];
        let url = endpoints::url(&settings.server_url, endpoints::LOGIN);
        let body = self
            .http
            .post_form(&url, &fields)
            .await
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;

        if body.contains(LOGIN_FORM_MARKER) {
            return Err(Error::AuthenticationFailed(format!(
                "credentials refused for {}",
                settings.username
            )));
        }
        Ok(())
    }

    fn settle(&self, generation: u64, outcome: &Outcome) {
        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(ok = outcome.is_ok(), "Dropping outcome of abandoned login");
            return;
        }
        inner.in_flight = None;
        match outcome {
            Ok(()) => {
                inner.state.logged_in = true;
                drop(inner);
                info!("Session established");
                let _ = self.events.send(SessionEvent::Established);
            }
            Err(reason) => {
                log_out(&mut inner.state);
                drop(inner);
                warn!(%reason, "Authentication failed");
                let _ = self
                    .events
                    .send(SessionEvent::AuthenticationFailed(reason.clone()));
            }
        }
    }

    /// Fetch and store the login CSRF token.
    pub async fn fetch_csrf(&self) -> Result<String> {
        let url = endpoints::url(&self.settings.snapshot().server_url, endpoints::LOGIN_CSRF);
        let token = self.http.get(&url).await.map_err(Error::CsrfFetchFailed)?;
        let token = token.trim().to_string();
        self.lock().state.csrf_token.clone_from(&token);
        debug!("Login CSRF token refreshed");
        Ok(token)
    }

    /// Fetch and store the control CSRF token.
    ///
    /// The server answers with an empty body once its session has expired.
    pub async fn fetch_control_csrf(&self) -> Result<String> {
        let url = endpoints::url(
            &self.settings.snapshot().server_url,
            endpoints::CONTROL_CSRF,
        );
        let token = self.http.get(&url).await.map_err(Error::CsrfFetchFailed)?;
        let token = token.trim().to_string();
        self.lock().state.control_csrf_token.clone_from(&token);
        debug!(empty = token.is_empty(), "Control CSRF token refreshed");
        Ok(token)
    }
}

fn log_out(state: &mut SessionState) {
    state.logged_in = false;
    state.control_csrf_token.clear();
}

