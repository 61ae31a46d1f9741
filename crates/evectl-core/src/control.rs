//! Ticket control workflow.
//!
//! A scan goes `Idle → AwaitingControlCsrf → Submitting → Idle`:
//!
//! 1. repeated scans inside the suppression window are dropped;
//! 2. the checkpoint is checked before any network traffic;
//! 3. a fresh control CSRF token is fetched, re-authenticating in the
//!    background when the server session is gone;
//! 4. the control is posted and its result is played, recorded and shown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::CredentialStore;
use crate::endpoints;
use crate::error::{Error, Result};
use crate::history::{HistoryEntry, HistoryLog};
use crate::host::{AudioFeedback, HttpClient, Notice, Presenter};
use crate::session::SessionManager;
use crate::suppression::SuppressionWindow;
use crate::timestamp::Timestamp;

/// Result codes that validate the ticket but deserve the operator's attention.
pub const WARNING_CODES: [i64; 4] = [1002, 1003, 1005, 1006];

pub fn is_warning_code(code: i64) -> bool {
    WARNING_CODES.contains(&code)
}

/// Workflow position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    #[default]
    Idle,
    AwaitingControlCsrf,
    Submitting,
}

/// One ticket presented at one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub ticket_id: String,
    pub checkpoint_id: String,
}

impl ControlRequest {
    /// Form body expected by the control endpoint.
    pub fn form_fields(&self, csrf_token: &str) -> Vec<(String, String)> {
        vec![
            ("control[_csrf_token]".to_string(), csrf_token.to_string()),
            ("control[ticket_id]".to_string(), self.ticket_id.clone()),
            (
                "control[checkpoint_id]".to_string(),
                self.checkpoint_id.clone(),
            ),
        ]
    }
}

/// Raw JSON answer of the control endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub details: Option<ControlDetails>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlDetails {
    #[serde(default)]
    pub control: Option<FieldErrors>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldErrors {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ControlResponse {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::SubmissionNetwork(format!("unexpected control response: {e}")))
    }

    fn errors(&self) -> &[String] {
        self.details
            .as_ref()
            .and_then(|d| d.control.as_ref())
            .map(|c| c.errors.as_slice())
            .unwrap_or_default()
    }
}

/// Outcome of one ticket control, as displayed and recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    pub success: bool,
    pub code: i64,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub warning: bool,
}

impl ControlResult {
    /// Build the result of `response`. `received_at` stands in for a missing
    /// or unreadable server timestamp.
    pub fn from_response(response: &ControlResponse, received_at: Timestamp) -> Self {
        let timestamp = response
            .timestamp
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(received_at);
        let error_message = if response.success {
            None
        } else {
            Some(response.errors().join(", ")).filter(|m| !m.is_empty())
        };
        Self {
            success: response.success,
            code: response.code,
            timestamp,
            error_message,
            warning: is_warning_code(response.code),
        }
    }
}

/// What [`ControlWorkflow::submit_ticket`] did with a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Repeated scan inside the suppression window; nothing was sent.
    Suppressed,
    Controlled(ControlResult),
}

pub struct ControlWorkflow {
    session: Arc<SessionManager>,
    http: Arc<dyn HttpClient>,
    settings: Arc<CredentialStore>,
    presenter: Arc<dyn Presenter>,
    audio: Arc<dyn AudioFeedback>,
    history: HistoryLog,
    window: SuppressionWindow,
    state: ControlState,
}

impl ControlWorkflow {
    pub fn new(
        session: Arc<SessionManager>,
        http: Arc<dyn HttpClient>,
        settings: Arc<CredentialStore>,
        presenter: Arc<dyn Presenter>,
        audio: Arc<dyn AudioFeedback>,
        history: HistoryLog,
    ) -> Self {
        Self {
            session,
            http,
            settings,
            presenter,
            audio,
            history,
            window: SuppressionWindow::new(),
            state: ControlState::Idle,
        }
    }

    pub const fn state(&self) -> ControlState {
        self.state
    }

    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub const fn history_mut(&mut self) -> &mut HistoryLog {
        &mut self.history
    }

    /// Control `ticket_id` at `checkpoint_id`.
    #[instrument(skip(self))]
    pub async fn submit_ticket(
        &mut self,
        ticket_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<SubmitOutcome> {
        let settings = self.settings.snapshot();
        let now = Instant::now();

        if self.window.is_duplicate(ticket_id, now) {
            self.window.schedule_clear(now + settings.redundancy());
            debug!("Repeated scan suppressed");
            return Ok(SubmitOutcome::Suppressed);
        }
        self.window.arm(ticket_id, now + settings.redundancy());

        self.presenter.set_loading(true);
        self.presenter.clear_result();

        let Some(checkpoint_id) = checkpoint_id.map(str::trim).filter(|c| !c.is_empty()) else {
            self.presenter.set_loading(false);
            self.presenter.notify(Notice::MissingCheckpoint);
            warn!("Control refused: no checkpoint selected");
            return Err(Error::MissingCheckpoint);
        };
        let request = ControlRequest {
            ticket_id: ticket_id.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
        };

        self.state = ControlState::AwaitingControlCsrf;
        let token = self.control_token().await;
        if !self.session.is_logged_in() {
            // Not awaited: the control goes out with whatever token we hold.
            let _ = self.session.authenticate();
        }

        self.state = ControlState::Submitting;
        let url = endpoints::url(&settings.server_url, endpoints::CONTROL);
        let response = self
            .http
            .post_form(&url, &request.form_fields(&token))
            .await
            .map_err(|e| Error::SubmissionNetwork(e.to_string()))
            .and_then(|body| ControlResponse::parse(&body));
        self.state = ControlState::Idle;
        self.presenter.set_loading(false);

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Control submission failed");
                self.presenter.notify(Notice::SubmissionFailed(e.to_string()));
                return Err(e);
            }
        };
        let result = ControlResult::from_response(&response, Timestamp::now());
        info!(
            success = result.success,
            code = result.code,
            warning = result.warning,
            "Ticket controlled"
        );

        if settings.sound_enabled {
            if let Err(e) = self.audio.play(result.success) {
                warn!(error = %e, "Audio feedback failed");
            }
        }

        if let Err(e) = self
            .history
            .append(HistoryEntry::from(result.clone()), settings.history_enabled)
            .await
        {
            debug!(error = %e, "Result not recorded");
        }
        self.presenter.show_result(&result);

        Ok(SubmitOutcome::Controlled(result))
    }

    /// Refresh the control CSRF token.
    ///
    /// A failed fetch or an empty token means the server session is gone:
    /// the session is invalidated and the last known token is returned.
    async fn control_token(&self) -> String {
        let stale = self.session.control_csrf_token();
        match self.session.fetch_control_csrf().await {
            Ok(token) if !token.is_empty() => token,
            Ok(_) => {
                info!("Server session expired");
                self.session.invalidate();
                stale
            }
            Err(e) => {
                warn!(error = %e, "Control CSRF fetch failed");
                self.session.invalidate();
                stale
            }
        }
    }
}
