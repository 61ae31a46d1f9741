//! Device application: wires the components together and sequences startup.
//!
//! Startup runs settings → authenticate → checkpoints → ready. The login
//! itself runs on a background task; its outcome comes back as a
//! [`SessionEvent`] which the host feeds to [`App::handle_session_event`].

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::checkpoints::{Checkpoint, CheckpointCatalog};
use crate::config::{CredentialStore, Settings};
use crate::control::{ControlWorkflow, SubmitOutcome};
use crate::error::{Error, Result};
use crate::history::HistoryLog;
use crate::host::{AudioFeedback, HttpClient, KeyValueStore, Notice, Presenter};
use crate::session::{PendingAuth, SessionEvent, SessionManager};

/// Capabilities the host hands to the core.
#[derive(Clone)]
pub struct Host {
    pub http: Arc<dyn HttpClient>,
    pub store: Arc<dyn KeyValueStore>,
    pub audio: Arc<dyn AudioFeedback>,
    pub presenter: Arc<dyn Presenter>,
}

pub struct App {
    settings: Arc<CredentialStore>,
    session: Arc<SessionManager>,
    workflow: ControlWorkflow,
    catalog: CheckpointCatalog,
    presenter: Arc<dyn Presenter>,
    audio: Arc<dyn AudioFeedback>,
    checkpoints: Vec<Checkpoint>,
    selected_checkpoint: Option<String>,
}

impl App {
    pub fn new(host: Host) -> Self {
        let settings = Arc::new(CredentialStore::new(Arc::clone(&host.store)));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&host.http),
            Arc::clone(&settings),
        ));
        let history = HistoryLog::new(Arc::clone(&host.store), Arc::clone(&host.presenter));
        let workflow = ControlWorkflow::new(
            Arc::clone(&session),
            Arc::clone(&host.http),
            Arc::clone(&settings),
            Arc::clone(&host.presenter),
            Arc::clone(&host.audio),
            history,
        );
        let catalog = CheckpointCatalog::new(Arc::clone(&host.http), Arc::clone(&settings));
        Self {
            settings,
            session,
            workflow,
            catalog,
            presenter: host.presenter,
            audio: host.audio,
            checkpoints: Vec::new(),
            selected_checkpoint: None,
        }
    }

    /// Session events. Subscribe before [`start`](Self::start) to see the
    /// first login.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    pub const fn workflow(&self) -> &ControlWorkflow {
        &self.workflow
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn selected_checkpoint(&self) -> Option<&Checkpoint> {
        let id = self.selected_checkpoint.as_deref()?;
        self.checkpoints.iter().find(|c| c.id == id)
    }

    /// Select the checkpoint tickets are controlled against.
    ///
    /// Returns `false` when `id` is not in the current list.
    pub fn select_checkpoint(&mut self, id: &str) -> bool {
        if self.checkpoints.iter().any(|c| c.id == id) {
            info!(checkpoint = id, "Checkpoint selected");
            self.selected_checkpoint = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Restore history and settings, then start logging in.
    pub async fn start(&mut self) -> Result<PendingAuth> {
        if let Err(e) = self.workflow.history_mut().load_all().await {
            warn!(error = %e, "Saved history could not be restored");
        }

        let Some(settings) = self.settings.load().await? else {
            self.presenter.notify(Notice::SettingsRequired);
            self.presenter.open_settings();
            return Err(Error::SettingsMissing);
        };
        Ok(self.apply_settings(settings).await)
    }

    /// Put `settings` in effect and authenticate with them.
    pub async fn apply_settings(&mut self, settings: Settings) -> PendingAuth {
        let previous = self.settings.replace(settings.clone());
        if previous.session_differs(&settings) {
            self.session.invalidate();
        }

        if settings.sound_enabled {
            if let Err(e) = self.audio.set_volume(settings.volume) {
                warn!(error = %e, "Volume could not be set");
            }
        }
        self.presenter.keep_screen_on(settings.keep_screen_on);
        self.presenter.set_public_mode(settings.public_mode);

        if previous.history_enabled && !settings.history_enabled {
            // A failed clear is already logged; the setting still applies.
            let _ = self.workflow.history_mut().clear().await;
        }

        debug!("Settings ready");
        self.presenter.set_loading(true);
        self.session.authenticate()
    }

    /// Persist `settings`, then apply them. Nothing is applied when the
    /// save fails.
    pub async fn save_settings(&mut self, settings: Settings) -> Result<PendingAuth> {
        if let Err(e) = self.settings.save(&settings).await {
            warn!(error = %e, "Settings not saved");
            return Err(e);
        }
        Ok(self.apply_settings(settings).await)
    }

    /// React to a session transition.
    pub async fn handle_session_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Established => {
                self.presenter.notify(Notice::SignedIn);
                self.refresh_checkpoints().await
            }
            SessionEvent::AuthenticationFailed(reason) => {
                debug!(%reason, "Opening settings after failed login");
                self.presenter.set_loading(false);
                self.presenter.notify(Notice::AuthenticationFailed);
                self.presenter.open_settings();
                Ok(())
            }
        }
    }

    /// Handle every event already queued on `events`.
    pub async fn drain_session_events(
        &mut self,
        events: &mut broadcast::Receiver<SessionEvent>,
    ) -> Result<()> {
        loop {
            match events.try_recv() {
                Ok(event) => self.handle_session_event(event).await?,
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Session events dropped");
                }
                Err(_) => return Ok(()),
            }
        }
    }

    async fn refresh_checkpoints(&mut self) -> Result<()> {
        let loaded = self.catalog.load().await;
        self.presenter.set_loading(false);
        match loaded {
            Ok(checkpoints) => {
                if self
                    .selected_checkpoint
                    .as_deref()
                    .is_some_and(|id| !checkpoints.iter().any(|c| c.id == id))
                {
                    self.selected_checkpoint = None;
                }
                self.presenter.show_checkpoints(&checkpoints);
                self.checkpoints = checkpoints;
                Ok(())
            }
            Err(Error::NoCheckpoints) => {
                self.presenter.notify(Notice::NoCheckpoints);
                self.presenter.request_exit();
                Err(Error::NoCheckpoints)
            }
            Err(e) => {
                warn!(error = %e, "Checkpoints could not be loaded");
                Err(e)
            }
        }
    }

    /// Control a scanned ticket against the selected checkpoint.
    pub async fn submit_ticket(&mut self, ticket_id: &str) -> Result<SubmitOutcome> {
        self.workflow
            .submit_ticket(ticket_id, self.selected_checkpoint.as_deref())
            .await
    }
}
