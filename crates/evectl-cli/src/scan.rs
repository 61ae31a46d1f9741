//! Scan loop: ticket IDs arrive one per line, the way a keyboard-wedge
//! barcode scanner types them.
//!
//! Lines starting with `:` are operator commands:
//! - `:checkpoint <id>` (or `:c <id>`) selects the checkpoint
//! - `:checkpoints` lists them again
//! - `:history` prints the history
//! - `:quit` (or `:q`) leaves

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use evectl_core::{App, Error, SessionEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::presenter::{TerminalPresenter, format_history};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Ticket(String),
    Select(String),
    ListCheckpoints,
    History,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return Input::Ticket(line.to_string());
    };
    let mut words = command.split_whitespace();
    match (words.next(), words.next()) {
        (Some("checkpoint" | "c"), Some(id)) => Input::Select(id.to_string()),
        (Some("checkpoints"), None) => Input::ListCheckpoints,
        (Some("history" | "h"), None) => Input::History,
        (Some("quit" | "q"), None) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

pub struct ScanLoop<W> {
    app: App,
    presenter: Arc<TerminalPresenter<W>>,
    preferred_checkpoint: Option<String>,
}

impl<W: Write + Send + 'static> ScanLoop<W> {
    pub const fn new(
        app: App,
        presenter: Arc<TerminalPresenter<W>>,
        preferred_checkpoint: Option<String>,
    ) -> Self {
        Self {
            app,
            presenter,
            preferred_checkpoint,
        }
    }

    pub const fn app(&self) -> &App {
        &self.app
    }

    /// Start the device, then control every ticket read from `input` until
    /// it ends, the operator quits, or the device must exit.
    pub async fn run<R>(&mut self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut events = self.app.subscribe();
        self.startup(&mut events).await?;

        let mut lines = input.lines();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.on_event(event).await?,
                    Err(RecvError::Lagged(missed)) => warn!(missed, "Session events dropped"),
                    Err(RecvError::Closed) => break,
                },
                line = lines.next_line() => {
                    let Some(line) = line.context("reading scanner input")? else {
                        debug!("Scanner input closed");
                        break;
                    };
                    if !self.on_line(&line).await {
                        break;
                    }
                }
            }
            if self.presenter.exit_requested() {
                break;
            }
        }
        Ok(())
    }

    async fn startup(&mut self, events: &mut broadcast::Receiver<SessionEvent>) -> anyhow::Result<()> {
        let pending = match self.app.start().await {
            Ok(pending) => pending,
            Err(Error::SettingsMissing) => {
                anyhow::bail!("no settings saved: run `evectl settings set` first")
            }
            Err(e) => return Err(e.into()),
        };
        let login = pending.wait().await;
        self.app.drain_session_events(events).await?;
        login.context("could not sign in")?;
        self.choose_checkpoint();
        Ok(())
    }

    async fn on_event(&mut self, event: SessionEvent) -> anyhow::Result<()> {
        match self.app.handle_session_event(event).await {
            Ok(()) => {
                self.choose_checkpoint();
                Ok(())
            }
            Err(Error::NoCheckpoints) => Err(Error::NoCheckpoints.into()),
            Err(e) => {
                warn!(error = %e, "Session event not handled");
                Ok(())
            }
        }
    }

    /// Keep the current selection, else the preferred checkpoint, else the
    /// only one offered.
    fn choose_checkpoint(&mut self) {
        if self.app.selected_checkpoint().is_some() {
            return;
        }
        if let Some(id) = self.preferred_checkpoint.clone() {
            if self.app.select_checkpoint(&id) {
                return;
            }
            warn!(checkpoint = %id, "Preferred checkpoint not offered by the server");
        }
        if let [only] = self.app.checkpoints() {
            let id = only.id.clone();
            self.app.select_checkpoint(&id);
        }
        match self.app.selected_checkpoint() {
            Some(checkpoint) => info!(checkpoint = %checkpoint.label(), "Ready to scan"),
            None => self.say("Select a checkpoint with `:checkpoint <id>`"),
        }
    }

    /// Handle one line; `false` ends the loop.
    async fn on_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Input::Empty => {}
            Input::Quit => return false,
            Input::Ticket(ticket) => {
                // Failures are already shown by the core.
                if let Err(e) = self.app.submit_ticket(&ticket).await {
                    debug!(error = %e, "Ticket not controlled");
                }
            }
            Input::Select(_) | Input::ListCheckpoints | Input::History
                if self.presenter.is_public() =>
            {
                self.say("Not available in public mode");
            }
            Input::Select(id) => {
                if self.app.select_checkpoint(&id) {
                    if let Some(checkpoint) = self.app.selected_checkpoint() {
                        self.say(&format!("Checkpoint: {}", checkpoint.label()));
                    }
                } else {
                    self.say(&format!("Unknown checkpoint {id}"));
                }
            }
            Input::ListCheckpoints => {
                for checkpoint in self.app.checkpoints() {
                    self.say(&format!("  [{}] {}", checkpoint.id, checkpoint.label()));
                }
            }
            Input::History => {
                let text = format_history(self.app.workflow().history().groups());
                self.say(if text.is_empty() { "No history" } else { text.trim_end() });
            }
            Input::Unknown(command) => self.say(&format!("Unknown command {command}")),
        }
        true
    }

    fn say(&self, text: &str) {
        self.presenter.say(text);
    }
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
