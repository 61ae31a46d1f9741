//! Settings subcommands: show, set.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::Write;
use std::sync::Arc;

use evectl_core::host::KeyValueStore;
use evectl_core::{CredentialStore, Settings};

/// Settings subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum SettingsAction {
    /// Show the saved settings.
    Show,
    /// Change one or more settings.
    Set(SettingsArgs),
}

/// Fields left out keep their saved value.
#[derive(clap::Args, Debug, Default)]
pub struct SettingsArgs {
    /// Ticketing server URL (e.g. "https://tickets.example.org").
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(short, long)]
    pub username: Option<String>,
    #[arg(short, long)]
    pub password: Option<String>,
    /// Ring after every control.
    #[arg(long)]
    pub sound: Option<bool>,
    /// Output volume, 0-100.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,
    #[arg(long)]
    pub keep_screen_on: Option<bool>,
    /// Keep control results across restarts.
    #[arg(long)]
    pub history: Option<bool>,
    /// Hide history and checkpoint choice from the scan loop.
    #[arg(long)]
    pub public_mode: Option<bool>,
    /// Seconds during which a repeated scan is ignored.
    #[arg(long)]
    pub redundancy: Option<u64>,
}

impl SettingsArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.server_url {
            settings.server_url = v;
        }
        if let Some(v) = self.username {
            settings.username = v;
        }
        if let Some(v) = self.password {
            settings.password = v;
        }
        if let Some(v) = self.sound {
            settings.sound_enabled = v;
        }
        if let Some(v) = self.volume {
            settings.volume = v;
        }
        if let Some(v) = self.keep_screen_on {
            settings.keep_screen_on = v;
        }
        if let Some(v) = self.history {
            settings.history_enabled = v;
        }
        if let Some(v) = self.public_mode {
            settings.public_mode = v;
        }
        if let Some(v) = self.redundancy {
            settings.redundancy_seconds = v;
        }
    }
}

/// Execute a settings subcommand.
pub async fn run(
    action: SettingsAction,
    store: Arc<dyn KeyValueStore>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let credentials = CredentialStore::new(store);
    // Environment overrides are never written back.
    let saved = credentials.load_with(|_| None).await?;
    match action {
        SettingsAction::Show => match saved {
            Some(settings) => show(&settings, out),
            None => {
                writeln!(out, "No settings saved")?;
                Ok(())
            }
        },
        SettingsAction::Set(args) => {
            let mut settings = saved.unwrap_or_default();
            args.apply(&mut settings);
            credentials.save(&settings).await?;
            writeln!(out, "Settings saved")?;
            show(&settings, out)
        }
    }
}

fn show(settings: &Settings, out: &mut impl Write) -> anyhow::Result<()> {
    let password = if settings.password.is_empty() { "" } else { "********" };
    writeln!(out, "server_url:      {}", settings.server_url)?;
    writeln!(out, "username:        {}", settings.username)?;
    writeln!(out, "password:        {password}")?;
    writeln!(out, "sound:           {}", settings.sound_enabled)?;
    writeln!(out, "volume:          {}", settings.volume)?;
    writeln!(out, "keep_screen_on:  {}", settings.keep_screen_on)?;
    writeln!(out, "history:         {}", settings.history_enabled)?;
    writeln!(out, "public_mode:     {}", settings.public_mode)?;
    writeln!(out, "redundancy:      {}s", settings.redundancy_seconds)?;
    Ok(())
}
