//! Operator settings and the credential store.
//!
//! Settings are resolved in this order:
//! 1. Built-in defaults
//! 2. The JSON document saved under [`SETTINGS_KEY`] in the host store
//! 3. Environment variables (`EVECTL_*`), never written back

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::host::KeyValueStore;

/// Store key holding the serialized [`Settings`].
pub const SETTINGS_KEY: &str = "settings";

/// Complete operator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Ticketing server base URL (e.g. "<https://tickets.example.org>").
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Play a cue after every control.
    pub sound_enabled: bool,
    /// Output volume, 0-100.
    pub volume: u8,
    pub keep_screen_on: bool,
    /// Persist control results across restarts.
    pub history_enabled: bool,
    /// Lock the device down for unattended use.
    pub public_mode: bool,
    /// Seconds during which a repeated scan of the same ticket is ignored.
    pub redundancy_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            username: String::new(),
            password: String::new(),
            sound_enabled: true,
            volume: 50,
            keep_screen_on: true,
            history_enabled: true,
            public_mode: false,
            redundancy_seconds: 5,
        }
    }
}

impl Settings {
    pub const fn redundancy(&self) -> Duration {
        Duration::from_secs(self.redundancy_seconds)
    }

    /// Whether switching from `self` to `other` invalidates the server session.
    pub fn session_differs(&self, other: &Self) -> bool {
        self.server_url != other.server_url
            || self.username != other.username
            || self.password != other.password
    }

    /// Reject values the workflow cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.volume > 100 {
            return Err(Error::Config(format!(
                "volume must be between 0 and 100, got {}",
                self.volume
            )));
        }
        if !self.server_url.is_empty()
            && !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "server URL must start with http:// or https://, got {}",
                self.server_url
            )));
        }
        Ok(())
    }
}

/// Apply `EVECTL_*` overrides read through `lookup`.
///
/// Returns `true` when at least one variable was applied.
pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> bool {
    let mut applied = false;
    if let Some(val) = lookup("EVECTL_SERVER_URL") {
        settings.server_url = val;
        applied = true;
    }
    if let Some(val) = lookup("EVECTL_USERNAME") {
        settings.username = val;
        applied = true;
    }
    if let Some(val) = lookup("EVECTL_PASSWORD") {
        settings.password = val;
        applied = true;
    }
    if let Some(val) = lookup("EVECTL_REDUNDANCY") {
        if let Ok(n) = val.parse() {
            settings.redundancy_seconds = n;
            applied = true;
        }
    }
    applied
}

/// Holds the current [`Settings`] and persists them through the host store.
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
    current: RwLock<Settings>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            current: RwLock::new(Settings::default()),
        }
    }

    /// Read the saved settings, with environment overrides applied.
    ///
    /// Returns `None` when nothing was saved and the environment provides
    /// nothing either.
    pub async fn load(&self) -> Result<Option<Settings>> {
        self.load_with(|key| std::env::var(key).ok()).await
    }

    pub async fn load_with(
        &self,
        lookup: impl Fn(&str) -> Option<String> + Send,
    ) -> Result<Option<Settings>> {
        let stored = match self.kv.get(SETTINGS_KEY).await? {
            Some(raw) => Some(serde_json::from_str::<Settings>(&raw)?),
            None => None,
        };
        let found = stored.is_some();
        let mut settings = stored.unwrap_or_default();
        let overridden = apply_env_overrides(&mut settings, lookup);
        debug!(found, overridden, "Settings loaded");
        Ok((found || overridden).then_some(settings))
    }

    /// Persist `settings`. Does not change the current snapshot.
    pub async fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;
        self.kv.set(SETTINGS_KEY, json).await?;
        info!(server = %settings.server_url, "Settings saved");
        Ok(())
    }

    /// Copy of the settings currently in effect.
    pub fn snapshot(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Put `settings` in effect and return the previous ones.
    pub fn replace(&self, settings: Settings) -> Settings {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, settings)
    }
}
