//! Checkpoints available to the logged-in operator.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::CredentialStore;
use crate::endpoints;
use crate::error::{Error, Result};
use crate::host::HttpClient;

/// Language whose event name is shown first.
const PREFERRED_LANGUAGE: &str = "fr";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub id: String,
    pub name: String,
    pub event_name: String,
}

impl Checkpoint {
    /// `checkpoint@event`, as shown in the checkpoint picker.
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.event_name)
    }
}

#[derive(Debug, Deserialize)]
struct RawCheckpoint {
    id: Value,
    name: String,
    #[serde(rename = "Event", default)]
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "Translation", default)]
    translation: HashMap<String, RawTranslation>,
}

#[derive(Debug, Deserialize)]
struct RawTranslation {
    #[serde(default)]
    name: String,
}

impl From<RawCheckpoint> for Checkpoint {
    fn from(raw: RawCheckpoint) -> Self {
        let id = match raw.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let event_name = raw
            .event
            .and_then(|mut event| {
                event
                    .translation
                    .remove(PREFERRED_LANGUAGE)
                    .or_else(|| event.translation.into_values().next())
            })
            .map(|t| t.name)
            .unwrap_or_default();
        Self {
            id,
            name: raw.name,
            event_name,
        }
    }
}

/// Parse the checkpoint list. Some servers double-encode it as a JSON string.
pub fn parse_checkpoints(body: &str) -> Result<Vec<Checkpoint>> {
    let mut value: Value = serde_json::from_str(body)?;
    if let Value::String(inner) = value {
        value = serde_json::from_str(&inner)?;
    }
    let raw: Vec<RawCheckpoint> = serde_json::from_value(value)?;
    Ok(raw.into_iter().map(Checkpoint::from).collect())
}

pub struct CheckpointCatalog {
    http: Arc<dyn HttpClient>,
    settings: Arc<CredentialStore>,
}

impl CheckpointCatalog {
    pub fn new(http: Arc<dyn HttpClient>, settings: Arc<CredentialStore>) -> Self {
        Self { http, settings }
    }

    /// Fetch the checkpoints of the current session.
    ///
    /// An empty list is [`Error::NoCheckpoints`]: the device has nothing to
    /// control against.
    pub async fn load(&self) -> Result<Vec<Checkpoint>> {
        let url = endpoints::url(&self.settings.snapshot().server_url, endpoints::CHECKPOINTS);
        let body = self.http.get(&url).await?;
        let checkpoints = parse_checkpoints(&body)?;
        if checkpoints.is_empty() {
            warn!("Server returned no checkpoint");
            return Err(Error::NoCheckpoints);
        }
        info!(count = checkpoints.len(), "Checkpoints loaded");
        Ok(checkpoints)
    }
}
