//! Capabilities supplied by the host environment.
//!
//! The core never talks to the network, the disk, the speaker or the screen
//! directly. A host (the `evectl` CLI, or fakes in tests) hands these in as
//! `Arc<dyn ...>` when building the [`App`](crate::app::App).

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::checkpoints::Checkpoint;
use crate::control::ControlResult;
use crate::error::{HttpError, StorageError};
use crate::history::DayGroup;

/// HTTP access to the ticketing server.
///
/// Implementations keep a cookie jar: the server session lives in cookies,
/// the core only ever asks for it to be wiped.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the response body as text.
    async fn get(&self, url: &str) -> Result<String, HttpError>;

    /// POST `fields` as `application/x-www-form-urlencoded` and return the body.
    async fn post_form(&self, url: &str, fields: &[(String, String)])
    -> Result<String, HttpError>;

    /// Drop every stored session cookie.
    fn clear_cookies(&self);
}

/// Persistent string key-value storage (settings, history).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Failure from the audio device. Only ever logged.
#[derive(Debug, Clone, Error)]
#[error("audio feedback failed: {0}")]
pub struct AudioError(pub String);

/// Best-effort audible feedback after a control.
pub trait AudioFeedback: Send + Sync {
    /// Play the success or the error cue.
    fn play(&self, success: bool) -> Result<(), AudioError>;

    /// Set the output volume (0-100).
    fn set_volume(&self, volume: u8) -> Result<(), AudioError>;
}

/// Short user-facing notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SignedIn,
    AuthenticationFailed,
    SettingsRequired,
    MissingCheckpoint,
    NoCheckpoints,
    SubmissionFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignedIn => f.write_str("Signed in"),
            Self::AuthenticationFailed => {
                f.write_str("Authentication error: please check your connection settings")
            }
            Self::SettingsRequired => f.write_str("Please fill in your connection settings"),
            Self::MissingCheckpoint => f.write_str("Please select a checkpoint"),
            Self::NoCheckpoints => f.write_str(
                "No checkpoint available, please contact your administrator",
            ),
            Self::SubmissionFailed(reason) => write!(f, "Control failed: {reason}"),
        }
    }
}

/// Everything the core asks the user interface to show.
pub trait Presenter: Send + Sync {
    /// Show or hide the busy indicator.
    fn set_loading(&self, active: bool);

    fn notify(&self, notice: Notice);

    /// Drop the previously displayed control result.
    fn clear_result(&self);

    fn show_result(&self, result: &ControlResult);

    /// Redraw the history, newest day first.
    fn render_history(&self, groups: &[DayGroup]);

    fn show_checkpoints(&self, checkpoints: &[Checkpoint]);

    fn keep_screen_on(&self, enabled: bool);

    /// Hide the administrative surfaces (settings, history, checkpoint choice).
    fn set_public_mode(&self, enabled: bool);

    /// Bring the settings form to the front.
    fn open_settings(&self);

    /// The device cannot be used any further.
    fn request_exit(&self);
}
