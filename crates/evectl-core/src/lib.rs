//! eve-control Core Library
//!
//! Controller logic for a checkpoint ticket-validation device:
//! - Operator session and CSRF token handling
//! - Ticket control workflow with duplicate scan suppression
//! - Date-grouped local history of control results
//! - Settings resolution and the startup sequence
//!
//! Network, storage, audio and display are capabilities supplied by the
//! host (see [`host`]).

pub mod app;
pub mod checkpoints;
pub mod config;
pub mod control;
pub mod endpoints;
pub mod error;
pub mod history;
pub mod host;
pub mod session;
pub mod suppression;
pub mod timestamp;
pub mod tracing_init;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

#[cfg(test)]
mod app_tests;

pub use app::{App, Host};
pub use config::{CredentialStore, Settings};
pub use control::{ControlResult, ControlState, ControlWorkflow, SubmitOutcome};
pub use error::{Error, Result};
pub use history::{DayGroup, HistoryEntry, HistoryLog};
pub use session::{SessionEvent, SessionManager, SessionState};
