//! eve-control CLI Library
//!
//! Terminal host for the eve-control core: reqwest HTTP client, JSON file
//! store, terminal bell and a line-oriented presenter, driven by a scan loop
//! reading ticket IDs from stdin.

pub mod audio;
pub mod config;
pub mod history_cmd;
pub mod http;
pub mod presenter;
pub mod scan;
pub mod settings_cmd;
