//! History subcommand: print or clear the saved control results.

use std::io::Write;
use std::sync::Arc;

use evectl_core::checkpoints::Checkpoint;
use evectl_core::history::DayGroup;
use evectl_core::host::{KeyValueStore, Notice, Presenter};
use evectl_core::{ControlResult, HistoryLog};

use crate::presenter::format_history;

/// Presenter for a log that is read once and printed by the command.
struct Offscreen;

impl Presenter for Offscreen {
    fn set_loading(&self, _active: bool) {}
    fn notify(&self, _notice: Notice) {}
    fn clear_result(&self) {}
    fn show_result(&self, _result: &ControlResult) {}
    fn render_history(&self, _groups: &[DayGroup]) {}
    fn show_checkpoints(&self, _checkpoints: &[Checkpoint]) {}
    fn keep_screen_on(&self, _enabled: bool) {}
    fn set_public_mode(&self, _enabled: bool) {}
    fn open_settings(&self) {}
    fn request_exit(&self) {}
}

pub async fn run(
    clear: bool,
    store: Arc<dyn KeyValueStore>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut log = HistoryLog::new(store, Arc::new(Offscreen));
    if clear {
        log.clear().await?;
        writeln!(out, "History cleared")?;
        return Ok(());
    }
    log.load_all().await?;
    let text = format_history(log.groups());
    if text.is_empty() {
        writeln!(out, "No history")?;
    } else {
        write!(out, "{text}")?;
    }
    Ok(())
}
