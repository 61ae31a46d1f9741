//! Line-oriented terminal presenter.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use evectl_core::ControlResult;
use evectl_core::checkpoints::Checkpoint;
use evectl_core::history::DayGroup;
use evectl_core::host::{Notice, Presenter};
use tracing::{debug, warn};

/// One-line verdict for a control result.
pub fn format_result(result: &ControlResult) -> String {
    let verdict = match (result.success, result.warning) {
        (true, false) => "VALID",
        (true, true) => "VALID (check)",
        (false, true) => "WARNING",
        (false, false) => "REFUSED",
    };
    let mut line = format!("{verdict} [{}] {}", result.code, result.timestamp);
    if let Some(message) = &result.error_message {
        let _ = write!(line, " - {message}");
    }
    line
}

/// History block: one header per day, newest first.
pub fn format_history(groups: &[DayGroup]) -> String {
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(out, "== {} ==", group.header());
        for entry in &group.entries {
            let result = entry.result();
            let _ = writeln!(
                out,
                "  {}  {}",
                result.timestamp.as_naive().format("%H:%M:%S"),
                format_result(result)
            );
        }
    }
    out
}

/// Writes everything the core shows to `out`.
///
/// Public mode hides the history and the checkpoint list.
#[derive(Debug)]
pub struct TerminalPresenter<W> {
    out: Mutex<W>,
    public_mode: AtomicBool,
    settings_requested: AtomicBool,
    exit_requested: AtomicBool,
}

impl TerminalPresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            public_mode: AtomicBool::new(false),
            settings_requested: AtomicBool::new(false),
            exit_requested: AtomicBool::new(false),
        }
    }

    pub fn is_public(&self) -> bool {
        self.public_mode.load(Ordering::Relaxed)
    }

    /// Whether the core asked for the settings since the last call.
    pub fn take_settings_request(&self) -> bool {
        self.settings_requested.swap(false, Ordering::Relaxed)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Relaxed)
    }

    /// Write a free-form line.
    pub fn say(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            warn!(error = %e, "Terminal write failed");
        }
    }
}

#[cfg(test)]
impl TerminalPresenter<Vec<u8>> {
    #[allow(clippy::unwrap_used)]
    pub(crate) fn output(&self) -> String {
        String::from_utf8(self.out.lock().unwrap().clone()).unwrap()
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn set_loading(&self, active: bool) {
        debug!(active, "Loading");
    }

    fn notify(&self, notice: Notice) {
        self.say(&format!("* {notice}"));
    }

    fn clear_result(&self) {}

    fn show_result(&self, result: &ControlResult) {
        self.say(&format_result(result));
    }

    fn render_history(&self, groups: &[DayGroup]) {
        if self.is_public() || groups.is_empty() {
            return;
        }
        self.say(format_history(groups).trim_end());
    }

    fn show_checkpoints(&self, checkpoints: &[Checkpoint]) {
        if self.is_public() {
            return;
        }
        self.say("Checkpoints:");
        for checkpoint in checkpoints {
            self.say(&format!("  [{}] {}", checkpoint.id, checkpoint.label()));
        }
    }

    fn keep_screen_on(&self, enabled: bool) {
        debug!(enabled, "Keep screen on has no effect in a terminal");
    }

    fn set_public_mode(&self, enabled: bool) {
        self.public_mode.store(enabled, Ordering::Relaxed);
    }

    fn open_settings(&self) {
        self.settings_requested.store(true, Ordering::Relaxed);
        self.say("* Configure the device with `evectl settings set`");
    }

    fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evectl_core::HistoryEntry;
    use evectl_core::history::group_by_day;

    use super::*;

    fn result(code: i64, success: bool, at: &str, message: Option<&str>) -> ControlResult {
        ControlResult {
            success,
            code,
            timestamp: at.parse().unwrap(),
            error_message: message.map(str::to_string),
            warning: evectl_core::control::is_warning_code(code),
        }
    }

    #[test]
    fn verdicts() {
        assert_eq!(
            format_result(&result(0, true, "01/05/2024 10:00:00", None)),
            "VALID [0] 01/05/2024 10:00:00"
        );
        assert_eq!(
            format_result(&result(1002, false, "01/05/2024 10:00:00", Some("bad state"))),
            "WARNING [1002] 01/05/2024 10:00:00 - bad state"
        );
        assert!(format_result(&result(1001, false, "01/05/2024 10:00:00", None)).starts_with("REFUSED"));
    }

    #[test]
    fn history_lists_days_newest_first() {
        let groups = group_by_day([
            HistoryEntry::from(result(0, true, "01/05/2024 10:00:00", None)),
            HistoryEntry::from(result(0, true, "02/05/2024 08:30:00", None)),
        ]);
        let text = format_history(&groups);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "== 02/05/2024 ==");
        assert!(lines[1].starts_with("  08:30:00  VALID"));
        assert_eq!(lines[2], "== 01/05/2024 ==");
    }

    #[test]
    fn public_mode_hides_history_and_checkpoints() {
        let presenter = TerminalPresenter::new(Vec::new());
        presenter.set_public_mode(true);
        let groups = group_by_day([HistoryEntry::from(result(0, true, "01/05/2024 10:00:00", None))]);

        presenter.render_history(&groups);
        presenter.show_checkpoints(&[Checkpoint {
            id: "12".into(),
            name: "Main gate".into(),
            event_name: "Gala".into(),
        }]);
        presenter.notify(Notice::SignedIn);

        assert_eq!(presenter.output(), "* Signed in\n");
    }

    #[test]
    fn settings_request_is_taken_once() {
        let presenter = TerminalPresenter::new(Vec::new());
        presenter.open_settings();
        assert!(presenter.take_settings_request());
        assert!(!presenter.take_settings_request());
        assert!(!presenter.exit_requested());
        presenter.request_exit();
        assert!(presenter.exit_requested());
    }
}
