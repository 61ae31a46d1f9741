//! Local, date-grouped history of control results.
//!
//! The persisted list is kept in submission order under [`HISTORY_KEY`].
//! What the operator sees is a separate set of [`DayGroup`]s: one per
//! calendar date, newest date first, entries in submission order. When
//! history is disabled, results still show up in the groups for the rest of
//! the run but are never written to the store.
//!
//! A stored history that cannot be read back is never overwritten. Until it
//! is cleared, new results are displayed but not stored.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::control::ControlResult;
use crate::error::Result;
use crate::host::{KeyValueStore, Presenter};

/// Store key holding the serialized history.
pub const HISTORY_KEY: &str = "history";

/// A control result frozen into the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ControlResult", into = "ControlResult")]
pub struct HistoryEntry {
    result: ControlResult,
    day: NaiveDate,
}

impl HistoryEntry {
    pub const fn result(&self) -> &ControlResult {
        &self.result
    }

    /// Calendar date the entry is grouped under.
    pub const fn grouping_key(&self) -> NaiveDate {
        self.day
    }
}

impl From<ControlResult> for HistoryEntry {
    fn from(result: ControlResult) -> Self {
        let day = result.timestamp.date();
        Self { result, day }
    }
}

impl From<HistoryEntry> for ControlResult {
    fn from(entry: HistoryEntry) -> Self {
        entry.result
    }
}

/// Every entry of one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub entries: Vec<HistoryEntry>,
}

impl DayGroup {
    /// Header line, `DD/MM/YYYY`.
    pub fn header(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }
}

/// Insert `entry` under its day, creating the day in calendar order if needed.
fn place(groups: &mut Vec<DayGroup>, entry: HistoryEntry) {
    let day = entry.grouping_key();
    if let Some(group) = groups.iter_mut().find(|g| g.date == day) {
        group.entries.push(entry);
        return;
    }
    let at = groups
        .iter()
        .position(|g| g.date < day)
        .unwrap_or(groups.len());
    groups.insert(
        at,
        DayGroup {
            date: day,
            entries: vec![entry],
        },
    );
}

/// Group `entries` by day, newest day first.
pub fn group_by_day(entries: impl IntoIterator<Item = HistoryEntry>) -> Vec<DayGroup> {
    let mut groups = Vec::new();
    for entry in entries {
        place(&mut groups, entry);
    }
    groups
}

pub struct HistoryLog {
    kv: Arc<dyn KeyValueStore>,
    presenter: Arc<dyn Presenter>,
    entries: Vec<HistoryEntry>,
    groups: Vec<DayGroup>,
    /// Set when the stored history could not be read.
    unreadable: bool,
}

impl HistoryLog {
    pub fn new(kv: Arc<dyn KeyValueStore>, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            kv,
            presenter,
            entries: Vec::new(),
            groups: Vec::new(),
            unreadable: false,
        }
    }

    /// Persisted entries, in submission order.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Displayed groups, newest day first.
    pub fn groups(&self) -> &[DayGroup] {
        &self.groups
    }

    /// Restore the persisted history and redraw it.
    ///
    /// On failure the stored document is kept as is and later appends are
    /// not persisted.
    pub async fn load_all(&mut self) -> Result<()> {
        let loaded = self.read().await;
        self.unreadable = loaded.is_err();
        let Some(entries) = loaded? else {
            debug!("No saved history");
            return Ok(());
        };
        info!(count = entries.len(), "History restored");
        self.groups = group_by_day(entries.iter().cloned());
        self.entries = entries;
        self.presenter.render_history(&self.groups);
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<HistoryEntry>>> {
        let Some(raw) = self.kv.get(HISTORY_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Record a control result.
    ///
    /// With `persist` off, or while the stored history is unreadable, the
    /// entry is only displayed. A failed write rolls the in-memory list back
    /// and nothing is displayed.
    pub async fn append(&mut self, entry: HistoryEntry, persist: bool) -> Result<()> {
        if persist && self.unreadable {
            warn!("Saved history unreadable, result kept for this run only");
        } else if persist {
            self.entries.push(entry.clone());
            let saved: Result<()> = match serde_json::to_string(&self.entries) {
                Ok(json) => self.kv.set(HISTORY_KEY, json).await.map_err(Into::into),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = saved {
                self.entries.pop();
                warn!(error = %e, "History append abandoned");
                return Err(e);
            }
        }
        place(&mut self.groups, entry);
        self.presenter.render_history(&self.groups);
        Ok(())
    }

    /// Drop the whole history, stored and displayed.
    pub async fn clear(&mut self) -> Result<()> {
        if let Err(e) = self.kv.remove(HISTORY_KEY).await {
            warn!(error = %e, "History clear abandoned");
            return Err(e.into());
        }
        self.entries.clear();
        self.groups.clear();
        self.unreadable = false;
        self.presenter.render_history(&self.groups);
        info!("History cleared");
        Ok(())
    }
}
