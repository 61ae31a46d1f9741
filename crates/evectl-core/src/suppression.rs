//! Duplicate scan suppression.
//!
//! Barcode readers often fire twice on the same ticket. After a ticket is
//! submitted, identical IDs are ignored until the window expires. Every
//! ignored scan also schedules a one-shot clear of the window; those clears
//! are never cancelled, even by a newer submission.

use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct SuppressionWindow {
    last_ticket_id: Option<String>,
    expires_at: Option<Instant>,
    pending_clears: Vec<Instant>,
}

impl SuppressionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ticket_id` repeats the last submission within its window.
    ///
    /// Runs every clear that fell due before `now` first.
    pub fn is_duplicate(&mut self, ticket_id: &str, now: Instant) -> bool {
        self.fire_due_clears(now);
        self.last_ticket_id.as_deref() == Some(ticket_id)
            && self.expires_at.is_some_and(|expiry| now < expiry)
    }

    /// Open a new window for `ticket_id`.
    pub fn arm(&mut self, ticket_id: &str, expires_at: Instant) {
        self.last_ticket_id = Some(ticket_id.to_string());
        self.expires_at = Some(expires_at);
    }

    /// Schedule the window to be wiped at `at`.
    pub fn schedule_clear(&mut self, at: Instant) {
        self.pending_clears.push(at);
    }

    pub fn last_ticket_id(&self) -> Option<&str> {
        self.last_ticket_id.as_deref()
    }

    pub fn pending_clears(&self) -> usize {
        self.pending_clears.len()
    }

    fn fire_due_clears(&mut self, now: Instant) {
        let before = self.pending_clears.len();
        self.pending_clears.retain(|&at| at > now);
        if self.pending_clears.len() < before {
            self.last_ticket_id = None;
            self.expires_at = None;
        }
    }
}
