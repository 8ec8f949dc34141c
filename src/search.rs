use std::time::Duration;

use crate::notes::NoteRepository;

/// Debounced search text.
///
/// `text` follows every keystroke; `applied` is what the repository filter
/// currently uses. The owner restarts a debounce timer on each change and
/// calls `apply` when it fires.
#[derive(Debug, Clone)]
pub struct SearchController {
    text: String,
    applied: String,
    debounce: Duration,
}

impl SearchController {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            text: String::new(),
            applied: String::new(),
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// The text as typed so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text the filter was last computed from.
    pub fn applied(&self) -> &str {
        &self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.text != self.applied
    }

    /// Records new search text.
    ///
    /// # Returns
    /// `true` if the text differs from the previous keystroke
    pub fn text_changed(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text = text.to_string();
        true
    }

    /// Pushes the pending text into the repository filter.
    ///
    /// # Returns
    /// `true` if the filter changed
    pub fn apply(&mut self, notes: &mut NoteRepository) -> bool {
        if !self.is_pending() && notes.filter_text() == self.applied {
            return false;
        }
        self.applied = self.text.clone();
        notes.set_filter(&self.applied);
        log::debug!(
            "Search '{}' matches {} of {} notes",
            self.applied,
            notes.filtered_count(),
            notes.total_count()
        );
        true
    }

    /// Drops the search text and removes the filter.
    ///
    /// # Returns
    /// `true` if a filter or pending text was removed
    pub fn clear(&mut self, notes: &mut NoteRepository) -> bool {
        let had_filter = !self.text.is_empty() || !notes.filter_text().is_empty();
        self.text.clear();
        self.applied.clear();
        notes.set_filter("");
        had_filter
    }
}
