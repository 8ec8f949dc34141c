use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

use crate::error::{NoteError, NoteResult};
use crate::models::{Note, NoteCard};

/// Title used when content has no usable first line
pub const UNTITLED: &str = "Untitled Note";
/// Longest derived title, ellipsis included
pub const MAX_TITLE_CHARS: usize = 50;
/// Length of the content preview shown on grid cards
pub const PREVIEW_CHARS: usize = 200;

/// Derives a note title from its content.
///
/// Takes the first non-empty line, trims it, strips a leading markdown
/// header marker and truncates to 50 characters (47 plus "...").
pub fn derive_title(content: &str) -> String {
    let Some(first_line) = content.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return UNTITLED.to_string();
    };

    let stripped = first_line.trim_start_matches('#').trim_start();
    if stripped.is_empty() {
        return UNTITLED.to_string();
    }

    if stripped.chars().count() > MAX_TITLE_CHARS {
        let mut title: String = stripped.chars().take(MAX_TITLE_CHARS - 3).collect();
        title.push_str("...");
        title
    } else {
        stripped.to_string()
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

/// Compiled search filter.
///
/// Text that parses as a regular expression is used as one; anything else
/// is matched literally. Matching is always case-insensitive.
#[derive(Debug, Clone)]
struct Filter {
    text: String,
    pattern: Option<Regex>,
}

impl Filter {
    fn new(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self {
                text: text.to_string(),
                pattern: None,
            };
        }

        let pattern = RegexBuilder::new(text)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()
            })
            .ok();

        Self {
            text: text.to_string(),
            pattern,
        }
    }

    fn matches(&self, note: &Note) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(&note.title) || pattern.is_match(&note.content),
            None => true,
        }
    }
}

/// Ordered notes of the current collection plus the filtered view over them.
///
/// Notes are kept most-recently-modified first and re-sorted on every
/// mutation. The filtered view holds ids only and never reorders or drops
/// notes from the underlying sequence.
#[derive(Debug)]
pub struct NoteRepository {
    collection: Option<String>,
    notes: Vec<Note>,
    visible: Vec<i64>,
    filter: Filter,
    next_id: i64,
}

impl NoteRepository {
    /// Creates an empty repository with no collection attached.
    pub fn new() -> Self {
        Self {
            collection: None,
            notes: Vec::new(),
            visible: Vec::new(),
            filter: Filter::new(""),
            next_id: 0,
        }
    }

    /// Replaces the contents with the notes of `collection`.
    ///
    /// Stored titles are re-derived, negative ids are dropped and the next
    /// id continues after the highest one seen. The current filter is kept.
    pub fn load(&mut self, collection: &str, notes: Vec<Note>) {
        let mut valid: Vec<Note> = notes
            .into_iter()
            .filter(|note| note.id >= 0)
            .map(|mut note| {
                note.title = derive_title(&note.content);
                note
            })
            .collect();
        sort_by_recency(&mut valid);

        self.next_id = valid.iter().map(|n| n.id).max().map_or(0, |max| max + 1);
        self.notes = valid;
        self.collection = Some(collection.to_string());
        self.refresh_view();
        log::debug!(
            "Loaded {} notes for collection '{}'",
            self.notes.len(),
            collection
        );
    }

    /// Detaches the repository from any collection.
    pub fn clear(&mut self) {
        self.collection = None;
        self.notes.clear();
        self.visible.clear();
        self.next_id = 0;
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Creates a note from `content`.
    ///
    /// # Returns
    /// * `Ok(id)` - The id of the new note
    /// * `Err(NoteError)` - If the content is blank or no collection is open
    pub fn create(&mut self, content: &str) -> NoteResult<i64> {
        self.create_at(content, Utc::now())
    }

    fn create_at(&mut self, content: &str, now: DateTime<Utc>) -> NoteResult<i64> {
        self.require_collection()?;
        if content.trim().is_empty() {
            return Err(NoteError::validation("Cannot save an empty note"));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.notes.push(Note {
            id,
            title: derive_title(content),
            content: content.to_string(),
            created: now,
            modified: now,
        });
        sort_by_recency(&mut self.notes);
        self.refresh_view();
        Ok(id)
    }

    /// Replaces the content of an existing note.
    ///
    /// # Returns
    /// * `Ok(true)` - If the content changed
    /// * `Ok(false)` - If the content was identical
    /// * `Err(NoteError)` - If the content is blank or the note is unknown
    pub fn update(&mut self, id: i64, content: &str) -> NoteResult<bool> {
        self.update_at(id, content, Utc::now())
    }

    fn update_at(&mut self, id: i64, content: &str, now: DateTime<Utc>) -> NoteResult<bool> {
        self.require_collection()?;
        if content.trim().is_empty() {
            return Err(NoteError::validation("Cannot save an empty note"));
        }

        let note = self
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| NoteError::NotFound(format!("note {}", id)))?;

        if note.content == content {
            return Ok(false);
        }

        note.content = content.to_string();
        note.title = derive_title(content);
        note.modified = now;
        sort_by_recency(&mut self.notes);
        self.refresh_view();
        Ok(true)
    }

    /// Removes a note and returns it.
    pub fn delete(&mut self, id: i64) -> NoteResult<Note> {
        let position = self
            .notes
            .iter()
            .position(|note| note.id == id)
            .ok_or_else(|| NoteError::NotFound(format!("note {}", id)))?;
        let note = self.notes.remove(position);
        self.visible.retain(|visible| *visible != id);
        Ok(note)
    }

    /// Looks a note up by id, ignoring the filter.
    pub fn get(&self, id: i64) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Returns the note at position `index` of the filtered view.
    pub fn get_by_index(&self, index: usize) -> Option<&Note> {
        self.visible.get(index).and_then(|id| self.get(*id))
    }

    /// Position of a note inside the filtered view.
    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.visible.iter().position(|visible| *visible == id)
    }

    pub fn filtered_count(&self) -> usize {
        self.visible.len()
    }

    pub fn total_count(&self) -> usize {
        self.notes.len()
    }

    /// Sets the search filter and recomputes the filtered view.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = Filter::new(text);
        self.refresh_view();
    }

    pub fn filter_text(&self) -> &str {
        &self.filter.text
    }

    /// Notes in the filtered view, in display order.
    pub fn filtered(&self) -> impl Iterator<Item = &Note> {
        self.visible.iter().filter_map(|id| self.get(*id))
    }

    /// Grid cards for the filtered view.
    pub fn cards(&self) -> Vec<NoteCard> {
        self.filtered()
            .map(|note| NoteCard {
                id: note.id,
                title: note.title.clone(),
                preview: preview(&note.content),
                modified: note.modified,
            })
            .collect()
    }

    /// All notes of the collection in display order, ignoring the filter.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    fn refresh_view(&mut self) {
        self.visible = self
            .notes
            .iter()
            .filter(|note| self.filter.matches(note))
            .map(|note| note.id)
            .collect();
    }

    fn require_collection(&self) -> NoteResult<()> {
        if self.collection.is_none() {
            return Err(NoteError::rejected("No collection is open"));
        }
        Ok(())
    }
}

impl Default for NoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_by_recency(notes: &mut [Note]) {
    // Equal timestamps: higher id first.
    notes.sort_by(|a, b| b.modified.cmp(&a.modified).then(b.id.cmp(&a.id)));
}
