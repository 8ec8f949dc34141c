use chrono::Utc;

use crate::error::NoteResult;
use crate::models::{Note, NEW_NOTE_ID};
use crate::notes::NoteRepository;

/// What committing the editor buffer did to the repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new note was created with this id
    Created(i64),
    Updated(i64),
    /// The buffer matches the stored note
    Unchanged(i64),
}

impl SaveOutcome {
    pub fn id(self) -> i64 {
        match self {
            SaveOutcome::Created(id) | SaveOutcome::Updated(id) | SaveOutcome::Unchanged(id) => id,
        }
    }

    pub fn changed(self) -> bool {
        !matches!(self, SaveOutcome::Unchanged(_))
    }
}

/// The note open in the editor.
///
/// `note_id` is `NEW_NOTE_ID` until the first successful save of a new
/// note. The unsaved counter counts edits since the last successful write
/// and is only reset by `mark_persisted`.
#[derive(Debug, Clone)]
pub struct EditorSession {
    open: bool,
    note_id: i64,
    buffer: String,
    unsaved_changes: u32,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            open: false,
            note_id: NEW_NOTE_ID,
            buffer: String::new(),
            unsaved_changes: 0,
        }
    }

    /// Starts a fresh, unpersisted note.
    pub fn open_new(&mut self) {
        self.open = true;
        self.note_id = NEW_NOTE_ID;
        self.buffer.clear();
        self.unsaved_changes = 0;
    }

    /// Loads an existing note into the buffer.
    pub fn open_note(&mut self, note: &Note) {
        self.open = true;
        self.note_id = note.id;
        self.buffer = note.content.clone();
        self.unsaved_changes = 0;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.note_id = NEW_NOTE_ID;
        self.buffer.clear();
        self.unsaved_changes = 0;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn note_id(&self) -> i64 {
        self.note_id
    }

    /// Whether the open note exists in the repository.
    pub fn is_persisted(&self) -> bool {
        self.open && self.note_id != NEW_NOTE_ID
    }

    pub fn content(&self) -> &str {
        &self.buffer
    }

    pub fn unsaved_changes(&self) -> u32 {
        self.unsaved_changes
    }

    /// Replaces the buffer with the text field's content.
    ///
    /// # Returns
    /// The unsaved edit count after this edit, or `None` if nothing changed
    pub fn edit(&mut self, content: &str) -> Option<u32> {
        if !self.open || self.buffer == content {
            return None;
        }
        self.buffer = content.to_string();
        self.unsaved_changes = self.unsaved_changes.saturating_add(1);
        Some(self.unsaved_changes)
    }

    /// Writes the buffer into the repository.
    ///
    /// A new note adopts the id it was created with, so a later commit
    /// updates it instead of creating a duplicate. Blank content is
    /// rejected by the repository and nothing changes.
    pub fn commit(&mut self, notes: &mut NoteRepository) -> NoteResult<SaveOutcome> {
        if self.note_id == NEW_NOTE_ID {
            let id = notes.create(&self.buffer)?;
            self.note_id = id;
            log::info!("Created note {}", id);
            return Ok(SaveOutcome::Created(id));
        }
        if notes.update(self.note_id, &self.buffer)? {
            Ok(SaveOutcome::Updated(self.note_id))
        } else {
            Ok(SaveOutcome::Unchanged(self.note_id))
        }
    }

    /// Clears the unsaved counter after the notes document was written.
    pub fn mark_persisted(&mut self) {
        self.unsaved_changes = 0;
    }

    /// The buffer as a note, for statistics while editing.
    pub fn as_note(&self, notes: &NoteRepository) -> Note {
        let now = Utc::now();
        let (created, modified) = notes
            .get(self.note_id)
            .map(|note| (note.created, note.modified))
            .unwrap_or((now, now));
        Note {
            id: self.note_id,
            title: crate::notes::derive_title(&self.buffer),
            content: self.buffer.clone(),
            created,
            modified,
        }
    }
}
