use crate::error::{NoteError, NoteResult};
use crate::filesystem::sanitize_collection_name;
use crate::models::{CollectionSettings, CollectionsDocument};

/// Key of the notes file a collection name maps to, folded for
/// case-insensitive filesystems.
fn file_key(name: &str) -> String {
    sanitize_collection_name(name).to_lowercase()
}

/// Named collections, the current pointer and per-collection layout.
///
/// Purely in-memory; the owner persists `document()` after each change.
#[derive(Debug, Clone, Default)]
pub struct CollectionIndex {
    document: CollectionsDocument,
}

impl CollectionIndex {
    /// Builds the index from a stored document and repairs it.
    ///
    /// An unknown current collection falls back to the first one, blank and
    /// duplicate names are dropped, and every collection gets layout settings
    /// (seeded from `defaults` when missing).
    pub fn from_document(mut document: CollectionsDocument, defaults: &CollectionSettings) -> Self {
        let mut seen = Vec::with_capacity(document.collections.len());
        for name in document.collections.drain(..) {
            let name = name.trim().to_string();
            if !name.is_empty() && !seen.contains(&name) {
                seen.push(name);
            }
        }
        document.collections = seen;

        if !document.collections.contains(&document.current_collection) {
            document.current_collection = document.collections.first().cloned().unwrap_or_default();
        }

        for name in &document.collections {
            document
                .collection_settings
                .entry(name.clone())
                .or_insert_with(|| defaults.clone());
        }
        document
            .collection_settings
            .retain(|name, _| document.collections.contains(name));

        Self { document }
    }

    pub fn document(&self) -> &CollectionsDocument {
        &self.document
    }

    /// True until the first collection has been created.
    pub fn needs_first_time_setup(&self) -> bool {
        self.document.collections.is_empty() || self.document.current_collection.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.document.collections
    }

    pub fn count(&self) -> usize {
        self.document.collections.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.document.collections.iter().any(|c| c == name)
    }

    /// The current collection, if any exists.
    pub fn current(&self) -> Option<&str> {
        if self.document.current_collection.is_empty() {
            None
        } else {
            Some(&self.document.current_collection)
        }
    }

    pub fn settings(&self, name: &str) -> Option<&CollectionSettings> {
        self.document.collection_settings.get(name)
    }

    pub fn current_settings(&self) -> Option<&CollectionSettings> {
        self.current().and_then(|name| self.settings(name))
    }

    /// Mutable layout settings of the current collection, created on demand.
    pub fn current_settings_mut(&mut self, defaults: &CollectionSettings) -> Option<&mut CollectionSettings> {
        let name = self.current()?.to_string();
        Some(
            self.document
                .collection_settings
                .entry(name)
                .or_insert_with(|| defaults.clone()),
        )
    }

    /// Validates a proposed collection name.
    ///
    /// Names that are distinct but would share a notes file (e.g. "a/b" and
    /// "a_b", or names differing only in case) are refused.
    ///
    /// # Returns
    /// * `Ok(String)` - The trimmed name
    /// * `Err(NoteError)` - If the name is empty or already taken
    pub fn validate_name(&self, name: &str) -> NoteResult<String> {
        self.validate_name_except(name, None)
    }

    fn validate_name_except(&self, name: &str, except: Option<&str>) -> NoteResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NoteError::validation("Collection name cannot be empty"));
        }
        if self.contains(name) && except != Some(name) {
            return Err(NoteError::validation(format!(
                "A collection named '{}' already exists",
                name
            )));
        }
        let key = file_key(name);
        if let Some(clash) = self
            .document
            .collections
            .iter()
            .filter(|c| except != Some(c.as_str()))
            .find(|c| file_key(c) == key)
        {
            return Err(NoteError::validation(format!(
                "'{}' would share a notes file with collection '{}'",
                name, clash
            )));
        }
        Ok(name.to_string())
    }

    /// Creates the very first collection and makes it current.
    pub fn setup_first(&mut self, name: &str, settings: CollectionSettings) -> NoteResult<String> {
        if !self.needs_first_time_setup() {
            return Err(NoteError::rejected("Collections are already set up"));
        }
        let name = self.validate_name(name)?;
        self.document.collections = vec![name.clone()];
        self.document.current_collection = name.clone();
        self.document.collection_settings.clear();
        self.document
            .collection_settings
            .insert(name.clone(), settings);
        Ok(name)
    }

    /// Appends a new collection. The current collection is unchanged.
    pub fn create(&mut self, name: &str, settings: CollectionSettings) -> NoteResult<String> {
        let name = self.validate_name(name)?;
        self.document.collections.push(name.clone());
        self.document
            .collection_settings
            .insert(name.clone(), settings);
        if self.document.current_collection.is_empty() {
            self.document.current_collection = name.clone();
        }
        Ok(name)
    }

    /// Makes `name` current.
    ///
    /// # Returns
    /// * `Ok(true)` - If the current collection changed
    /// * `Ok(false)` - If `name` was already current
    /// * `Err(NoteError)` - If `name` does not exist
    pub fn switch(&mut self, name: &str) -> NoteResult<bool> {
        if !self.contains(name) {
            return Err(NoteError::NotFound(format!("collection '{}'", name)));
        }
        if self.document.current_collection == name {
            return Ok(false);
        }
        self.document.current_collection = name.to_string();
        Ok(true)
    }

    /// Renames a collection, keeping its position and settings.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> NoteResult<String> {
        let index = self
            .document
            .collections
            .iter()
            .position(|c| c == old_name)
            .ok_or_else(|| NoteError::NotFound(format!("collection '{}'", old_name)))?;
        let new_name = self.validate_name_except(new_name, Some(old_name))?;

        self.document.collections[index] = new_name.clone();
        if let Some(settings) = self.document.collection_settings.remove(old_name) {
            self.document
                .collection_settings
                .insert(new_name.clone(), settings);
        }
        if self.document.current_collection == old_name {
            self.document.current_collection = new_name.clone();
        }
        Ok(new_name)
    }

    /// Deletes a collection. The last collection can never be deleted.
    ///
    /// # Returns
    /// * `Ok(Some(name))` - The deleted collection was current; `name` is the new current
    /// * `Ok(None)` - The current collection is unchanged
    /// * `Err(NoteError)` - If `name` is unknown or is the last collection
    pub fn delete(&mut self, name: &str) -> NoteResult<Option<String>> {
        if self.count() <= 1 {
            return Err(NoteError::rejected("The last collection cannot be deleted"));
        }
        let index = self
            .document
            .collections
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| NoteError::NotFound(format!("collection '{}'", name)))?;

        self.document.collections.remove(index);
        self.document.collection_settings.remove(name);

        if self.document.current_collection == name {
            let fallback = self.document.collections[0].clone();
            self.document.current_collection = fallback.clone();
            return Ok(Some(fallback));
        }
        Ok(None)
    }

    /// Name of the collection after (or before) the current one, wrapping.
    ///
    /// Returns `None` when there is nothing to cycle to.
    pub fn neighbour(&self, forward: bool) -> Option<String> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let current = self
            .document
            .collections
            .iter()
            .position(|c| *c == self.document.current_collection)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        Some(self.document.collections[next].clone())
    }
}
