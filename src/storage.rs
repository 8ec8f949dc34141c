use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::{NoteError, NoteResult};
use crate::models::{CollectionsDocument, Config, FontCache, Note, ThemeRecord};

/// Durable document store behind every persisted record.
///
/// Implementations are expected to be local and fast; calls are treated as
/// synchronous by the core. Missing documents load as defaults.
pub trait Persistence: Send {
    fn load_config(&self) -> NoteResult<Config>;
    fn save_config(&self, config: &Config) -> NoteResult<()>;

    fn load_collections(&self) -> NoteResult<CollectionsDocument>;
    fn save_collections(&self, document: &CollectionsDocument) -> NoteResult<()>;

    fn load_notes(&self, collection: &str) -> NoteResult<Vec<Note>>;
    fn save_notes(&self, collection: &str, notes: &[Note]) -> NoteResult<()>;
    /// Moves a collection's notes aside when the collection is deleted.
    fn archive_notes(&self, collection: &str) -> NoteResult<()>;
    fn rename_notes(&self, from: &str, to: &str) -> NoteResult<()>;

    /// Loads user themes only; built-ins live in code.
    fn load_themes(&self) -> NoteResult<BTreeMap<String, ThemeRecord>>;
    fn save_themes(&self, themes: &BTreeMap<String, ThemeRecord>) -> NoteResult<()>;

    fn load_font_cache(&self) -> NoteResult<Option<FontCache>>;
    fn save_font_cache(&self, cache: &FontCache) -> NoteResult<()>;
}

#[derive(Debug, Default)]
struct MemoryDocuments {
    config: Option<Config>,
    collections: Option<CollectionsDocument>,
    notes: HashMap<String, Vec<Note>>,
    archived: Vec<String>,
    themes: BTreeMap<String, ThemeRecord>,
    font_cache: Option<FontCache>,
    fail_writes: bool,
}

/// In-memory `Persistence`, used by tests and for ephemeral sessions.
///
/// Writes can be switched to fail to exercise error reporting.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<MemoryDocuments>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a collection with notes and makes it the current one if none is set.
    pub fn with_collection(self, name: &str, notes: Vec<Note>) -> Self {
        {
            let mut docs = self.lock();
            let collections = docs.collections.get_or_insert_with(Default::default);
            collections.collections.push(name.to_string());
            if collections.current_collection.is_empty() {
                collections.current_collection = name.to_string();
            }
            docs.notes.insert(name.to_string(), notes);
        }
        self
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn stored_notes(&self, collection: &str) -> Option<Vec<Note>> {
        self.lock().notes.get(collection).cloned()
    }

    pub fn stored_config(&self) -> Option<Config> {
        self.lock().config.clone()
    }

    pub fn stored_collections(&self) -> Option<CollectionsDocument> {
        self.lock().collections.clone()
    }

    pub fn archived(&self) -> Vec<String> {
        self.lock().archived.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryDocuments> {
        // A poisoned lock only means another test thread panicked.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<F>(&self, f: F) -> NoteResult<()>
    where
        F: FnOnce(&mut MemoryDocuments),
    {
        let mut docs = self.lock();
        if docs.fail_writes {
            return Err(NoteError::persistence("Simulated write failure"));
        }
        f(&mut docs);
        Ok(())
    }
}

impl Persistence for MemoryStore {
    fn load_config(&self) -> NoteResult<Config> {
        Ok(self.lock().config.clone().unwrap_or_default())
    }

    fn save_config(&self, config: &Config) -> NoteResult<()> {
        self.write(|docs| docs.config = Some(config.clone()))
    }

    fn load_collections(&self) -> NoteResult<CollectionsDocument> {
        Ok(self.lock().collections.clone().unwrap_or_default())
    }

    fn save_collections(&self, document: &CollectionsDocument) -> NoteResult<()> {
        self.write(|docs| docs.collections = Some(document.clone()))
    }

    fn load_notes(&self, collection: &str) -> NoteResult<Vec<Note>> {
        Ok(self.lock().notes.get(collection).cloned().unwrap_or_default())
    }

    fn save_notes(&self, collection: &str, notes: &[Note]) -> NoteResult<()> {
        self.write(|docs| {
            docs.notes.insert(collection.to_string(), notes.to_vec());
        })
    }

    fn archive_notes(&self, collection: &str) -> NoteResult<()> {
        self.write(|docs| {
            docs.notes.remove(collection);
            docs.archived.push(collection.to_string());
        })
    }

    fn rename_notes(&self, from: &str, to: &str) -> NoteResult<()> {
        self.write(|docs| {
            let notes = docs.notes.remove(from).unwrap_or_default();
            docs.notes.insert(to.to_string(), notes);
        })
    }

    fn load_themes(&self) -> NoteResult<BTreeMap<String, ThemeRecord>> {
        Ok(self.lock().themes.clone())
    }

    fn save_themes(&self, themes: &BTreeMap<String, ThemeRecord>) -> NoteResult<()> {
        self.write(|docs| docs.themes = themes.clone())
    }

    fn load_font_cache(&self) -> NoteResult<Option<FontCache>> {
        Ok(self.lock().font_cache.clone())
    }

    fn save_font_cache(&self, cache: &FontCache) -> NoteResult<()> {
        self.write(|docs| docs.font_cache = Some(cache.clone()))
    }
}

/// A shared store, so the caller can keep a handle to what the app writes.
impl<P: Persistence + Sync + ?Sized> Persistence for Arc<P> {
    fn load_config(&self) -> NoteResult<Config> {
        (**self).load_config()
    }

    fn save_config(&self, config: &Config) -> NoteResult<()> {
        (**self).save_config(config)
    }

    fn load_collections(&self) -> NoteResult<CollectionsDocument> {
        (**self).load_collections()
    }

    fn save_collections(&self, document: &CollectionsDocument) -> NoteResult<()> {
        (**self).save_collections(document)
    }

    fn load_notes(&self, collection: &str) -> NoteResult<Vec<Note>> {
        (**self).load_notes(collection)
    }

    fn save_notes(&self, collection: &str, notes: &[Note]) -> NoteResult<()> {
        (**self).save_notes(collection, notes)
    }

    fn archive_notes(&self, collection: &str) -> NoteResult<()> {
        (**self).archive_notes(collection)
    }

    fn rename_notes(&self, from: &str, to: &str) -> NoteResult<()> {
        (**self).rename_notes(from, to)
    }

    fn load_themes(&self) -> NoteResult<BTreeMap<String, ThemeRecord>> {
        (**self).load_themes()
    }

    fn save_themes(&self, themes: &BTreeMap<String, ThemeRecord>) -> NoteResult<()> {
        (**self).save_themes(themes)
    }

    fn load_font_cache(&self) -> NoteResult<Option<FontCache>> {
        (**self).load_font_cache()
    }

    fn save_font_cache(&self, cache: &FontCache) -> NoteResult<()> {
        (**self).save_font_cache(cache)
    }
}
