use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{merge_config_with_defaults, validate_config};
use crate::error::{NoteError, NoteResult};
use crate::models::{CollectionsDocument, Config, FontCache, Note, ThemeRecord};
use crate::storage::Persistence;

/// Longest collection file stem
const MAX_FILE_STEM_CHARS: usize = 50;
/// Characters that may not appear in a collection file name
const FORBIDDEN_FILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turns a collection name into a safe file stem.
///
/// Forbidden characters become `_`, path traversal dots are neutralised and
/// the result is trimmed and cut to 50 characters. A name with nothing left
/// maps to "Unnamed".
///
/// # Arguments
/// * `name` - The collection name as shown to the user
///
/// # Returns
/// A file stem that stays inside the collections directory
pub fn sanitize_collection_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_FILE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let replaced = replaced.replace("..", "__");
    let truncated: String = replaced.trim().chars().take(MAX_FILE_STEM_CHARS).collect();
    let truncated = truncated.trim();
    if truncated.is_empty() || truncated.chars().all(|c| c == '.') {
        "Unnamed".to_string()
    } else {
        truncated.to_string()
    }
}

/// FileSystem stores every document as JSON under one data directory.
///
/// The structure is:
/// - `{data_dir}/config.json` - User configuration
/// - `{data_dir}/collections.json` - Collection names and layout
/// - `{data_dir}/collections/` - One notes file per collection
/// - `{data_dir}/themes.json` - User themes
/// - `{data_dir}/font_cache.json` - Cached font enumeration
#[derive(Debug, Clone)]
pub struct FileSystem {
    /// Base data directory for the application
    pub base_dir: PathBuf,
    /// Directory holding the per-collection notes files
    pub collections_dir: PathBuf,
    /// Path to the configuration file (config.json)
    pub config_file: PathBuf,
    /// Path to the collections metadata file (collections.json)
    pub collections_file: PathBuf,
    /// Path to the themes file (themes.json)
    pub themes_file: PathBuf,
    /// Path to the font cache (font_cache.json)
    pub font_cache_file: PathBuf,
}

impl FileSystem {
    /// Creates a new FileSystem instance using the platform-appropriate data directory.
    ///
    /// On Linux: ~/.local/share/notegrid/
    /// On macOS: ~/Library/Application Support/notegrid/
    /// On Windows: C:\Users\{user}\AppData\Roaming\notegrid\
    ///
    /// # Returns
    /// * `Ok(FileSystem)` - A new FileSystem instance
    /// * `Err(NoteError)` - If the data directory cannot be determined
    pub fn new() -> NoteResult<Self> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| NoteError::persistence("Could not determine data directory"))?
            .join("notegrid");

        Ok(Self::new_with_base(&base_dir))
    }

    /// Creates a new FileSystem instance with a custom base directory.
    /// Useful for testing.
    pub fn new_with_base(base_dir: &Path) -> Self {
        let base_dir = base_dir.to_path_buf();
        Self {
            collections_dir: base_dir.join("collections"),
            config_file: base_dir.join("config.json"),
            collections_file: base_dir.join("collections.json"),
            themes_file: base_dir.join("themes.json"),
            font_cache_file: base_dir.join("font_cache.json"),
            base_dir,
        }
    }

    /// Ensures the base and collections directories exist.
    ///
    /// # Returns
    /// * `Ok(())` - If all directories exist or were created successfully
    /// * `Err(NoteError)` - If directory creation fails
    pub fn ensure_directories(&self) -> NoteResult<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| {
            NoteError::persistence(format!("Failed to create base directory: {}", e))
        })?;
        fs::create_dir_all(&self.collections_dir).map_err(|e| {
            NoteError::persistence(format!("Failed to create collections directory: {}", e))
        })?;
        Ok(())
    }

    /// Returns the notes file of a collection.
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.collections_dir
            .join(format!("{}.json", sanitize_collection_name(collection)))
    }
}

/// Reads a JSON document.
///
/// A missing file yields `Ok(None)`. A file that exists but does not parse
/// is moved aside to `<file>.backup_<timestamp>` and also yields `Ok(None)`,
/// so the caller starts over from defaults without losing the old bytes.
fn read_json<T: DeserializeOwned>(path: &Path) -> NoteResult<Option<T>> {
    let Some(content) = read_text(path)? else {
        return Ok(None);
    };
    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("Corrupt document {}: {}", path.display(), e);
            back_up_corrupt(path);
            Ok(None)
        }
    }
}

fn read_text(path: &Path) -> NoteResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path).map(Some).map_err(|e| {
        NoteError::persistence(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn back_up_corrupt(path: &Path) {
    let backup = suffixed(path, &format!("backup_{}", Utc::now().timestamp()));
    match fs::rename(path, &backup) {
        Ok(()) => log::info!("Moved corrupt file to {}", backup.display()),
        Err(e) => log::error!("Failed to back up {}: {}", path.display(), e),
    }
}

/// `<path>.<suffix>`, keeping the original extension in place.
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes a JSON document through a temp file and a rename.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> NoteResult<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| {
        NoteError::persistence(format!("Failed to serialize {}: {}", path.display(), e))
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            NoteError::persistence(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let temp = suffixed(path, "tmp");
    fs::write(&temp, content).map_err(|e| {
        NoteError::persistence(format!("Failed to write {}: {}", temp.display(), e))
    })?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        NoteError::persistence(format!("Failed to replace {}: {}", path.display(), e))
    })
}

impl Persistence for FileSystem {
    fn load_config(&self) -> NoteResult<Config> {
        let Some(content) = read_text(&self.config_file)? else {
            return Ok(Config::default());
        };
        match merge_config_with_defaults(&content) {
            Ok(config) => Ok(validate_config(config)),
            Err(e) => {
                log::warn!("{}", e);
                back_up_corrupt(&self.config_file);
                Ok(Config::default())
            }
        }
    }

    fn save_config(&self, config: &Config) -> NoteResult<()> {
        write_json(&self.config_file, config)
    }

    fn load_collections(&self) -> NoteResult<CollectionsDocument> {
        Ok(read_json(&self.collections_file)?.unwrap_or_default())
    }

    fn save_collections(&self, document: &CollectionsDocument) -> NoteResult<()> {
        write_json(&self.collections_file, document)
    }

    fn load_notes(&self, collection: &str) -> NoteResult<Vec<Note>> {
        Ok(read_json(&self.collection_path(collection))?.unwrap_or_default())
    }

    fn save_notes(&self, collection: &str, notes: &[Note]) -> NoteResult<()> {
        write_json(&self.collection_path(collection), notes)
    }

    fn archive_notes(&self, collection: &str) -> NoteResult<()> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(());
        }
        let archived = suffixed(&path, &format!("deleted_{}", Utc::now().timestamp()));
        fs::rename(&path, &archived).map_err(|e| {
            NoteError::persistence(format!("Failed to archive {}: {}", path.display(), e))
        })?;
        log::info!("Archived collection '{}' to {}", collection, archived.display());
        Ok(())
    }

    fn rename_notes(&self, from: &str, to: &str) -> NoteResult<()> {
        let old_path = self.collection_path(from);
        let new_path = self.collection_path(to);
        if old_path == new_path || !old_path.exists() {
            return Ok(());
        }
        if new_path.exists() {
            return Err(NoteError::persistence(format!(
                "Notes file {} already exists",
                new_path.display()
            )));
        }
        fs::rename(&old_path, &new_path).map_err(|e| {
            NoteError::persistence(format!("Failed to rename {}: {}", old_path.display(), e))
        })
    }

    fn load_themes(&self) -> NoteResult<BTreeMap<String, ThemeRecord>> {
        Ok(read_json(&self.themes_file)?.unwrap_or_default())
    }

    fn save_themes(&self, themes: &BTreeMap<String, ThemeRecord>) -> NoteResult<()> {
        write_json(&self.themes_file, themes)
    }

    fn load_font_cache(&self) -> NoteResult<Option<FontCache>> {
        read_json(&self.font_cache_file)
    }

    fn save_font_cache(&self, cache: &FontCache) -> NoteResult<()> {
        write_json(&self.font_cache_file, cache)
    }
}
