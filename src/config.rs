use serde_json::{Map, Value};

use crate::collections::CollectionIndex;
use crate::error::{NoteError, NoteResult};
use crate::models::{CollectionSettings, CollectionsDocument, Config, LayoutSettings};
use crate::storage::Persistence;
use crate::window;

/// Bounds applied to font sizes read from disk
const LOADED_FONT_SIZE: (u32, u32) = (8, 72);
/// Bounds applied to the card width read from disk
const LOADED_CARD_WIDTH: (u32, u32) = (150, 500);
/// Bounds applied to the card height read from disk
const LOADED_CARD_HEIGHT: (u32, u32) = (120, 400);
const MIN_MAX_UNSAVED_CHANGES: u32 = 50;
const MIN_INTERVAL_MS: u64 = 100;
const MIN_WINDOW_DIMENSION: u32 = 100;

/// Font size a keyboard step applies to, with its allowed range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontTarget {
    Editor,
    Card,
    CardTitle,
}

impl FontTarget {
    fn bounds(self) -> (u32, u32) {
        match self {
            FontTarget::Editor | FontTarget::Card => (1, 100),
            FontTarget::CardTitle => (1, 32),
        }
    }
}

/// ConfigStore owns the user preferences and the collection metadata.
///
/// Every setter returns whether anything changed, and marks the matching
/// document dirty. Writing happens in `save`, which the owner calls from a
/// debounce timer or when flushing at shutdown.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Config,
    collections: CollectionIndex,
    config_dirty: bool,
    collections_dirty: bool,
}

impl ConfigStore {
    /// Creates a store from already loaded documents.
    pub fn new(config: Config, collections: CollectionsDocument) -> Self {
        let defaults = collection_defaults(&config);
        Self {
            collections: CollectionIndex::from_document(collections, &defaults),
            config,
            config_dirty: false,
            collections_dirty: false,
        }
    }

    /// Loads both documents, falling back to defaults when a read fails.
    ///
    /// # Arguments
    /// * `store` - The persistence backend
    pub fn load(store: &dyn Persistence) -> Self {
        let config = store.load_config().unwrap_or_else(|e| {
            log::error!("Failed to load config, using defaults: {}", e);
            Config::default()
        });
        let collections = store.load_collections().unwrap_or_else(|e| {
            log::error!("Failed to load collections, starting empty: {}", e);
            CollectionsDocument::default()
        });
        Self::new(config, collections)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn collections(&self) -> &CollectionIndex {
        &self.collections
    }

    /// Mutable access to the collection index. Marks it dirty.
    pub fn collections_mut(&mut self) -> &mut CollectionIndex {
        self.collections_dirty = true;
        &mut self.collections
    }

    /// Layout settings a brand new collection starts with.
    pub fn default_collection_settings(&self) -> CollectionSettings {
        collection_defaults(&self.config)
    }

    pub fn is_dirty(&self) -> bool {
        self.config_dirty || self.collections_dirty
    }

    /// Steps one of the font sizes by one point.
    ///
    /// # Returns
    /// `true` if the size changed, `false` at the bound
    pub fn step_font_size(&mut self, target: FontTarget, increase: bool) -> bool {
        let (min, max) = target.bounds();
        let slot = match target {
            FontTarget::Editor => &mut self.config.font_size,
            FontTarget::Card => &mut self.config.card_font_size,
            FontTarget::CardTitle => &mut self.config.card_title_font_size,
        };
        let next = if increase {
            slot.saturating_add(1)
        } else {
            slot.saturating_sub(1)
        };
        if next < min || next > max || next == *slot {
            return false;
        }
        *slot = next;
        self.config_dirty = true;
        true
    }

    /// Records a new window size.
    ///
    /// Sizes below the persistable minimum (transient states while the
    /// window is being created or minimised) are ignored.
    pub fn set_window_size(&mut self, width: u32, height: u32) -> bool {
        if !window::is_persistable_window_size(width, height) {
            return false;
        }
        if self.config.window_width == width && self.config.window_height == height {
            return false;
        }
        self.config.window_width = width;
        self.config.window_height = height;
        self.config_dirty = true;
        true
    }

    pub fn set_auto_save_enabled(&mut self, enabled: bool) -> bool {
        if self.config.auto_save_enabled == enabled {
            return false;
        }
        self.config.auto_save_enabled = enabled;
        self.config_dirty = true;
        true
    }

    pub fn set_theme_key(&mut self, key: &str) -> bool {
        if self.config.current_theme == key {
            return false;
        }
        self.config.current_theme = key.to_string();
        self.config_dirty = true;
        true
    }

    /// Sets the editor font family.
    ///
    /// # Returns
    /// * `Ok(bool)` - Whether the family changed
    /// * `Err(NoteError)` - If the name is blank
    pub fn set_font_family(&mut self, family: &str) -> NoteResult<bool> {
        let family = family.trim();
        if family.is_empty() {
            return Err(NoteError::validation("Font family cannot be empty"));
        }
        if self.config.font_family == family {
            return Ok(false);
        }
        self.config.font_family = family.to_string();
        self.config_dirty = true;
        Ok(true)
    }

    /// Card width in effect: the current collection's override, else the global one.
    pub fn card_width(&self) -> u32 {
        self.collections
            .current_settings()
            .map(|s| s.card_width)
            .unwrap_or(self.config.card_width)
    }

    pub fn card_height(&self) -> u32 {
        self.collections
            .current_settings()
            .map(|s| s.card_height)
            .unwrap_or(self.config.card_height)
    }

    /// Sets the card width globally and for the current collection.
    pub fn set_card_width(&mut self, width: u32) -> bool {
        let width = width.max(1);
        if self.card_width() == width && self.config.card_width == width {
            return false;
        }
        self.config.card_width = width;
        self.config_dirty = true;
        let defaults = self.default_collection_settings();
        if let Some(settings) = self.collections.current_settings_mut(&defaults) {
            settings.card_width = width;
            self.collections_dirty = true;
        }
        true
    }

    /// Sets the card height globally and for the current collection.
    pub fn set_card_height(&mut self, height: u32) -> bool {
        let height = height.clamp(window::MIN_CARD_HEIGHT, window::MAX_CARD_HEIGHT);
        if self.card_height() == height && self.config.card_height == height {
            return false;
        }
        self.config.card_height = height;
        self.config_dirty = true;
        let defaults = self.default_collection_settings();
        if let Some(settings) = self.collections.current_settings_mut(&defaults) {
            settings.card_height = height;
            self.collections_dirty = true;
        }
        true
    }

    pub fn set_preferred_columns(&mut self, columns: u32) {
        let defaults = self.default_collection_settings();
        if let Some(settings) = self.collections.current_settings_mut(&defaults) {
            if settings.preferred_columns != columns {
                settings.preferred_columns = columns;
                self.collections_dirty = true;
            }
        }
    }

    /// Copies the current collection's card size into the global layout.
    ///
    /// Called after switching collections so the grid opens with the
    /// dimensions it was left with.
    pub fn apply_collection_layout(&mut self) -> bool {
        let Some(settings) = self.collections.current_settings().cloned() else {
            return false;
        };
        if self.config.card_width == settings.card_width
            && self.config.card_height == settings.card_height
        {
            return false;
        }
        self.config.card_width = settings.card_width;
        self.config.card_height = settings.card_height;
        self.config_dirty = true;
        true
    }

    /// Numeric layout values for the rendering layer.
    pub fn layout(&self, columns: usize) -> LayoutSettings {
        LayoutSettings {
            card_width: self.card_width(),
            card_height: self.card_height(),
            font_size: self.config.font_size,
            card_font_size: self.config.card_font_size,
            card_title_font_size: self.config.card_title_font_size,
            header_font_size: self.config.header_font_size,
            columns,
        }
    }

    /// Writes every dirty document.
    ///
    /// A document stays dirty when its write fails, so the next call
    /// retries it.
    ///
    /// # Returns
    /// * `Ok(())` - If nothing was dirty or every write succeeded
    /// * `Err(NoteError)` - The first write failure
    pub fn save(&mut self, store: &dyn Persistence) -> NoteResult<()> {
        let mut first_error = None;

        if self.config_dirty {
            match store.save_config(&self.config) {
                Ok(()) => self.config_dirty = false,
                Err(e) => {
                    log::error!("Failed to save config: {}", e);
                    first_error = Some(e);
                }
            }
        }

        if self.collections_dirty {
            match store.save_collections(self.collections.document()) {
                Ok(()) => self.collections_dirty = false,
                Err(e) => {
                    log::error!("Failed to save collections: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn collection_defaults(config: &Config) -> CollectionSettings {
    CollectionSettings {
        card_width: config.card_width,
        card_height: config.card_height,
        preferred_columns: 1,
    }
}

/// Merges a partial config JSON with defaults.
///
/// Each field is read on its own: a missing or mistyped field keeps its
/// default. Numbers may also be given as numeric strings. Shortcut entries
/// accept either a single combination or a list, and override the default
/// binding of the same name.
///
/// # Arguments
/// * `partial_json` - JSON string with partial configuration
///
/// # Returns
/// * `Ok(Config)` - The merged configuration (not yet clamped)
/// * `Err(NoteError)` - If the text is not valid JSON
pub fn merge_config_with_defaults(partial_json: &str) -> NoteResult<Config> {
    if partial_json.trim().is_empty() {
        return Ok(Config::default());
    }

    let json_value: Value = serde_json::from_str(partial_json)
        .map_err(|e| NoteError::persistence(format!("Failed to parse config: {}", e)))?;

    let mut config = Config::default();

    if let Some(obj) = json_value.as_object() {
        if let Some(v) = read_string(obj, "fontFamily") {
            config.font_family = v;
        }
        if let Some(v) = read_u32(obj, "fontSize") {
            config.font_size = v;
        }
        if let Some(v) = read_u32(obj, "cardFontSize") {
            config.card_font_size = v;
        }
        if let Some(v) = read_u32(obj, "cardTitleFontSize") {
            config.card_title_font_size = v;
        }
        if let Some(v) = read_u32(obj, "headerFontSize") {
            config.header_font_size = v;
        }
        if let Some(v) = read_u32(obj, "cardWidth") {
            config.card_width = v;
        }
        if let Some(v) = read_u32(obj, "cardHeight") {
            config.card_height = v;
        }
        if let Some(v) = read_u32(obj, "windowWidth") {
            config.window_width = v;
        }
        if let Some(v) = read_u32(obj, "windowHeight") {
            config.window_height = v;
        }
        if let Some(v) = read_u32(obj, "maxUnsavedChanges") {
            config.max_unsaved_changes = v;
        }
        if let Some(v) = read_u64(obj, "autoSaveInterval") {
            config.auto_save_interval = v;
        }
        if let Some(v) = read_bool(obj, "autoSaveEnabled") {
            config.auto_save_enabled = v;
        }
        if let Some(v) = read_u64(obj, "searchDebounceInterval") {
            config.search_debounce_interval = v;
        }
        if let Some(v) = read_string(obj, "currentTheme") {
            config.current_theme = v;
        }
        if let Some(shortcuts) = obj.get("shortcuts").and_then(|v| v.as_object()) {
            for (name, value) in shortcuts {
                let keys: Vec<String> = match value {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(items) => items
                        .iter()
                        .filter_map(|item| item.as_str().map(|s| s.to_string()))
                        .collect(),
                    _ => Vec::new(),
                };
                let keys: Vec<String> = keys
                    .into_iter()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
                if !keys.is_empty() {
                    config.shortcuts.insert(name.clone(), keys);
                }
            }
        }
    }

    Ok(config)
}

/// Clamps loaded values into their supported ranges.
pub fn validate_config(mut config: Config) -> Config {
    let (font_min, font_max) = LOADED_FONT_SIZE;
    config.font_size = config.font_size.clamp(font_min, font_max);
    config.card_font_size = config.card_font_size.clamp(font_min, font_max);
    config.card_title_font_size = config.card_title_font_size.clamp(font_min, font_max);
    config.header_font_size = config.header_font_size.clamp(font_min, font_max);

    config.card_width = config
        .card_width
        .clamp(LOADED_CARD_WIDTH.0, LOADED_CARD_WIDTH.1);
    config.card_height = config
        .card_height
        .clamp(LOADED_CARD_HEIGHT.0, LOADED_CARD_HEIGHT.1);

    config.max_unsaved_changes = config.max_unsaved_changes.max(MIN_MAX_UNSAVED_CHANGES);
    config.auto_save_interval = config.auto_save_interval.max(MIN_INTERVAL_MS);
    config.search_debounce_interval = config.search_debounce_interval.max(MIN_INTERVAL_MS);
    config.window_width = config.window_width.max(MIN_WINDOW_DIMENSION);
    config.window_height = config.window_height.max(MIN_WINDOW_DIMENSION);

    if config.font_family.trim().is_empty() {
        config.font_family = Config::default().font_family;
    }
    if config.current_theme.trim().is_empty() {
        config.current_theme = Config::default().current_theme;
    }
    config
}

fn read_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_u64(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    read_u64(obj, key).map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

fn read_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
