use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an editor buffer that has not been persisted yet.
pub const NEW_NOTE_ID: i64 = -1;

/// A single note inside a collection.
///
/// The title is always derived from the content (see `notes::derive_title`)
/// and is stored only so the notes document stays readable on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A grid card as presented to the rendering layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NoteCard {
    pub id: i64,
    pub title: String,
    pub preview: String,
    pub modified: DateTime<Utc>,
}

/// Per-collection layout overrides.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionSettings {
    pub card_width: u32,
    pub card_height: u32,
    pub preferred_columns: u32,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            card_width: DEFAULT_CARD_WIDTH,
            card_height: DEFAULT_CARD_HEIGHT,
            preferred_columns: 1,
        }
    }
}

/// Persisted collections metadata (`collections.json`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionsDocument {
    pub collections: Vec<String>,
    pub current_collection: String,
    pub collection_settings: BTreeMap<String, CollectionSettings>,
}

/// Summary row for the collection management dialog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub note_count: usize,
    pub is_current: bool,
}

/// The eight colors of a theme.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub background: String,
    pub surface: String,
    pub primary: String,
    pub primary_text: String,
    pub secondary_text: String,
    pub success: String,
    pub warning: String,
    pub error: String,
}

impl Palette {
    /// Returns each color with its field name, in declaration order.
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            ("background", &self.background),
            ("surface", &self.surface),
            ("primary", &self.primary),
            ("primaryText", &self.primary_text),
            ("secondaryText", &self.secondary_text),
            ("success", &self.success),
            ("warning", &self.warning),
            ("error", &self.error),
        ]
    }
}

/// A theme as stored in `themes.json`, keyed by its slug.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ThemeRecord {
    pub name: String,
    #[serde(flatten)]
    pub palette: Palette,
}

/// Entry of the theme picker list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSummary {
    pub key: String,
    pub display_name: String,
    pub builtin: bool,
}

/// Cached result of the installed font enumeration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FontCache {
    pub timestamp: DateTime<Utc>,
    pub fonts: Vec<String>,
}

pub const DEFAULT_CARD_WIDTH: u32 = 480;
pub const DEFAULT_CARD_HEIGHT: u32 = 400;

/// Application configuration (`config.json`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub font_family: String,
    pub font_size: u32,
    pub card_font_size: u32,
    pub card_title_font_size: u32,
    pub header_font_size: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub max_unsaved_changes: u32,
    pub auto_save_interval: u64,
    pub auto_save_enabled: bool,
    pub search_debounce_interval: u64,
    pub current_theme: String,
    pub shortcuts: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_family: "Victor Mono".to_string(),
            font_size: 34,
            card_font_size: 29,
            card_title_font_size: 22,
            header_font_size: 26,
            card_width: DEFAULT_CARD_WIDTH,
            card_height: DEFAULT_CARD_HEIGHT,
            window_width: 613,
            window_height: 1369,
            max_unsaved_changes: 50,
            auto_save_interval: 1000,
            auto_save_enabled: true,
            search_debounce_interval: 300,
            current_theme: "githubDark".to_string(),
            shortcuts: default_shortcuts(),
        }
    }
}

/// The default shortcut table. Names map to one or more key combinations.
pub fn default_shortcuts() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("newNote", &["Ctrl+N"]),
        ("save", &["Ctrl+S"]),
        ("back", &["Escape"]),
        ("delete", &["Delete"]),
        ("confirmDelete", &["Y", "Return"]),
        ("cancelDelete", &["N"]),
        ("quickDelete", &["Ctrl+D"]),
        ("search", &["Ctrl+F"]),
        ("nextNote", &["Down", "J"]),
        ("prevNote", &["Up", "K"]),
        ("nextNoteHorizontal", &["Right", "L"]),
        ("prevNoteHorizontal", &["Left", "H"]),
        ("openNote", &["Return", "Space"]),
        ("firstNote", &["Home"]),
        ("lastNote", &["End"]),
        ("quit", &["Ctrl+Q"]),
        ("help", &["F1"]),
        ("toggleFullscreen", &["Ctrl+W"]),
        ("optimizeCardWidth", &["Ctrl+1"]),
        ("increaseCardTitleFontSize", &["Ctrl+]"]),
        ("decreaseCardTitleFontSize", &["Ctrl+["]),
        ("increaseFontSize", &["Ctrl+="]),
        ("decreaseFontSize", &["Ctrl+-"]),
        ("increaseCardFontSize", &["Ctrl+9"]),
        ("decreaseCardFontSize", &["Ctrl+0"]),
        ("increaseCardHeight", &["Ctrl+Shift+Down"]),
        ("decreaseCardHeight", &["Ctrl+Shift+Up"]),
        ("themeCycle", &["Ctrl+T"]),
        ("themeCycleBackward", &["Ctrl+Shift+T"]),
        ("fontCycle", &["Ctrl+Alt+F"]),
        ("fontCycleBackward", &["Ctrl+Alt+Shift+F"]),
        ("fontSelection", &["Ctrl+Shift+F"]),
        ("newCollection", &["Ctrl+Shift+N"]),
        ("nextCollection", &["Ctrl+Tab"]),
        ("prevCollection", &["Ctrl+Shift+Tab"]),
        ("deleteCollection", &["Ctrl+Shift+D"]),
        ("renameCollection", &["F2"]),
        ("showStats", &["Ctrl+Space"]),
        ("increaseColumns", &["Ctrl+Up"]),
        ("decreaseColumns", &["Ctrl+Down"]),
        ("toggleAutoSave", &["Ctrl+Alt+S"]),
    ];

    table
        .iter()
        .map(|(name, keys)| {
            (
                name.to_string(),
                keys.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}

/// Numeric layout values the rendering layer reads.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    pub card_width: u32,
    pub card_height: u32,
    pub font_size: u32,
    pub card_font_size: u32,
    pub card_title_font_size: u32,
    pub header_font_size: u32,
    pub columns: usize,
}
