use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{NoteError, NoteResult};
use crate::models::{Palette, ThemeRecord, ThemeSummary};
use crate::storage::Persistence;

/// Key used when nothing else resolves
pub const DEFAULT_THEME: &str = "githubDark";

/// Built-in palettes: key, display name, then background, surface, primary,
/// primary text, secondary text, success, warning and error.
const BUILTIN_THEMES: &[(&str, &str, [&str; 8])] = &[
    ("nightOwl", "Night Owl", ["#011627", "#1d3b53", "#c792ea", "#d6deeb", "#7fdbca", "#addb67", "#ffcb6b", "#ef5350"]),
    ("dracula", "Dracula", ["#282a36", "#44475a", "#bd93f9", "#f8f8f2", "#6272a4", "#50fa7b", "#f1fa8c", "#ff5555"]),
    ("monokai", "Monokai", ["#272822", "#3e3d32", "#f92672", "#f8f8f2", "#75715e", "#a6e22e", "#e6db74", "#f92672"]),
    ("githubDark", "GitHub Dark", ["#0d1117", "#21262d", "#58a6ff", "#f0f6fc", "#7d8590", "#238636", "#d29922", "#f85149"]),
    ("catppuccin", "Catppuccin", ["#1e1e2e", "#313244", "#cba6f7", "#cdd6f4", "#f9e2af", "#a6e3a1", "#fab387", "#f38ba8"]),
    ("tokyoNight", "Tokyo Night", ["#1a1b26", "#24283b", "#7aa2f7", "#c0caf5", "#9ece6a", "#9ece6a", "#e0af68", "#f7768e"]),
    ("nordDark", "Nord Dark", ["#2e3440", "#3b4252", "#88c0d0", "#eceff4", "#d08770", "#a3be8c", "#ebcb8b", "#bf616a"]),
    ("gruvboxDark", "Gruvbox Dark", ["#282828", "#3c3836", "#83a598", "#ebdbb2", "#fe8019", "#b8bb26", "#fabd2f", "#fb4934"]),
    ("oneDark", "One Dark", ["#1e2127", "#2c323c", "#61afef", "#abb2bf", "#e06c75", "#98c379", "#e5c07b", "#e06c75"]),
    ("materialDark", "Material Dark", ["#121212", "#1e1e1e", "#bb86fc", "#ffffff", "#03dac6", "#4caf50", "#ff9800", "#f44336"]),
    ("ayuDark", "Ayu Dark", ["#0a0e14", "#1f2430", "#ffb454", "#b3b1ad", "#e6b450", "#c2d94c", "#ffb454", "#f07178"]),
    ("forest", "Forest", ["#1a2319", "#2d3b2c", "#7ec699", "#e8f2e8", "#a8c9a8", "#90d4a0", "#d4b85a", "#d97a7a"]),
    ("solarizedLight", "Solarized Light", ["#fdf6e3", "#eee8d5", "#268bd2", "#586e75", "#93a1a1", "#859900", "#b58900", "#dc322f"]),
];

fn palette_from(colors: &[&str; 8]) -> Palette {
    Palette {
        background: colors[0].to_string(),
        surface: colors[1].to_string(),
        primary: colors[2].to_string(),
        primary_text: colors[3].to_string(),
        secondary_text: colors[4].to_string(),
        success: colors[5].to_string(),
        warning: colors[6].to_string(),
        error: colors[7].to_string(),
    }
}

/// Whether `key` names a built-in theme.
pub fn is_builtin(key: &str) -> bool {
    BUILTIN_THEMES.iter().any(|(k, _, _)| *k == key)
}

/// Builds a theme key from a display name: lowercase ASCII alphanumerics only.
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        "theme".to_string()
    } else {
        slug
    }
}

/// Accepts `#RGB`, `#RRGGBB` and `#RRGGBBAA`.
pub fn is_valid_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Checks every color of a palette, reporting the first bad field.
pub fn validate_palette(palette: &Palette) -> NoteResult<()> {
    for (field, value) in palette.fields() {
        if !is_valid_hex_color(value) {
            return Err(NoteError::validation(format!(
                "Invalid color for {}: '{}'",
                field, value
            )));
        }
    }
    Ok(())
}

fn validate_name(name: &str) -> NoteResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NoteError::validation("Theme name cannot be empty"));
    }
    Ok(name.to_string())
}

/// ThemeStore maps theme keys to palettes and tracks the active theme.
///
/// Built-in themes come from code and cannot be edited, renamed or deleted.
/// User themes live in `user` and are the only ones written to disk.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    builtins: Vec<(String, ThemeRecord)>,
    user: BTreeMap<String, ThemeRecord>,
    active: String,
    dirty: bool,
}

impl ThemeStore {
    /// Creates a store from stored user themes.
    ///
    /// Stored entries that reuse a built-in key or carry malformed colors
    /// are skipped. An unknown active key falls back to the default theme.
    pub fn new(stored: BTreeMap<String, ThemeRecord>, active: &str) -> Self {
        let builtins = BUILTIN_THEMES
            .iter()
            .map(|(key, name, colors)| {
                (
                    key.to_string(),
                    ThemeRecord {
                        name: name.to_string(),
                        palette: palette_from(colors),
                    },
                )
            })
            .collect();

        let user = stored
            .into_iter()
            .filter(|(key, record)| {
                if is_builtin(key) {
                    log::debug!("Ignoring stored copy of built-in theme '{}'", key);
                    return false;
                }
                if let Err(e) = validate_palette(&record.palette) {
                    log::warn!("Skipping theme '{}': {}", key, e);
                    return false;
                }
                !key.trim().is_empty()
            })
            .collect();

        let mut store = Self {
            builtins,
            user,
            active: String::new(),
            dirty: false,
        };
        store.active = if store.contains(active) {
            active.to_string()
        } else {
            DEFAULT_THEME.to_string()
        };
        store
    }

    /// Loads user themes from the backend, starting empty on failure.
    pub fn load(store: &dyn Persistence, active: &str) -> Self {
        let stored = store.load_themes().unwrap_or_else(|e| {
            log::error!("Failed to load themes: {}", e);
            BTreeMap::new()
        });
        Self::new(stored, active)
    }

    pub fn contains(&self, key: &str) -> bool {
        is_builtin(key) || self.user.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ThemeRecord> {
        self.builtins
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
            .or_else(|| self.user.get(key))
    }

    /// Every theme in display order: built-ins as declared, then user themes by key.
    pub fn list_all(&self) -> Vec<ThemeSummary> {
        self.builtins
            .iter()
            .map(|(key, record)| ThemeSummary {
                key: key.clone(),
                display_name: record.name.clone(),
                builtin: true,
            })
            .chain(self.user.iter().map(|(key, record)| ThemeSummary {
                key: key.clone(),
                display_name: record.name.clone(),
                builtin: false,
            }))
            .collect()
    }

    fn keys(&self) -> Vec<&str> {
        self.builtins
            .iter()
            .map(|(k, _)| k.as_str())
            .chain(self.user.keys().map(|k| k.as_str()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.builtins.len() + self.user.len()
    }

    pub fn active_key(&self) -> &str {
        &self.active
    }

    /// Palette of the active theme.
    pub fn active_palette(&self) -> Palette {
        self.get(&self.active)
            .or_else(|| self.get(DEFAULT_THEME))
            .map(|record| record.palette.clone())
            .unwrap_or_else(|| palette_from(&BUILTIN_THEMES[0].2))
    }

    /// Makes `key` the active theme.
    ///
    /// # Returns
    /// * `Ok(true)` - If the active theme changed
    /// * `Ok(false)` - If it was already active
    /// * `Err(NoteError)` - If the key is unknown
    pub fn set_active(&mut self, key: &str) -> NoteResult<bool> {
        if !self.contains(key) {
            return Err(NoteError::NotFound(format!("theme '{}'", key)));
        }
        if self.active == key {
            return Ok(false);
        }
        self.active = key.to_string();
        Ok(true)
    }

    /// Key of the theme after (or before) the active one, wrapping.
    pub fn neighbour(&self, forward: bool) -> String {
        let keys = self.keys();
        let count = keys.len();
        let next = match keys.iter().position(|k| *k == self.active) {
            Some(i) if forward => (i + 1) % count,
            Some(i) => (i + count - 1) % count,
            None if forward => 0,
            None => count - 1,
        };
        keys[next].to_string()
    }

    /// Creates a user theme.
    ///
    /// Without an explicit key, one is derived from the name; a derived key
    /// that is already taken gets a timestamp suffix.
    ///
    /// # Arguments
    /// * `key` - Optional explicit key, which must be unused
    /// * `name` - Display name
    /// * `palette` - The eight colors, all validated before anything is stored
    ///
    /// # Returns
    /// * `Ok(String)` - The key of the new theme
    /// * `Err(NoteError)` - On a blank name, bad color or taken explicit key
    pub fn create(&mut self, key: Option<&str>, name: &str, palette: Palette) -> NoteResult<String> {
        let name = validate_name(name)?;
        validate_palette(&palette)?;

        let key = match key.map(str::trim) {
            Some(explicit) if !explicit.is_empty() => {
                if self.contains(explicit) {
                    return Err(NoteError::validation(format!(
                        "A theme with key '{}' already exists",
                        explicit
                    )));
                }
                explicit.to_string()
            }
            _ => self.unique_key(&slugify(&name)),
        };

        self.user.insert(key.clone(), ThemeRecord { name, palette });
        self.dirty = true;
        Ok(key)
    }

    fn unique_key(&self, slug: &str) -> String {
        if !self.contains(slug) {
            return slug.to_string();
        }
        let stamped = format!("{}-{}", slug, Utc::now().timestamp_millis());
        let mut candidate = stamped.clone();
        let mut counter = 1;
        while self.contains(&candidate) {
            candidate = format!("{}-{}", stamped, counter);
            counter += 1;
        }
        candidate
    }

    fn user_theme_mut(&mut self, key: &str) -> NoteResult<&mut ThemeRecord> {
        if is_builtin(key) {
            return Err(NoteError::rejected(format!(
                "Built-in theme '{}' cannot be modified",
                key
            )));
        }
        self.user
            .get_mut(key)
            .ok_or_else(|| NoteError::NotFound(format!("theme '{}'", key)))
    }

    /// Replaces the name and palette of a user theme.
    pub fn update(&mut self, key: &str, name: &str, palette: Palette) -> NoteResult<()> {
        let name = validate_name(name)?;
        validate_palette(&palette)?;
        let record = self.user_theme_mut(key)?;
        *record = ThemeRecord { name, palette };
        self.dirty = true;
        Ok(())
    }

    /// Changes the display name of a user theme. The key is unchanged.
    pub fn rename(&mut self, key: &str, new_name: &str) -> NoteResult<()> {
        let new_name = validate_name(new_name)?;
        let record = self.user_theme_mut(key)?;
        record.name = new_name;
        self.dirty = true;
        Ok(())
    }

    /// Deletes a user theme.
    ///
    /// # Returns
    /// * `Ok(Some(key))` - The deleted theme was active; `key` is the new active theme
    /// * `Ok(None)` - The active theme is unchanged
    /// * `Err(NoteError)` - For built-ins, unknown keys, or the last theme
    pub fn delete(&mut self, key: &str) -> NoteResult<Option<String>> {
        self.user_theme_mut(key)?;
        if self.count() <= 1 {
            return Err(NoteError::rejected("The last theme cannot be deleted"));
        }
        self.user.remove(key);
        self.dirty = true;

        if self.active == key {
            self.active = self.keys()[0].to_string();
            return Ok(Some(self.active.clone()));
        }
        Ok(None)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the user themes if they changed.
    pub fn save(&mut self, store: &dyn Persistence) -> NoteResult<()> {
        if !self.dirty {
            return Ok(());
        }
        store.save_themes(&self.user)?;
        self.dirty = false;
        Ok(())
    }
}
