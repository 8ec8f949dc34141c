use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::events::AppMessage;
use crate::models::FontCache;

/// Families served until the installed fonts have been enumerated
pub const BASIC_FONTS: &[&str] = &[
    "Victor Mono",
    "Fira Code",
    "JetBrains Mono",
    "Iosevka",
    "Iosevka NFM",
    "DejaVu Sans Mono",
    "Ubuntu Mono",
    "Consolas",
    "Courier New",
    "Monaco",
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Trebuchet MS",
];

/// A cache older than this is ignored and the fonts are enumerated again
pub const CACHE_MAX_AGE_DAYS: i64 = 30;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc"];

/// Enumerates installed font families. May be slow.
pub trait FontSource: Send + Sync {
    fn list_installed_fonts(&self) -> Vec<String>;
}

/// Reads families from fontconfig, falling back to scanning font directories.
#[derive(Debug, Clone)]
pub struct SystemFontSource {
    font_dirs: Vec<PathBuf>,
}

impl Default for SystemFontSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFontSource {
    pub fn new() -> Self {
        let mut font_dirs = vec![
            PathBuf::from("/usr/share/fonts"),
            PathBuf::from("/usr/local/share/fonts"),
            PathBuf::from("/Library/Fonts"),
            PathBuf::from("/System/Library/Fonts"),
            PathBuf::from("C:\\Windows\\Fonts"),
        ];
        if let Some(data) = dirs::data_dir() {
            font_dirs.push(data.join("fonts"));
        }
        if let Some(home) = dirs::home_dir() {
            font_dirs.push(home.join(".fonts"));
            font_dirs.push(home.join("Library/Fonts"));
        }
        Self { font_dirs }
    }

    /// A source that only scans the given directories.
    pub fn with_dirs(font_dirs: Vec<PathBuf>) -> Self {
        Self { font_dirs }
    }

    fn from_fontconfig() -> Option<Vec<String>> {
        let output = Command::new("fc-list")
            .args([":", "family"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        // Each line lists a family and its localised aliases, comma separated.
        let families: Vec<String> = text
            .lines()
            .filter_map(|line| line.split(',').next())
            .map(|family| family.trim().to_string())
            .filter(|family| !family.is_empty())
            .collect();
        if families.is_empty() {
            None
        } else {
            Some(families)
        }
    }

    fn scan_directories(&self) -> Vec<String> {
        let mut families = Vec::new();
        for dir in &self.font_dirs {
            collect_font_files(dir, &mut families, 0);
        }
        families
    }
}

impl FontSource for SystemFontSource {
    fn list_installed_fonts(&self) -> Vec<String> {
        if self.font_dirs.is_empty() {
            return Vec::new();
        }
        Self::from_fontconfig().unwrap_or_else(|| self.scan_directories())
    }
}

fn collect_font_files(dir: &Path, families: &mut Vec<String>, depth: usize) {
    if depth > 4 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, families, depth + 1);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FONT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if let (true, Some(stem)) = (is_font, path.file_stem().and_then(|s| s.to_str())) {
            families.push(family_from_file_stem(stem));
        }
    }
}

/// Best-effort family name from a font file name: `FiraCode-Bold` gives `FiraCode`.
fn family_from_file_stem(stem: &str) -> String {
    stem.split('-')
        .next()
        .unwrap_or(stem)
        .replace('_', " ")
        .trim()
        .to_string()
}

/// Cleans an enumerated family list: hidden (`@`, `.`) and blank entries
/// are dropped, duplicates removed, the rest sorted.
pub fn normalize_families(families: Vec<String>) -> Vec<String> {
    families
        .into_iter()
        .map(|family| family.trim().to_string())
        .filter(|family| !family.is_empty() && !family.starts_with('@') && !family.starts_with('.'))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Runs the font source on the blocking pool and posts the result.
///
/// Without a tokio runtime a plain thread is used instead. Either way the
/// list arrives as `AppMessage::FontsLoaded` on `sender`.
pub fn spawn_font_enumeration(source: Arc<dyn FontSource>, sender: UnboundedSender<AppMessage>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                let fonts = tokio::task::spawn_blocking(move || source.list_installed_fonts())
                    .await
                    .unwrap_or_else(|e| {
                        log::error!("Font enumeration failed: {}", e);
                        Vec::new()
                    });
                post_fonts(&sender, fonts);
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                let fonts = source.list_installed_fonts();
                post_fonts(&sender, fonts);
            });
        }
    }
}

fn post_fonts(sender: &UnboundedSender<AppMessage>, fonts: Vec<String>) {
    let fonts = normalize_families(fonts);
    log::info!("Enumerated {} font families", fonts.len());
    if sender.send(AppMessage::FontsLoaded(fonts)).is_err() {
        log::debug!("Font list arrived after the app went away");
    }
}

/// The font list the pickers show, and cycling over it.
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    fonts: Option<Vec<String>>,
    loading: bool,
}

impl FontCatalog {
    /// Starts from a disk cache when it is recent enough.
    pub fn from_cache(cache: Option<FontCache>, now: DateTime<Utc>) -> Self {
        let fonts = cache
            .filter(|cache| now - cache.timestamp < Duration::days(CACHE_MAX_AGE_DAYS))
            .map(|cache| cache.fonts)
            .filter(|fonts| !fonts.is_empty());
        Self {
            fonts,
            loading: false,
        }
    }

    /// The enumerated families, or the basic list while they are pending.
    pub fn available(&self) -> Vec<String> {
        match &self.fonts {
            Some(fonts) => fonts.clone(),
            None => BASIC_FONTS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.fonts.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether an enumeration should be started now.
    pub fn needs_loading(&self) -> bool {
        self.fonts.is_none() && !self.loading
    }

    pub fn mark_loading(&mut self) {
        self.loading = true;
    }

    /// Stores an enumeration result.
    ///
    /// An empty result keeps the basic list in service.
    ///
    /// # Returns
    /// The cache record to persist, if the result was usable
    pub fn loaded(&mut self, fonts: Vec<String>, now: DateTime<Utc>) -> Option<FontCache> {
        self.loading = false;
        if fonts.is_empty() {
            return None;
        }
        self.fonts = Some(fonts.clone());
        Some(FontCache {
            timestamp: now,
            fonts,
        })
    }

    /// The family after (or before) `current`, wrapping.
    ///
    /// An unknown `current` starts from the first entry going forward and the
    /// last going backward.
    pub fn neighbour(&self, current: &str, forward: bool) -> Option<String> {
        let fonts = self.available();
        let count = fonts.len();
        if count == 0 {
            return None;
        }
        let next = match fonts.iter().position(|f| f == current) {
            Some(i) if forward => (i + 1) % count,
            Some(i) => (i + count - 1) % count,
            None if forward => 0,
            None => count - 1,
        };
        Some(fonts[next].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::sync::mpsc::unbounded_channel;

    struct FixedFonts(Vec<&'static str>);

    impl FontSource for FixedFonts {
        fn list_installed_fonts(&self) -> Vec<String> {
            self.0.iter().map(|f| f.to_string()).collect()
        }
    }

    #[test]
    fn test_normalize_families() {
        let fonts = vec![
            "Zed".to_string(),
            "@MS Gothic".to_string(),
            ".SF NS".to_string(),
            " Arial ".to_string(),
            "Arial".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_families(fonts), vec!["Arial", "Zed"]);
    }

    #[test]
    fn test_basic_list_until_loaded() {
        let mut catalog = FontCatalog::default();
        assert!(catalog.needs_loading());
        assert_eq!(catalog.available().len(), BASIC_FONTS.len());

        catalog.mark_loading();
        assert!(!catalog.needs_loading());

        let cache = catalog.loaded(vec!["Fira Code".to_string()], Utc::now());
        assert!(cache.is_some());
        assert_eq!(catalog.available(), vec!["Fira Code"]);
        assert!(!catalog.is_loading());
    }

    #[test]
    fn test_empty_enumeration_keeps_basic_list() {
        let mut catalog = FontCatalog::default();
        catalog.mark_loading();
        assert!(catalog.loaded(Vec::new(), Utc::now()).is_none());
        assert_eq!(catalog.available().len(), BASIC_FONTS.len());
    }

    #[test]
    fn test_cache_age() {
        let now = Utc::now();
        let fresh = FontCache {
            timestamp: now - Duration::days(3),
            fonts: vec!["Iosevka".to_string()],
        };
        let stale = FontCache {
            timestamp: now - Duration::days(31),
            fonts: vec!["Iosevka".to_string()],
        };
        assert!(FontCatalog::from_cache(Some(fresh), now).is_loaded());
        assert!(!FontCatalog::from_cache(Some(stale), now).is_loaded());
        assert!(!FontCatalog::from_cache(None, now).is_loaded());
    }

    #[test]
    fn test_neighbour_wraps_and_handles_unknown() {
        let mut catalog = FontCatalog::default();
        catalog.loaded(vec!["A".into(), "B".into(), "C".into()], Utc::now());

        assert_eq!(catalog.neighbour("A", true), Some("B".to_string()));
        assert_eq!(catalog.neighbour("C", true), Some("A".to_string()));
        assert_eq!(catalog.neighbour("A", false), Some("C".to_string()));
        assert_eq!(catalog.neighbour("Unknown", true), Some("A".to_string()));
        assert_eq!(catalog.neighbour("Unknown", false), Some("C".to_string()));
    }

    #[test]
    fn test_family_from_file_stem() {
        assert_eq!(family_from_file_stem("FiraCode-Bold"), "FiraCode");
        assert_eq!(family_from_file_stem("Victor_Mono"), "Victor Mono");
    }

    #[test]
    fn test_directory_scan_finds_font_files() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("truetype");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Hack-Regular.ttf"), b"").unwrap();
        fs::write(nested.join("readme.txt"), b"").unwrap();

        let source = SystemFontSource::with_dirs(vec![temp_dir.path().to_path_buf()]);
        assert_eq!(source.scan_directories(), vec!["Hack"]);
    }

    #[tokio::test]
    async fn test_spawn_font_enumeration_posts_normalized_list() {
        let (sender, mut receiver) = unbounded_channel();
        spawn_font_enumeration(Arc::new(FixedFonts(vec!["b", ".hidden", "a"])), sender);

        let message = receiver.recv().await.unwrap();
        assert_eq!(
            message,
            AppMessage::FontsLoaded(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_spawn_font_enumeration_without_runtime() {
        let (sender, mut receiver) = unbounded_channel();
        spawn_font_enumeration(Arc::new(FixedFonts(vec!["Only"])), sender);

        let message = receiver.blocking_recv().unwrap();
        assert_eq!(message, AppMessage::FontsLoaded(vec!["Only".to_string()]));
    }
}
