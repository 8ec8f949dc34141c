use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Modifier keys held with a combination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

/// A parsed key combination such as `Ctrl+Shift+N`.
///
/// The key name is canonical: letters are upper case and named keys use a
/// single spelling (`Return`, `Escape`, `Up`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: String,
}

impl KeyCombo {
    /// Whether the combination would type a character into a text field.
    pub fn is_text_input(&self) -> bool {
        let Modifiers {
            ctrl, alt, meta, ..
        } = self.modifiers;
        !ctrl && !alt && !meta && (self.key.chars().count() == 1 || self.key == "Space")
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.modifiers.alt {
            write!(f, "Alt+")?;
        }
        if self.modifiers.shift {
            write!(f, "Shift+")?;
        }
        if self.modifiers.meta {
            write!(f, "Meta+")?;
        }
        write!(f, "{}", self.key)
    }
}

const NAMED_KEYS: &[(&str, &str)] = &[
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("return", "Return"),
    ("enter", "Return"),
    ("space", "Space"),
    ("tab", "Tab"),
    ("backtab", "Tab"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("backspace", "Backspace"),
    ("insert", "Insert"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "PageUp"),
    ("pagedown", "PageDown"),
    ("up", "Up"),
    ("arrowup", "Up"),
    ("down", "Down"),
    ("arrowdown", "Down"),
    ("left", "Left"),
    ("arrowleft", "Left"),
    ("right", "Right"),
    ("arrowright", "Right"),
];

fn canonical_key(part: &str) -> Option<String> {
    let lower = part.to_lowercase();
    if let Some((_, name)) = NAMED_KEYS.iter().find(|(alias, _)| *alias == lower) {
        return Some(name.to_string());
    }
    if let Some(number) = lower.strip_prefix('f') {
        if let Ok(n) = number.parse::<u8>() {
            if (1..=24).contains(&n) {
                return Some(format!("F{}", n));
            }
        }
    }
    let mut chars = part.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() && c != '+' => {
            Some(c.to_uppercase().collect())
        }
        _ => None,
    }
}

/// Parses a shortcut string into a KeyCombo.
///
/// Modifiers (`Ctrl`/`Control`, `Alt`/`Option`, `Shift`, `Meta`/`Super`/
/// `Cmd`) may come in any order and case; exactly one other key must follow.
///
/// # Arguments
/// * `key` - The shortcut string (e.g., "Ctrl+Shift+N")
///
/// # Returns
/// * `Ok(KeyCombo)` - The parsed combination
/// * `Err(String)` - If parsing fails
pub fn parse_shortcut(key: &str) -> Result<KeyCombo, String> {
    let invalid = |reason: &str| format!("Invalid shortcut '{}': {}", key, reason);

    if key.trim().is_empty() {
        return Err(invalid("empty"));
    }

    let mut modifiers = Modifiers::default();
    let mut main_key: Option<String> = None;

    for part in key.split('+') {
        let part = part.trim();
        if part.is_empty() {
            return Err(invalid("empty key between '+'"));
        }
        let slot = match part.to_lowercase().as_str() {
            "ctrl" | "control" => Some(&mut modifiers.ctrl),
            "alt" | "option" => Some(&mut modifiers.alt),
            "shift" => Some(&mut modifiers.shift),
            "meta" | "super" | "cmd" | "command" => Some(&mut modifiers.meta),
            _ => None,
        };
        match slot {
            Some(held) => {
                if *held {
                    return Err(invalid("repeated modifier"));
                }
                *held = true;
            }
            None => {
                if main_key.is_some() {
                    return Err(invalid("more than one key"));
                }
                let canonical = canonical_key(part).ok_or_else(|| invalid("unknown key"))?;
                main_key = Some(canonical);
            }
        }
    }

    let key = main_key.ok_or_else(|| invalid("no key besides modifiers"))?;
    Ok(KeyCombo { modifiers, key })
}

/// Checks if a shortcut string is valid.
pub fn is_valid_shortcut(key: &str) -> bool {
    parse_shortcut(key).is_ok()
}

/// Everything a shortcut can trigger, named as in the config shortcut table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    NewNote,
    Save,
    Back,
    Delete,
    ConfirmDelete,
    CancelDelete,
    QuickDelete,
    Search,
    NextNote,
    PrevNote,
    NextNoteHorizontal,
    PrevNoteHorizontal,
    OpenNote,
    FirstNote,
    LastNote,
    Quit,
    Help,
    ToggleFullscreen,
    OptimizeCardWidth,
    IncreaseCardTitleFontSize,
    DecreaseCardTitleFontSize,
    IncreaseFontSize,
    DecreaseFontSize,
    IncreaseCardFontSize,
    DecreaseCardFontSize,
    IncreaseCardHeight,
    DecreaseCardHeight,
    ThemeCycle,
    ThemeCycleBackward,
    FontCycle,
    FontCycleBackward,
    FontSelection,
    NewCollection,
    NextCollection,
    PrevCollection,
    DeleteCollection,
    RenameCollection,
    ShowStats,
    IncreaseColumns,
    DecreaseColumns,
    ToggleAutoSave,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("newNote", Action::NewNote),
    ("save", Action::Save),
    ("back", Action::Back),
    ("delete", Action::Delete),
    ("confirmDelete", Action::ConfirmDelete),
    ("cancelDelete", Action::CancelDelete),
    ("quickDelete", Action::QuickDelete),
    ("search", Action::Search),
    ("nextNote", Action::NextNote),
    ("prevNote", Action::PrevNote),
    ("nextNoteHorizontal", Action::NextNoteHorizontal),
    ("prevNoteHorizontal", Action::PrevNoteHorizontal),
    ("openNote", Action::OpenNote),
    ("firstNote", Action::FirstNote),
    ("lastNote", Action::LastNote),
    ("quit", Action::Quit),
    ("help", Action::Help),
    ("toggleFullscreen", Action::ToggleFullscreen),
    ("optimizeCardWidth", Action::OptimizeCardWidth),
    ("increaseCardTitleFontSize", Action::IncreaseCardTitleFontSize),
    ("decreaseCardTitleFontSize", Action::DecreaseCardTitleFontSize),
    ("increaseFontSize", Action::IncreaseFontSize),
    ("decreaseFontSize", Action::DecreaseFontSize),
    ("increaseCardFontSize", Action::IncreaseCardFontSize),
    ("decreaseCardFontSize", Action::DecreaseCardFontSize),
    ("increaseCardHeight", Action::IncreaseCardHeight),
    ("decreaseCardHeight", Action::DecreaseCardHeight),
    ("themeCycle", Action::ThemeCycle),
    ("themeCycleBackward", Action::ThemeCycleBackward),
    ("fontCycle", Action::FontCycle),
    ("fontCycleBackward", Action::FontCycleBackward),
    ("fontSelection", Action::FontSelection),
    ("newCollection", Action::NewCollection),
    ("nextCollection", Action::NextCollection),
    ("prevCollection", Action::PrevCollection),
    ("deleteCollection", Action::DeleteCollection),
    ("renameCollection", Action::RenameCollection),
    ("showStats", Action::ShowStats),
    ("increaseColumns", Action::IncreaseColumns),
    ("decreaseColumns", Action::DecreaseColumns),
    ("toggleAutoSave", Action::ToggleAutoSave),
];

impl Action {
    /// Looks an action up by its shortcut table name.
    pub fn from_name(name: &str) -> Option<Action> {
        ACTION_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, action)| *action)
    }

    pub fn name(self) -> &'static str {
        ACTION_NAMES
            .iter()
            .find(|(_, action)| *action == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

/// Resolves key combinations to actions.
///
/// One combination may be bound to several actions (`Return` both opens a
/// note and confirms a deletion); the caller tries them in table order until
/// one is legal in the current state.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    bindings: HashMap<KeyCombo, Vec<Action>>,
}

impl Keymap {
    /// Builds the keymap from the config shortcut table.
    ///
    /// Unknown action names and unparsable combinations are logged and skipped.
    pub fn from_config(shortcuts: &BTreeMap<String, Vec<String>>) -> Self {
        let mut bindings: HashMap<KeyCombo, Vec<Action>> = HashMap::new();
        // Table order, so ambiguous bindings resolve predictably.
        for (name, action) in ACTION_NAMES {
            let Some(keys) = shortcuts.get(*name) else {
                continue;
            };
            for key in keys {
                match parse_shortcut(key) {
                    Ok(combo) => {
                        let actions = bindings.entry(combo).or_default();
                        if !actions.contains(action) {
                            actions.push(*action);
                        }
                    }
                    Err(e) => log::warn!("Skipping shortcut for {}: {}", name, e),
                }
            }
        }
        for name in shortcuts.keys() {
            if Action::from_name(name).is_none() {
                log::warn!("Unknown shortcut action '{}'", name);
            }
        }
        Self { bindings }
    }

    /// Actions bound to `combo`, in priority order.
    pub fn resolve(&self, combo: &KeyCombo) -> &[Action] {
        self.bindings
            .get(combo)
            .map(|actions| actions.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_shortcuts;
    use proptest::prelude::*;

    fn combo(key: &str) -> KeyCombo {
        parse_shortcut(key).unwrap()
    }

    #[test]
    fn test_parse_valid_shortcut() {
        let parsed = combo("Ctrl+Shift+N");
        assert!(parsed.modifiers.ctrl && parsed.modifiers.shift);
        assert!(!parsed.modifiers.alt);
        assert_eq!(parsed.key, "N");

        assert_eq!(combo("ctrl+alt+shift+f").to_string(), "Ctrl+Alt+Shift+F");
        assert_eq!(combo("Enter"), combo("Return"));
        assert_eq!(combo("ArrowUp").key, "Up");
        assert_eq!(combo("Ctrl+]").key, "]");
        assert_eq!(combo("F12").key, "F12");
        assert_eq!(combo("Shift+Ctrl+T"), combo("Ctrl+Shift+T"));
    }

    #[test]
    fn test_parse_invalid_shortcut() {
        assert!(parse_shortcut("").is_err());
        assert!(parse_shortcut("InvalidKey").is_err());
        assert!(parse_shortcut("Ctrl+").is_err());
        assert!(parse_shortcut("+N").is_err());
        assert!(parse_shortcut("Ctrl+Shift").is_err());
        assert!(parse_shortcut("Ctrl+Ctrl+N").is_err());
        assert!(parse_shortcut("A+B").is_err());
        assert!(parse_shortcut("F25").is_err());
    }

    #[test]
    fn test_is_valid_shortcut() {
        assert!(is_valid_shortcut("Ctrl+Alt+S"));
        assert!(!is_valid_shortcut("NotAKey+X"));
    }

    #[test]
    fn test_text_input_combos() {
        assert!(combo("J").is_text_input());
        assert!(combo("Shift+J").is_text_input());
        assert!(combo("Space").is_text_input());
        assert!(!combo("Ctrl+J").is_text_input());
        assert!(!combo("Escape").is_text_input());
        assert!(!combo("Down").is_text_input());
    }

    #[test]
    fn test_action_names_round_trip() {
        for (name, action) in ACTION_NAMES {
            assert_eq!(Action::from_name(name), Some(*action));
            assert_eq!(action.name(), *name);
        }
        assert_eq!(Action::from_name("nope"), None);
    }

    #[test]
    fn test_every_default_shortcut_is_bound() {
        let defaults = default_shortcuts();
        for (name, keys) in &defaults {
            assert!(Action::from_name(name).is_some(), "unknown action {}", name);
            for key in keys {
                assert!(is_valid_shortcut(key), "invalid default {} for {}", key, name);
            }
        }
    }

    #[test]
    fn test_keymap_resolves_shared_bindings_in_table_order() {
        let keymap = Keymap::from_config(&default_shortcuts());
        assert_eq!(
            keymap.resolve(&combo("Return")),
            &[Action::ConfirmDelete, Action::OpenNote]
        );
        assert_eq!(keymap.resolve(&combo("Ctrl+N")), &[Action::NewNote]);
        assert_eq!(keymap.resolve(&combo("J")), &[Action::NextNote]);
        assert!(keymap.resolve(&combo("Ctrl+Alt+Shift+Z")).is_empty());
    }

    #[test]
    fn test_keymap_skips_bad_entries() {
        let mut shortcuts = BTreeMap::new();
        shortcuts.insert("save".to_string(), vec!["Ctrl+S".to_string(), "Bogus+Key".to_string()]);
        shortcuts.insert("notAnAction".to_string(), vec!["Ctrl+X".to_string()]);
        let keymap = Keymap::from_config(&shortcuts);
        assert_eq!(keymap.len(), 1);
        assert_eq!(keymap.resolve(&combo("Ctrl+S")), &[Action::Save]);
    }

    fn invalid_shortcut_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("".to_string()),
            Just("InvalidKey".to_string()),
            Just("NotAKey+X".to_string()),
            Just("Ctrl+".to_string()),
            Just("Alt+".to_string()),
            Just("+N".to_string()),
            Just("++".to_string()),
            Just("+".to_string()),
            Just("Shift+Meta".to_string()),
        ]
    }

    fn valid_shortcut_strategy() -> impl Strategy<Value = String> {
        let modifiers = prop_oneof![Just("Ctrl"), Just("Alt"), Just("Shift"), Just("Meta")];
        let keys = prop_oneof![
            "[A-Z]".prop_map(|s| s),
            (1u8..=12).prop_map(|n| format!("F{}", n)),
            Just("Space".to_string()),
            Just("Tab".to_string()),
            Just("Escape".to_string()),
            Just("Home".to_string()),
            Just("Down".to_string()),
        ];
        (modifiers.clone(), prop::option::of(modifiers), keys).prop_map(|(mod1, mod2, key)| {
            match mod2 {
                Some(m2) if m2 != mod1 => format!("{}+{}+{}", mod1, m2, key),
                _ => format!("{}+{}", mod1, key),
            }
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_invalid_shortcut_returns_error(shortcut in invalid_shortcut_strategy()) {
            let result = parse_shortcut(&shortcut);
            prop_assert!(result.is_err(), "Expected error for '{}'", shortcut);
            if let Err(message) = result {
                prop_assert!(message.contains("Invalid shortcut"));
            }
        }

        /// Parsing, printing and parsing again yields the same combination.
        #[test]
        fn prop_valid_shortcut_is_stable(shortcut in valid_shortcut_strategy()) {
            let parsed = parse_shortcut(&shortcut);
            prop_assert!(parsed.is_ok(), "Expected Ok for '{}': {:?}", shortcut, parsed.as_ref().err());
            let parsed = parsed.unwrap();
            prop_assert_eq!(parse_shortcut(&parsed.to_string()).unwrap(), parsed);
        }

        #[test]
        fn prop_is_valid_shortcut_consistent_with_parse(shortcut in "[A-Za-z+]{1,30}") {
            prop_assert_eq!(parse_shortcut(&shortcut).is_ok(), is_valid_shortcut(&shortcut));
        }
    }
}
