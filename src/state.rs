//! The view × modal state machine.
//!
//! Every intent checks its guard against the current `(view, modal)` pair
//! and either applies its transition or is ignored. Nothing here panics or
//! returns errors: a rejected intent leaves the state untouched and returns
//! `false` (or `BackOutcome::Ignored`).
//!
//! The machine knows nothing about notes or collections. Callers pass in
//! the counts a guard needs and perform the data side of a transition
//! themselves, in the order the method docs describe.

use serde::{Deserialize, Serialize};

use crate::grid::{self, Direction};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Grid,
    Editor,
}

/// The single active overlay. Variants carry their target where one exists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Modal {
    None,
    Search,
    Delete,
    DeleteCollection { name: String },
    DeleteTheme { key: String },
    Help,
    Themes,
    /// `key` is `None` when creating a new theme
    ThemeEditor { key: Option<String> },
    Fonts,
    NewCollection,
    RenameCollection { from: String },
    FirstTimeSetup,
    Stats,
}

impl Modal {
    pub fn is_none(&self) -> bool {
        matches!(self, Modal::None)
    }

    /// Modals with a text field of their own.
    pub fn takes_text_input(&self) -> bool {
        matches!(
            self,
            Modal::Search
                | Modal::NewCollection
                | Modal::RenameCollection { .. }
                | Modal::FirstTimeSetup
                | Modal::ThemeEditor { .. }
        )
    }

    fn is_confirmation(&self) -> bool {
        matches!(
            self,
            Modal::Delete | Modal::DeleteCollection { .. } | Modal::DeleteTheme { .. }
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppState {
    pub view: View,
    pub modal: Modal,
    pub selected_index: usize,
    pub search_text: String,
}

/// What a back/escape intent did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackOutcome {
    /// Nothing to go back from, or first-time setup is showing
    Ignored,
    /// `closed` was dismissed; the editor should take focus again when
    /// `refocus_editor` is set
    ClosedModal { closed: Modal, refocus_editor: bool },
    /// The editor is open without a modal: the caller saves, then calls
    /// `show_grid`
    LeaveEditor,
}

#[derive(Debug, Clone)]
pub struct AppStateMachine {
    state: AppState,
}

impl AppStateMachine {
    /// Starts on the grid, in first-time setup when no collection exists yet.
    pub fn new(needs_first_time_setup: bool) -> Self {
        Self {
            state: AppState {
                view: View::Grid,
                modal: if needs_first_time_setup {
                    Modal::FirstTimeSetup
                } else {
                    Modal::None
                },
                selected_index: 0,
                search_text: String::new(),
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> View {
        self.state.view
    }

    pub fn modal(&self) -> &Modal {
        &self.state.modal
    }

    pub fn selected_index(&self) -> usize {
        self.state.selected_index
    }

    pub fn search_text(&self) -> &str {
        &self.state.search_text
    }

    fn reject(&self, intent: &str) -> bool {
        log::debug!(
            "Ignoring {} in {:?}/{:?}",
            intent,
            self.state.view,
            self.state.modal
        );
        false
    }

    /// No modal, or only the search bar.
    fn modal_is_none_or_search(&self) -> bool {
        matches!(self.state.modal, Modal::None | Modal::Search)
    }

    /// Whether size, theme and font shortcuts may run.
    pub fn allows_global_shortcuts(&self) -> bool {
        self.modal_is_none_or_search()
    }

    /// Whether printable keys belong to a text field right now.
    pub fn accepts_text_input(&self) -> bool {
        if self.state.modal.takes_text_input() {
            return true;
        }
        self.state.view == View::Editor && self.state.modal.is_none()
    }

    pub fn can_open_search(&self) -> bool {
        self.state.view == View::Grid
            && !self.state.modal.is_confirmation()
            && self.state.modal != Modal::FirstTimeSetup
    }

    /// Shows the search bar, replacing any other non-blocking modal.
    pub fn open_search(&mut self) -> bool {
        if !self.can_open_search() {
            return self.reject("openSearch");
        }
        self.state.modal = Modal::Search;
        true
    }

    /// Updates the search text. Only legal while searching.
    pub fn set_search_text(&mut self, text: &str) -> bool {
        if self.state.modal != Modal::Search {
            return self.reject("searchTextChanged");
        }
        self.state.search_text = text.to_string();
        true
    }

    /// Handles back/escape.
    ///
    /// Closing the search bar also clears its text.
    pub fn back(&mut self) -> BackOutcome {
        match self.state.modal {
            Modal::FirstTimeSetup => {
                self.reject("back");
                BackOutcome::Ignored
            }
            Modal::None => match self.state.view {
                View::Editor => BackOutcome::LeaveEditor,
                View::Grid => BackOutcome::Ignored,
            },
            _ => {
                let closed = std::mem::replace(&mut self.state.modal, Modal::None);
                if closed == Modal::Search {
                    self.state.search_text.clear();
                }
                BackOutcome::ClosedModal {
                    closed,
                    refocus_editor: self.state.view == View::Editor,
                }
            }
        }
    }

    /// Opens one of the informational or picker dialogs.
    ///
    /// Help, Themes, Fonts and Stats need a free screen. The theme editor
    /// and theme deletion may also be opened from the theme picker.
    pub fn open_modal(&mut self, modal: Modal) -> bool {
        let legal = match &modal {
            Modal::Help | Modal::Themes | Modal::Fonts | Modal::Stats => {
                self.state.modal.is_none()
            }
            Modal::ThemeEditor { .. } | Modal::DeleteTheme { .. } => {
                matches!(self.state.modal, Modal::None | Modal::Themes)
            }
            _ => false,
        };
        if !legal {
            return self.reject("openModal");
        }
        self.state.modal = modal;
        true
    }

    /// Dismisses the active modal after its action completed.
    ///
    /// First-time setup is only left through `finish_first_time_setup`.
    pub fn close_modal(&mut self) -> bool {
        match self.state.modal {
            Modal::None => false,
            Modal::FirstTimeSetup => self.reject("closeModal"),
            _ => {
                if self.state.modal == Modal::Search {
                    self.state.search_text.clear();
                }
                self.state.modal = Modal::None;
                true
            }
        }
    }

    /// Leaves first-time setup once the first collection exists.
    pub fn finish_first_time_setup(&mut self) -> bool {
        if self.state.modal != Modal::FirstTimeSetup {
            return self.reject("finishFirstTimeSetup");
        }
        self.state.modal = Modal::None;
        self.state.selected_index = 0;
        true
    }

    /// Whether a note may be opened: on the grid, with no modal or search.
    pub fn can_open_editor(&self) -> bool {
        self.state.view == View::Grid && self.modal_is_none_or_search()
    }

    /// Switches to the editor for the note at `index` of the filtered view.
    ///
    /// The search text is kept so the grid comes back filtered.
    pub fn open_editor(&mut self, index: usize, total_count: usize) -> bool {
        if !self.can_open_editor() || index >= total_count {
            return self.reject("openEditor");
        }
        self.state.selected_index = index;
        self.state.view = View::Editor;
        self.state.modal = Modal::None;
        true
    }

    /// Whether a new note may be started. From the editor the caller saves first.
    pub fn can_create_note(&self) -> bool {
        match self.state.view {
            View::Grid => self.modal_is_none_or_search(),
            View::Editor => self.state.modal.is_none(),
        }
    }

    /// Moves to `(Editor, None)` for a fresh note.
    pub fn enter_new_note(&mut self) -> bool {
        if !self.can_create_note() {
            return self.reject("createNewNote");
        }
        self.state.view = View::Editor;
        self.state.modal = Modal::None;
        true
    }

    /// Returns to the grid after `BackOutcome::LeaveEditor` or a deletion.
    pub fn show_grid(&mut self, total_count: usize) {
        self.state.view = View::Grid;
        self.state.modal = Modal::None;
        self.clamp_selection(total_count);
    }

    /// Whether a delete confirmation may be shown.
    ///
    /// # Arguments
    /// * `total_count` - Notes in the grid
    /// * `editor_note_persisted` - Whether the open editor note has an id
    pub fn can_request_delete(&self, total_count: usize, editor_note_persisted: bool) -> bool {
        if !self.state.modal.is_none() {
            return false;
        }
        match self.state.view {
            View::Grid => total_count > 0,
            View::Editor => editor_note_persisted,
        }
    }

    pub fn request_delete(&mut self, total_count: usize, editor_note_persisted: bool) -> bool {
        if !self.can_request_delete(total_count, editor_note_persisted) {
            return self.reject("requestDelete");
        }
        self.state.modal = Modal::Delete;
        true
    }

    pub fn is_delete_pending(&self) -> bool {
        self.state.modal == Modal::Delete
    }

    /// Finishes a confirmed deletion once the caller removed the note.
    ///
    /// Always lands on the grid with the selection clamped to what is left.
    pub fn complete_delete(&mut self, remaining: usize) -> bool {
        if !self.is_delete_pending() {
            return self.reject("confirmDelete");
        }
        self.show_grid(remaining);
        true
    }

    /// Dismisses the delete confirmation.
    ///
    /// # Returns
    /// `true` if a confirmation was showing
    pub fn cancel_delete(&mut self) -> bool {
        if !self.is_delete_pending() {
            return self.reject("cancelDelete");
        }
        self.state.modal = Modal::None;
        true
    }

    /// Collection dialogs open over a free grid or the search bar.
    pub fn can_manage_collections(&self) -> bool {
        self.modal_is_none_or_search()
    }

    /// Replaces the search bar or free screen with a collection dialog.
    ///
    /// The search ends with it, the same as closing the bar.
    fn open_collection_dialog(&mut self, modal: Modal) {
        if self.state.modal == Modal::Search {
            self.state.search_text.clear();
        }
        self.state.modal = modal;
    }

    pub fn open_new_collection(&mut self) -> bool {
        if !self.can_manage_collections() {
            return self.reject("newCollection");
        }
        self.open_collection_dialog(Modal::NewCollection);
        true
    }

    pub fn open_rename_collection(&mut self, from: &str) -> bool {
        if !self.can_manage_collections() {
            return self.reject("renameCollection");
        }
        self.open_collection_dialog(Modal::RenameCollection {
            from: from.to_string(),
        });
        true
    }

    /// Opens the collection delete confirmation; never for the last collection.
    pub fn open_delete_collection(&mut self, name: &str, collection_count: usize) -> bool {
        if !self.can_manage_collections() || collection_count <= 1 {
            return self.reject("deleteCollection");
        }
        self.open_collection_dialog(Modal::DeleteCollection {
            name: name.to_string(),
        });
        true
    }

    /// Whether the current collection may change.
    ///
    /// Switching is allowed while searching and leaves the search bar open.
    pub fn can_switch_collection(&self) -> bool {
        self.state.view == View::Grid && self.modal_is_none_or_search()
    }

    /// Resets the selection after the caller switched collections.
    pub fn collection_switched(&mut self) {
        self.state.selected_index = 0;
    }

    /// Whether the grid takes navigation keys.
    pub fn can_navigate(&self, total_count: usize) -> bool {
        self.state.view == View::Grid && self.modal_is_none_or_search() && total_count > 0
    }

    /// Moves the grid selection one cell.
    pub fn navigate(&mut self, direction: Direction, total_count: usize, columns: usize) -> bool {
        if !self.can_navigate(total_count) {
            return self.reject("navigate");
        }
        let next = grid::move_selection(direction, self.state.selected_index, total_count, columns);
        let changed = next != self.state.selected_index;
        self.state.selected_index = next;
        changed
    }

    pub fn select_first(&mut self, total_count: usize) -> bool {
        self.select(0, total_count)
    }

    pub fn select_last(&mut self, total_count: usize) -> bool {
        self.select(grid::last_index(total_count), total_count)
    }

    /// Selects `index`, clamped into the grid.
    pub fn select(&mut self, index: usize, total_count: usize) -> bool {
        if !self.can_navigate(total_count) {
            return self.reject("select");
        }
        let index = grid::clamp_index(index, total_count);
        let changed = index != self.state.selected_index;
        self.state.selected_index = index;
        changed
    }

    /// Keeps the selection inside `[0, total_count - 1]`.
    pub fn clamp_selection(&mut self, total_count: usize) {
        self.state.selected_index = grid::clamp_index(self.state.selected_index, total_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> AppStateMachine {
        AppStateMachine::new(false)
    }

    fn editor() -> AppStateMachine {
        let mut machine = grid();
        assert!(machine.enter_new_note());
        machine
    }

    #[test]
    fn test_initial_state() {
        let machine = AppStateMachine::new(true);
        assert_eq!(machine.view(), View::Grid);
        assert_eq!(machine.modal(), &Modal::FirstTimeSetup);
        assert_eq!(grid().modal(), &Modal::None);
    }

    #[test]
    fn test_back_is_ignored_during_first_time_setup() {
        let mut machine = AppStateMachine::new(true);
        let before = machine.state().clone();
        assert_eq!(machine.back(), BackOutcome::Ignored);
        assert!(!machine.close_modal());
        assert_eq!(machine.state(), &before);
    }

    #[test]
    fn test_first_time_setup_blocks_everything_else() {
        let mut machine = AppStateMachine::new(true);
        assert!(!machine.open_search());
        assert!(!machine.enter_new_note());
        assert!(!machine.open_new_collection());
        assert!(!machine.open_modal(Modal::Help));
        assert!(!machine.navigate(Direction::Down, 5, 2));
        assert!(machine.finish_first_time_setup());
        assert_eq!(machine.modal(), &Modal::None);
        assert!(!machine.finish_first_time_setup());
    }

    #[test]
    fn test_open_search_guards() {
        let mut machine = grid();
        assert!(machine.open_search());
        assert_eq!(machine.modal(), &Modal::Search);

        let mut machine = editor();
        assert!(!machine.open_search());

        let mut machine = grid();
        machine.request_delete(3, false);
        assert!(!machine.open_search());
        assert_eq!(machine.modal(), &Modal::Delete);

        let mut machine = grid();
        machine.open_delete_collection("Work", 2);
        assert!(!machine.open_search());
    }

    #[test]
    fn test_search_replaces_informational_modal() {
        let mut machine = grid();
        machine.open_modal(Modal::Help);
        assert!(machine.open_search());
        assert_eq!(machine.modal(), &Modal::Search);
    }

    #[test]
    fn test_search_text_only_while_searching() {
        let mut machine = grid();
        assert!(!machine.set_search_text("x"));
        machine.open_search();
        assert!(machine.set_search_text("rust"));
        assert_eq!(machine.search_text(), "rust");
    }

    #[test]
    fn test_back_from_search_clears_text() {
        let mut machine = grid();
        machine.open_search();
        machine.set_search_text("abc");
        assert_eq!(
            machine.back(),
            BackOutcome::ClosedModal {
                closed: Modal::Search,
                refocus_editor: false
            }
        );
        assert_eq!(machine.search_text(), "");
        assert_eq!(machine.modal(), &Modal::None);
    }

    #[test]
    fn test_back_from_modal_over_editor_refocuses() {
        let mut machine = editor();
        machine.request_delete(1, true);
        assert_eq!(
            machine.back(),
            BackOutcome::ClosedModal {
                closed: Modal::Delete,
                refocus_editor: true
            }
        );
        assert_eq!(machine.view(), View::Editor);
    }

    #[test]
    fn test_back_from_editor_asks_to_leave() {
        let mut machine = editor();
        assert_eq!(machine.back(), BackOutcome::LeaveEditor);
        assert_eq!(machine.view(), View::Editor);
        machine.show_grid(4);
        assert_eq!(machine.view(), View::Grid);
        assert_eq!(grid().back(), BackOutcome::Ignored);
    }

    #[test]
    fn test_open_editor_from_grid_or_search() {
        let mut machine = grid();
        assert!(!machine.open_editor(3, 3));
        assert!(machine.open_editor(2, 3));
        assert_eq!(machine.view(), View::Editor);
        assert_eq!(machine.selected_index(), 2);

        let mut machine = grid();
        machine.open_search();
        machine.set_search_text("x");
        assert!(machine.open_editor(0, 1));
        assert_eq!(machine.modal(), &Modal::None);
        assert_eq!(machine.search_text(), "x");

        let mut machine = grid();
        machine.open_modal(Modal::Stats);
        assert!(!machine.open_editor(0, 1));
    }

    #[test]
    fn test_create_note_guards() {
        let mut machine = editor();
        assert!(machine.enter_new_note());
        machine.request_delete(1, true);
        assert!(!machine.enter_new_note());

        let mut machine = grid();
        machine.open_modal(Modal::Fonts);
        assert!(!machine.enter_new_note());
    }

    #[test]
    fn test_request_delete_guards() {
        let mut machine = grid();
        assert!(!machine.request_delete(0, false));
        assert!(machine.request_delete(2, false));
        assert!(!machine.request_delete(2, false));

        let mut machine = editor();
        assert!(!machine.request_delete(5, false));
        assert!(machine.request_delete(5, true));
    }

    #[test]
    fn test_confirm_delete_only_from_delete_modal() {
        let mut machine = grid();
        assert!(!machine.complete_delete(3));

        let mut machine = editor();
        machine.state.selected_index = 4;
        machine.request_delete(5, true);
        assert!(machine.complete_delete(2));
        assert_eq!(machine.view(), View::Grid);
        assert_eq!(machine.modal(), &Modal::None);
        assert_eq!(machine.selected_index(), 1);
    }

    #[test]
    fn test_cancel_delete() {
        let mut machine = grid();
        assert!(!machine.cancel_delete());
        machine.request_delete(1, false);
        assert!(machine.cancel_delete());
        assert_eq!(machine.modal(), &Modal::None);
    }

    #[test]
    fn test_collection_dialogs_need_free_screen_or_search() {
        let mut machine = grid();
        machine.open_search();
        assert!(machine.open_new_collection());

        let mut machine = grid();
        machine.open_modal(Modal::Themes);
        assert!(!machine.open_new_collection());
        assert!(!machine.open_rename_collection("Work"));
        assert!(!machine.open_delete_collection("Work", 3));
    }

    #[test]
    fn test_collection_dialog_over_search_ends_the_search() {
        let mut machine = grid();
        machine.open_search();
        machine.set_search_text("apple");
        assert!(machine.open_rename_collection("Work"));
        assert_eq!(machine.search_text(), "");

        let outcome = machine.back();
        assert!(matches!(outcome, BackOutcome::ClosedModal { .. }));
        assert_eq!(machine.modal(), &Modal::None);
        assert_eq!(machine.search_text(), "");
    }

    #[test]
    fn test_delete_collection_needs_two_collections() {
        let mut machine = grid();
        assert!(!machine.open_delete_collection("Only", 1));
        assert_eq!(machine.modal(), &Modal::None);
        assert!(machine.open_delete_collection("Work", 2));
        assert_eq!(
            machine.modal(),
            &Modal::DeleteCollection {
                name: "Work".to_string()
            }
        );
    }

    #[test]
    fn test_switching_collection_keeps_search_open() {
        let mut machine = grid();
        machine.open_search();
        machine.set_search_text("todo");
        machine.state.selected_index = 3;
        assert!(machine.can_switch_collection());
        machine.collection_switched();
        assert_eq!(machine.modal(), &Modal::Search);
        assert_eq!(machine.search_text(), "todo");
        assert_eq!(machine.selected_index(), 0);

        assert!(!editor().can_switch_collection());
    }

    #[test]
    fn test_theme_dialogs_open_from_picker() {
        let mut machine = grid();
        assert!(machine.open_modal(Modal::Themes));
        assert!(!machine.open_modal(Modal::Help));
        assert!(machine.open_modal(Modal::ThemeEditor { key: None }));
        assert!(machine.close_modal());
        assert!(machine.open_modal(Modal::DeleteTheme {
            key: "mine".to_string()
        }));
        assert!(!machine.open_modal(Modal::FirstTimeSetup));
    }

    #[test]
    fn test_navigation_only_on_grid() {
        let mut machine = grid();
        assert!(!machine.navigate(Direction::Down, 0, 4));
        assert!(machine.navigate(Direction::Up, 12, 4));
        assert_eq!(machine.selected_index(), 8);
        assert!(machine.select_last(12));
        assert_eq!(machine.selected_index(), 11);
        assert!(machine.select_first(12));

        let mut machine = editor();
        assert!(!machine.navigate(Direction::Down, 12, 4));
    }

    #[test]
    fn test_navigation_allowed_while_searching() {
        let mut machine = grid();
        machine.open_search();
        assert!(machine.navigate(Direction::Right, 3, 3));
        assert_eq!(machine.selected_index(), 1);
    }

    #[test]
    fn test_text_input_detection() {
        assert!(!grid().accepts_text_input());
        assert!(editor().accepts_text_input());
        let mut machine = grid();
        machine.open_search();
        assert!(machine.accepts_text_input());
        let mut machine = grid();
        machine.open_modal(Modal::Help);
        assert!(!machine.accepts_text_input());
    }

    #[test]
    fn test_global_shortcuts() {
        let mut machine = grid();
        assert!(machine.allows_global_shortcuts());
        machine.open_modal(Modal::Stats);
        assert!(!machine.allows_global_shortcuts());
        assert!(!AppStateMachine::new(true).allows_global_shortcuts());
    }
}
