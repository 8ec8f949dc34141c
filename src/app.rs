//! The application context.
//!
//! `App` owns every store, the state machine, the editor session and the
//! timers. The rendering layer reads state through the accessors, calls
//! the intent methods and subscribes to `ChangeEvent`s. Timer expiries and
//! background results come back as `AppMessage`s on the receiver returned
//! by `App::new`; the owner feeds them to `dispatch` on the same thread
//! that calls the intents.
//!
//! Intents never return errors. Rejected or failed operations return
//! `false` (or `None`) and publish a `Notice` or `SaveFailed` event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::config::{ConfigStore, FontTarget};
use crate::editor::EditorSession;
use crate::error::NoteError;
use crate::events::{AppMessage, ChangeEvent, EventBus};
use crate::fonts::{self, FontCatalog, FontSource, SystemFontSource};
use crate::grid::Direction;
use crate::models::{CollectionInfo, Config, LayoutSettings, Note, NoteCard, Palette, ThemeSummary};
use crate::notes::NoteRepository;
use crate::search::SearchController;
use crate::shortcuts::{Action, KeyCombo, Keymap};
use crate::state::{AppState, AppStateMachine, BackOutcome, Modal, View};
use crate::stats::{self, NoteStats, OverallStats};
use crate::storage::Persistence;
use crate::themes::{self, ThemeStore};
use crate::timers::{Scheduler, TimerEvent, TimerKind};
use crate::window::{self, Viewport};

/// Delay before a burst of config changes is written
const CONFIG_SAVE_DELAY: Duration = Duration::from_millis(500);
/// Focus is handed to the editor after the current layout pass
const FOCUS_DELAY: Duration = Duration::from_millis(10);
const LAYOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_LAYOUT_POLLS: u32 = 10;

pub struct App {
    store: Box<dyn Persistence>,
    font_source: Arc<dyn FontSource>,
    config: ConfigStore,
    themes: ThemeStore,
    notes: NoteRepository,
    fonts: FontCatalog,
    state: AppStateMachine,
    editor: EditorSession,
    search: SearchController,
    keymap: Keymap,
    scheduler: Scheduler,
    events: EventBus,
    sender: UnboundedSender<AppMessage>,
    viewport: Viewport,
    /// Notes changed in memory but the last write failed or is pending
    notes_dirty: bool,
    layout_polls: u32,
    fullscreen: bool,
}

fn load_notes_or_empty(store: &dyn Persistence, collection: &str) -> Vec<Note> {
    store.load_notes(collection).unwrap_or_else(|e| {
        log::error!("Failed to load notes for '{}': {}", collection, e);
        Vec::new()
    })
}

impl App {
    /// Boots the core against `store`, enumerating fonts from the system.
    ///
    /// # Returns
    /// The app and the receiver its timers and workers post to
    pub fn new(store: Box<dyn Persistence>) -> (Self, UnboundedReceiver<AppMessage>) {
        Self::with_font_source(store, Arc::new(SystemFontSource::new()))
    }

    pub fn with_font_source(
        store: Box<dyn Persistence>,
        font_source: Arc<dyn FontSource>,
    ) -> (Self, UnboundedReceiver<AppMessage>) {
        let (sender, receiver) = unbounded_channel();

        let mut config = ConfigStore::load(store.as_ref());
        let themes = ThemeStore::load(store.as_ref(), &config.config().current_theme);
        if themes.active_key() != config.config().current_theme {
            config.set_theme_key(themes.active_key());
        }

        let font_cache = store.load_font_cache().unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable font cache: {}", e);
            None
        });
        let fonts = FontCatalog::from_cache(font_cache, Utc::now());

        let state = AppStateMachine::new(config.collections().needs_first_time_setup());
        let mut notes = NoteRepository::new();
        if let Some(current) = config.collections().current().map(str::to_string) {
            notes.load(&current, load_notes_or_empty(store.as_ref(), &current));
            config.apply_collection_layout();
        }

        let search = SearchController::new(config.config().search_debounce_interval);
        let keymap = Keymap::from_config(&config.config().shortcuts);

        log::info!(
            "Started with {} collections, {} notes in '{}'",
            config.collections().count(),
            notes.total_count(),
            notes.collection().unwrap_or("-")
        );

        let app = Self {
            store,
            font_source,
            config,
            themes,
            notes,
            fonts,
            state,
            editor: EditorSession::new(),
            search,
            keymap,
            scheduler: Scheduler::new(sender.clone()),
            events: EventBus::new(),
            sender,
            viewport: Viewport::default(),
            notes_dirty: false,
            layout_polls: 0,
            fullscreen: false,
        };
        (app, receiver)
    }

    // ---- read access ----

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &AppState {
        self.state.state()
    }

    pub fn view(&self) -> View {
        self.state.view()
    }

    pub fn modal(&self) -> &Modal {
        self.state.modal()
    }

    pub fn selected_index(&self) -> usize {
        self.state.selected_index()
    }

    pub fn search_text(&self) -> &str {
        self.state.search_text()
    }

    pub fn notes(&self) -> &NoteRepository {
        &self.notes
    }

    /// The filtered grid, in display order.
    pub fn cards(&self) -> Vec<NoteCard> {
        self.notes.cards()
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes.get_by_index(self.state.selected_index())
    }

    pub fn editor(&self) -> &EditorSession {
        &self.editor
    }

    pub fn current_collection(&self) -> Option<&str> {
        self.config.collections().current()
    }

    pub fn collection_names(&self) -> &[String] {
        self.config.collections().names()
    }

    /// Rows for the collection dialog, with note counts.
    pub fn collection_info(&self) -> Vec<CollectionInfo> {
        let current = self.config.collections().current();
        self.config
            .collections()
            .names()
            .iter()
            .map(|name| {
                let is_current = current == Some(name.as_str());
                let note_count = if is_current {
                    self.notes.total_count()
                } else {
                    load_notes_or_empty(self.store.as_ref(), name).len()
                };
                CollectionInfo {
                    name: name.clone(),
                    note_count,
                    is_current,
                }
            })
            .collect()
    }

    pub fn config(&self) -> &Config {
        self.config.config()
    }

    /// Columns the grid currently shows; 1 until the grid has been measured.
    pub fn columns(&self) -> usize {
        if !self.viewport.is_ready() {
            return 1;
        }
        window::grid_columns(self.viewport.available_width(), self.config.card_width())
    }

    pub fn layout(&self) -> LayoutSettings {
        self.config.layout(self.columns())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn theme_palette(&self) -> Palette {
        self.themes.active_palette()
    }

    pub fn active_theme(&self) -> &str {
        self.themes.active_key()
    }

    pub fn theme_list(&self) -> Vec<ThemeSummary> {
        self.themes.list_all()
    }

    pub fn current_font(&self) -> &str {
        &self.config.config().font_family
    }

    pub fn available_fonts(&self) -> Vec<String> {
        self.fonts.available()
    }

    pub fn fonts_loading(&self) -> bool {
        self.fonts.is_loading()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Statistics for the open note, or the selected one on the grid.
    pub fn note_stats(&self) -> Option<NoteStats> {
        match self.state.view() {
            View::Editor => Some(stats::note_stats(&self.editor.as_note(&self.notes))),
            View::Grid => self.selected_note().map(stats::note_stats),
        }
    }

    /// Statistics over every collection.
    pub fn overall_stats(&self) -> OverallStats {
        let current = self.config.collections().current();
        let collections: Vec<(String, Vec<Note>)> = self
            .config
            .collections()
            .names()
            .iter()
            .map(|name| {
                let notes = if current == Some(name.as_str()) {
                    self.notes.notes().to_vec()
                } else {
                    load_notes_or_empty(self.store.as_ref(), name)
                };
                (name.clone(), notes)
            })
            .collect();
        stats::overall_stats(&collections, current, Utc::now())
    }

    // ---- plumbing ----

    fn emit(&self, event: ChangeEvent) {
        self.events.emit(event);
    }

    /// Publishes a failed operation and returns `false`.
    fn report(&self, error: NoteError) -> bool {
        match &error {
            NoteError::Persistence(message) => {
                log::error!("{}", message);
                self.emit(ChangeEvent::SaveFailed(message.clone()));
            }
            _ => {
                log::warn!("{}", error);
                self.emit(ChangeEvent::Notice(error.to_string()));
            }
        }
        false
    }

    fn schedule_focus(&mut self) {
        self.scheduler.restart(TimerKind::Focus, FOCUS_DELAY);
    }

    fn schedule_config_save(&mut self) {
        self.scheduler.restart(TimerKind::ConfigSave, CONFIG_SAVE_DELAY);
    }

    fn config_changed(&mut self) {
        self.schedule_config_save();
        self.emit(ChangeEvent::ConfigChanged);
    }

    fn open_modal(&mut self, modal: Modal) -> bool {
        if !self.state.open_modal(modal) {
            return false;
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Writes the current collection's notes.
    fn persist_notes(&mut self) -> bool {
        let Some(collection) = self.notes.collection().map(str::to_string) else {
            return false;
        };
        match self.store.save_notes(&collection, self.notes.notes()) {
            Ok(()) => {
                self.notes_dirty = false;
                true
            }
            Err(e) => {
                self.notes_dirty = true;
                self.report(e)
            }
        }
    }

    fn persist_themes(&mut self) -> bool {
        match self.themes.save(self.store.as_ref()) {
            Ok(()) => true,
            Err(e) => self.report(e),
        }
    }

    /// Commits the editor buffer and writes the notes document.
    ///
    /// Blank content is only reported when the user asked for the save.
    /// The unsaved counter is cleared only once the write succeeded.
    fn save_editor(&mut self, explicit: bool) -> bool {
        self.scheduler.cancel(TimerKind::AutoSave);
        if !self.editor.is_open() {
            return false;
        }

        let outcome = match self.editor.commit(&mut self.notes) {
            Ok(outcome) => outcome,
            Err(NoteError::Validation(message)) if !explicit => {
                log::debug!("Not saving: {}", message);
                return false;
            }
            Err(e) => return self.report(e),
        };
        if outcome.changed() {
            self.notes_dirty = true;
            self.emit(ChangeEvent::NotesChanged);
        }

        let wrote = self.notes_dirty;
        if wrote && !self.persist_notes() {
            return false;
        }
        self.editor.mark_persisted();
        if wrote || explicit {
            self.emit(ChangeEvent::SaveSucceeded);
        }
        true
    }

    /// Saves, closes the editor and selects the note that was open.
    fn leave_editor(&mut self) {
        self.save_editor(false);
        let id = self.editor.note_id();
        self.editor.close();
        self.scheduler.cancel(TimerKind::Focus);

        let total = self.notes.filtered_count();
        self.state.show_grid(total);
        if let Some(index) = self.notes.index_of(id) {
            self.state.select(index, total);
        }
        self.emit(ChangeEvent::StateChanged);
    }

    /// Loads whatever collection the index now calls current.
    fn load_current_collection(&mut self) {
        let Some(name) = self.config.collections().current().map(str::to_string) else {
            self.notes.clear();
            return;
        };
        let notes = load_notes_or_empty(self.store.as_ref(), &name);
        self.notes.load(&name, notes);
        self.notes_dirty = false;
        self.state.collection_switched();
        if self.config.apply_collection_layout() {
            self.emit(ChangeEvent::ConfigChanged);
        }
        self.schedule_config_save();
        log::info!("Switched to collection '{}'", name);

        self.emit(ChangeEvent::CollectionChanged(name));
        self.emit(ChangeEvent::NotesChanged);
        self.emit(ChangeEvent::StateChanged);
    }

    // ---- notes and editor ----

    /// Starts a new note, saving the open one first.
    pub fn create_new_note(&mut self) -> bool {
        if !self.state.can_create_note() || self.notes.collection().is_none() {
            return false;
        }
        if self.state.view() == View::Editor {
            self.save_editor(false);
        }
        if !self.state.enter_new_note() {
            return false;
        }
        self.editor.open_new();
        self.schedule_focus();
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Opens the note at `index` of the filtered grid.
    pub fn open_editor(&mut self, index: usize) -> bool {
        if !self.state.can_open_editor() {
            return false;
        }
        let Some(note) = self.notes.get_by_index(index).cloned() else {
            return false;
        };
        if !self.state.open_editor(index, self.notes.filtered_count()) {
            return false;
        }
        self.editor.open_note(&note);

        // Typed-ahead search text applies before the grid comes back.
        if self.scheduler.is_pending(TimerKind::SearchDebounce) {
            self.scheduler.cancel(TimerKind::SearchDebounce);
            self.search.apply(&mut self.notes);
        }

        self.schedule_focus();
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn open_selected(&mut self) -> bool {
        self.open_editor(self.state.selected_index())
    }

    /// Records the editor text after a keystroke.
    ///
    /// Restarts the auto-save timer, or saves right away once the
    /// unsaved-change limit is reached.
    pub fn edit_content(&mut self, content: &str) -> bool {
        if self.state.view() != View::Editor {
            return false;
        }
        let Some(unsaved) = self.editor.edit(content) else {
            return false;
        };

        let config = self.config.config();
        let limit = config.max_unsaved_changes;
        let auto_save = config.auto_save_enabled;
        let interval = Duration::from_millis(config.auto_save_interval);

        if unsaved >= limit {
            log::debug!("{} unsaved changes, saving now", unsaved);
            self.save_editor(false);
        } else if auto_save {
            self.scheduler.restart(TimerKind::AutoSave, interval);
        }
        true
    }

    /// Saves the open note on request.
    pub fn save(&mut self) -> bool {
        if self.state.view() != View::Editor || !self.state.modal().is_none() {
            return false;
        }
        self.save_editor(true)
    }

    /// Handles back/escape.
    pub fn back(&mut self) -> bool {
        match self.state.back() {
            BackOutcome::Ignored => false,
            BackOutcome::ClosedModal {
                closed,
                refocus_editor,
            } => {
                if closed == Modal::Search {
                    self.clear_search();
                }
                if refocus_editor {
                    self.schedule_focus();
                }
                self.emit(ChangeEvent::StateChanged);
                true
            }
            BackOutcome::LeaveEditor => {
                self.leave_editor();
                true
            }
        }
    }

    /// Dismisses the active modal after its action, without the back semantics.
    pub fn close_modal(&mut self) -> bool {
        let was_search = *self.state.modal() == Modal::Search;
        if !self.state.close_modal() {
            return false;
        }
        if was_search {
            self.clear_search();
        }
        if self.state.view() == View::Editor {
            self.schedule_focus();
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn request_delete(&mut self) -> bool {
        if !self
            .state
            .request_delete(self.notes.filtered_count(), self.editor.is_persisted())
        {
            return false;
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Deletes the selected grid note, or the note open in the editor.
    pub fn confirm_delete(&mut self) -> bool {
        if !self.state.is_delete_pending() {
            return false;
        }
        let target = match self.state.view() {
            View::Editor => Some(self.editor.note_id()),
            View::Grid => self.selected_note().map(|note| note.id),
        };
        let Some(id) = target else {
            self.cancel_delete();
            return false;
        };

        if let Err(e) = self.notes.delete(id) {
            self.cancel_delete();
            return self.report(e);
        }
        log::info!("Deleted note {}", id);

        if self.state.view() == View::Editor {
            self.scheduler.cancel(TimerKind::AutoSave);
            self.scheduler.cancel(TimerKind::Focus);
            self.editor.close();
        }
        self.state.complete_delete(self.notes.filtered_count());
        self.notes_dirty = true;
        self.persist_notes();

        self.emit(ChangeEvent::NotesChanged);
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn cancel_delete(&mut self) -> bool {
        if !self.state.cancel_delete() {
            return false;
        }
        if self.state.view() == View::Editor {
            self.schedule_focus();
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Deletes without showing the confirmation.
    pub fn quick_delete(&mut self) -> bool {
        self.request_delete() && self.confirm_delete()
    }

    /// Confirms whichever deletion dialog is showing.
    pub fn confirm(&mut self) -> bool {
        match self.state.modal() {
            Modal::Delete => self.confirm_delete(),
            Modal::DeleteCollection { .. } => self.confirm_delete_collection(),
            Modal::DeleteTheme { .. } => self.confirm_delete_theme(),
            _ => false,
        }
    }

    /// Declines whichever deletion dialog is showing.
    pub fn decline(&mut self) -> bool {
        match self.state.modal() {
            Modal::Delete => self.cancel_delete(),
            Modal::DeleteCollection { .. } | Modal::DeleteTheme { .. } => self.close_modal(),
            _ => false,
        }
    }

    // ---- grid navigation ----

    pub fn navigate(&mut self, direction: Direction) -> bool {
        let columns = self.columns();
        if !self
            .state
            .navigate(direction, self.notes.filtered_count(), columns)
        {
            return false;
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn select_first(&mut self) -> bool {
        let moved = self.state.select_first(self.notes.filtered_count());
        if moved {
            self.emit(ChangeEvent::StateChanged);
        }
        moved
    }

    pub fn select_last(&mut self) -> bool {
        let moved = self.state.select_last(self.notes.filtered_count());
        if moved {
            self.emit(ChangeEvent::StateChanged);
        }
        moved
    }

    /// Selects a card, e.g. after a click.
    pub fn select(&mut self, index: usize) -> bool {
        let moved = self.state.select(index, self.notes.filtered_count());
        if moved {
            self.emit(ChangeEvent::StateChanged);
        }
        moved
    }

    // ---- search ----

    pub fn open_search(&mut self) -> bool {
        if !self.state.open_search() {
            return false;
        }
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Records search text; the filter follows after the debounce interval.
    pub fn search_text_changed(&mut self, text: &str) -> bool {
        if !self.state.set_search_text(text) {
            return false;
        }
        if self.search.text_changed(text) {
            self.scheduler
                .restart(TimerKind::SearchDebounce, self.search.debounce());
        }
        true
    }

    fn apply_search(&mut self) {
        if !self.search.apply(&mut self.notes) {
            return;
        }
        let total = self.notes.filtered_count();
        self.state.clamp_selection(total);
        self.state.select_first(total);
        self.emit(ChangeEvent::NotesChanged);
        self.emit(ChangeEvent::StateChanged);
    }

    fn clear_search(&mut self) {
        self.scheduler.cancel(TimerKind::SearchDebounce);
        if self.search.clear(&mut self.notes) {
            self.state.clamp_selection(self.notes.filtered_count());
            self.emit(ChangeEvent::NotesChanged);
        }
    }

    // ---- collections ----

    /// Creates the first collection and leaves first-time setup.
    pub fn setup_first_collection(&mut self, name: &str) -> bool {
        if *self.state.modal() != Modal::FirstTimeSetup {
            return false;
        }
        if let Err(e) = self.config.collections().validate_name(name) {
            return self.report(e);
        }
        let settings = self.config.default_collection_settings();
        let name = match self.config.collections_mut().setup_first(name, settings) {
            Ok(name) => name,
            Err(e) => return self.report(e),
        };
        log::info!("Created first collection '{}'", name);

        let notes = load_notes_or_empty(self.store.as_ref(), &name);
        self.notes.load(&name, notes);
        self.notes_dirty = true;
        self.persist_notes();
        self.state.finish_first_time_setup();
        self.flush();

        self.emit(ChangeEvent::CollectionsChanged);
        self.emit(ChangeEvent::CollectionChanged(name));
        self.emit(ChangeEvent::NotesChanged);
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn open_new_collection(&mut self) -> bool {
        let was_searching = *self.state.modal() == Modal::Search;
        if !self.state.open_new_collection() {
            return false;
        }
        self.collection_dialog_opened(was_searching);
        true
    }

    /// A collection dialog replaced the search bar, which takes its filter along.
    fn collection_dialog_opened(&mut self, was_searching: bool) {
        if was_searching {
            self.clear_search();
        }
        self.emit(ChangeEvent::StateChanged);
    }

    /// Creates the collection named in the new-collection dialog and
    /// switches to it when the grid is showing.
    pub fn submit_new_collection(&mut self, name: &str) -> bool {
        if *self.state.modal() != Modal::NewCollection {
            return false;
        }
        if let Err(e) = self.config.collections().validate_name(name) {
            return self.report(e);
        }
        let settings = self.config.default_collection_settings();
        let name = match self.config.collections_mut().create(name, settings) {
            Ok(name) => name,
            Err(e) => return self.report(e),
        };
        log::info!("Created collection '{}'", name);

        self.state.close_modal();
        self.schedule_config_save();
        self.emit(ChangeEvent::CollectionsChanged);
        if !self.switch_collection(&name) {
            self.emit(ChangeEvent::StateChanged);
        }
        true
    }

    /// Makes `name` the current collection.
    ///
    /// Allowed from the grid with no modal or with the search bar, which
    /// stays open and filters the new collection.
    pub fn switch_collection(&mut self, name: &str) -> bool {
        if !self.state.can_switch_collection() {
            return false;
        }
        if self.config.collections().current() == Some(name) {
            return false;
        }
        if !self.config.collections().contains(name) {
            return self.report(NoteError::NotFound(format!("collection '{}'", name)));
        }
        if self.notes_dirty {
            self.persist_notes();
        }
        if let Err(e) = self.config.collections_mut().switch(name) {
            return self.report(e);
        }
        self.load_current_collection();
        true
    }

    pub fn next_collection(&mut self) -> bool {
        self.cycle_collection(true)
    }

    pub fn previous_collection(&mut self) -> bool {
        self.cycle_collection(false)
    }

    fn cycle_collection(&mut self, forward: bool) -> bool {
        match self.config.collections().neighbour(forward) {
            Some(name) => self.switch_collection(&name),
            None => false,
        }
    }

    pub fn open_rename_collection(&mut self) -> bool {
        let Some(current) = self.config.collections().current().map(str::to_string) else {
            return false;
        };
        let was_searching = *self.state.modal() == Modal::Search;
        if !self.state.open_rename_collection(&current) {
            return false;
        }
        self.collection_dialog_opened(was_searching);
        true
    }

    /// Renames the collection the rename dialog was opened for.
    pub fn submit_rename_collection(&mut self, new_name: &str) -> bool {
        let Modal::RenameCollection { from } = self.state.modal().clone() else {
            return false;
        };
        if new_name.trim() == from {
            return self.close_modal();
        }
        if let Err(e) = self.config.collections().validate_name(new_name) {
            return self.report(e);
        }
        let new_name = match self.config.collections_mut().rename(&from, new_name) {
            Ok(name) => name,
            Err(e) => return self.report(e),
        };
        log::info!("Renamed collection '{}' to '{}'", from, new_name);

        let renamed_file = match self.store.rename_notes(&from, &new_name) {
            Ok(()) => true,
            Err(e) => self.report(e),
        };
        if self.notes.collection() == Some(from.as_str()) {
            let notes = self.notes.notes().to_vec();
            self.notes.load(&new_name, notes);
            if !renamed_file {
                self.notes_dirty = true;
                self.persist_notes();
            }
            self.emit(ChangeEvent::CollectionChanged(new_name));
        }

        self.state.close_modal();
        self.flush();
        self.emit(ChangeEvent::CollectionsChanged);
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Asks to delete the current collection. Never offered for the last one.
    pub fn open_delete_collection(&mut self) -> bool {
        let Some(current) = self.config.collections().current().map(str::to_string) else {
            return false;
        };
        let count = self.config.collections().count();
        let was_searching = *self.state.modal() == Modal::Search;
        if !self.state.open_delete_collection(&current, count) {
            return false;
        }
        self.collection_dialog_opened(was_searching);
        true
    }

    /// Deletes the collection named by the confirmation dialog.
    ///
    /// Its notes file is archived, not removed. When it was current, the
    /// first remaining collection is loaded.
    pub fn confirm_delete_collection(&mut self) -> bool {
        let Modal::DeleteCollection { name } = self.state.modal().clone() else {
            return false;
        };
        let deleting_current = self.config.collections().current() == Some(name.as_str());
        if deleting_current {
            if self.state.view() == View::Editor {
                self.leave_editor();
            } else if self.notes_dirty {
                self.persist_notes();
            }
        }
        self.state.close_modal();

        let new_current = match self.config.collections_mut().delete(&name) {
            Ok(current) => current,
            Err(e) => {
                self.emit(ChangeEvent::StateChanged);
                return self.report(e);
            }
        };
        log::info!("Deleted collection '{}'", name);
        if let Err(e) = self.store.archive_notes(&name) {
            self.report(e);
        }

        if new_current.is_some() {
            self.load_current_collection();
        }
        self.flush();
        self.emit(ChangeEvent::CollectionsChanged);
        self.emit(ChangeEvent::StateChanged);
        true
    }

    // ---- themes ----

    pub fn set_theme(&mut self, key: &str) -> bool {
        match self.themes.set_active(key) {
            Ok(true) => {
                self.config.set_theme_key(key);
                log::info!("Theme set to '{}'", key);
                self.config_changed();
                true
            }
            Ok(false) => false,
            Err(e) => self.report(e),
        }
    }

    pub fn cycle_theme(&mut self, forward: bool) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        let key = self.themes.neighbour(forward);
        self.set_theme(&key)
    }

    pub fn open_themes(&mut self) -> bool {
        self.open_modal(Modal::Themes)
    }

    /// Opens the theme editor for `key`, or for a new theme.
    pub fn open_theme_editor(&mut self, key: Option<&str>) -> bool {
        if let Some(key) = key {
            if !self.themes.contains(key) {
                return self.report(NoteError::NotFound(format!("theme '{}'", key)));
            }
        }
        self.open_modal(Modal::ThemeEditor {
            key: key.map(str::to_string),
        })
    }

    /// Stores the theme editor's result and makes it active.
    ///
    /// Edits of a built-in theme are saved as a new user theme.
    pub fn submit_theme_editor(&mut self, name: &str, palette: Palette) -> bool {
        let Modal::ThemeEditor { key } = self.state.modal().clone() else {
            return false;
        };
        let result = match key.as_deref() {
            Some(key) if !themes::is_builtin(key) => self
                .themes
                .update(key, name, palette)
                .map(|()| key.to_string()),
            _ => self.themes.create(None, name, palette),
        };
        let key = match result {
            Ok(key) => key,
            Err(e) => return self.report(e),
        };

        self.persist_themes();
        self.state.close_modal();
        self.emit(ChangeEvent::ThemesChanged);
        self.set_theme(&key);
        self.emit(ChangeEvent::StateChanged);
        true
    }

    /// Creates a user theme.
    ///
    /// # Returns
    /// The key of the new theme, or `None` if it was rejected
    pub fn create_theme(&mut self, key: Option<&str>, name: &str, palette: Palette) -> Option<String> {
        match self.themes.create(key, name, palette) {
            Ok(key) => {
                log::info!("Created theme '{}'", key);
                self.persist_themes();
                self.emit(ChangeEvent::ThemesChanged);
                Some(key)
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    pub fn update_theme(&mut self, key: &str, name: &str, palette: Palette) -> bool {
        if let Err(e) = self.themes.update(key, name, palette) {
            return self.report(e);
        }
        self.persist_themes();
        self.emit(ChangeEvent::ThemesChanged);
        if self.themes.active_key() == key {
            self.emit(ChangeEvent::ConfigChanged);
        }
        true
    }

    pub fn rename_theme(&mut self, key: &str, new_name: &str) -> bool {
        if let Err(e) = self.themes.rename(key, new_name) {
            return self.report(e);
        }
        self.persist_themes();
        self.emit(ChangeEvent::ThemesChanged);
        true
    }

    /// Deletes a user theme, moving the active theme if needed.
    pub fn delete_theme(&mut self, key: &str) -> bool {
        let new_active = match self.themes.delete(key) {
            Ok(new_active) => new_active,
            Err(e) => return self.report(e),
        };
        log::info!("Deleted theme '{}'", key);
        if let Some(active) = new_active {
            self.config.set_theme_key(&active);
            self.config_changed();
        }
        self.persist_themes();
        self.emit(ChangeEvent::ThemesChanged);
        true
    }

    /// Asks to delete a user theme.
    pub fn request_delete_theme(&mut self, key: &str) -> bool {
        if themes::is_builtin(key) {
            return self.report(NoteError::rejected(format!(
                "Built-in theme '{}' cannot be deleted",
                key
            )));
        }
        self.open_modal(Modal::DeleteTheme {
            key: key.to_string(),
        })
    }

    pub fn confirm_delete_theme(&mut self) -> bool {
        let Modal::DeleteTheme { key } = self.state.modal().clone() else {
            return false;
        };
        self.state.close_modal();
        let deleted = self.delete_theme(&key);
        self.emit(ChangeEvent::StateChanged);
        deleted
    }

    // ---- fonts ----

    /// Starts enumerating installed fonts unless the list is known or pending.
    pub fn preload_fonts(&mut self) -> bool {
        if !self.fonts.needs_loading() {
            return false;
        }
        self.fonts.mark_loading();
        fonts::spawn_font_enumeration(Arc::clone(&self.font_source), self.sender.clone());
        true
    }

    /// Takes the enumerated font list and caches it.
    pub fn fonts_loaded(&mut self, families: Vec<String>) {
        if let Some(cache) = self.fonts.loaded(families, Utc::now()) {
            if let Err(e) = self.store.save_font_cache(&cache) {
                log::warn!("Failed to cache font list: {}", e);
            }
        }
        self.emit(ChangeEvent::FontsUpdated);
    }

    pub fn set_font(&mut self, family: &str) -> bool {
        match self.config.set_font_family(family) {
            Ok(true) => {
                log::info!("Font set to '{}'", family.trim());
                self.config_changed();
                true
            }
            Ok(false) => false,
            Err(e) => self.report(e),
        }
    }

    pub fn cycle_font(&mut self, forward: bool) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        let current = self.config.config().font_family.clone();
        match self.fonts.neighbour(&current, forward) {
            Some(family) => self.set_font(&family),
            None => false,
        }
    }

    pub fn open_font_selection(&mut self) -> bool {
        if !self.open_modal(Modal::Fonts) {
            return false;
        }
        self.preload_fonts();
        true
    }

    // ---- layout ----

    pub fn step_font_size(&mut self, target: FontTarget, increase: bool) -> bool {
        if !self.state.allows_global_shortcuts() || !self.config.step_font_size(target, increase) {
            return false;
        }
        self.config_changed();
        true
    }

    pub fn step_card_height(&mut self, increase: bool) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        let height = window::step_card_height(self.config.card_height(), increase);
        if !self.config.set_card_height(height) {
            return false;
        }
        self.config_changed();
        true
    }

    pub fn increase_columns(&mut self) -> bool {
        if !self.state.allows_global_shortcuts() || !self.viewport.is_ready() {
            return false;
        }
        match window::columns_after_increase(
            self.viewport.available_width(),
            self.config.card_width(),
            self.notes.filtered_count(),
        ) {
            Some(columns) => self.apply_columns(columns),
            None => false,
        }
    }

    pub fn decrease_columns(&mut self) -> bool {
        if !self.state.allows_global_shortcuts() || !self.viewport.is_ready() {
            return false;
        }
        match window::columns_after_decrease(
            self.viewport.available_width(),
            self.config.card_width(),
        ) {
            Some(columns) => self.apply_columns(columns),
            None => false,
        }
    }

    /// Picks a readable column count for the visible notes.
    ///
    /// Before the grid has been measured this polls for the measurement a
    /// bounded number of times and returns `false`.
    pub fn optimize_card_width(&mut self) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        if !self.viewport.is_ready() {
            self.layout_polls = 0;
            self.scheduler
                .restart(TimerKind::LayoutPoll, LAYOUT_POLL_INTERVAL);
            return false;
        }
        self.optimize_now()
    }

    fn optimize_now(&mut self) -> bool {
        match window::optimal_columns(self.viewport.available_width(), self.notes.filtered_count()) {
            Some(columns) => self.apply_columns(columns),
            None => false,
        }
    }

    fn poll_layout(&mut self) {
        if self.viewport.is_ready() {
            self.optimize_now();
            return;
        }
        self.layout_polls += 1;
        if self.layout_polls < MAX_LAYOUT_POLLS {
            self.scheduler
                .restart(TimerKind::LayoutPoll, LAYOUT_POLL_INTERVAL);
        } else {
            log::debug!("Grid was never measured, skipping column optimisation");
        }
    }

    fn apply_columns(&mut self, columns: u32) -> bool {
        let width = window::card_width_for_columns(self.viewport.available_width(), columns);
        let changed = self.config.set_card_width(width);
        self.config.set_preferred_columns(columns);
        if changed {
            log::debug!("Showing {} columns of {}px cards", columns, width);
            self.state.clamp_selection(self.notes.filtered_count());
            self.config_changed();
        }
        changed
    }

    /// Records the measured grid geometry.
    pub fn set_viewport(&mut self, grid_width: u32, left_margin: u32) -> bool {
        let viewport = Viewport::new(grid_width, left_margin);
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.emit(ChangeEvent::StateChanged);
        true
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) -> bool {
        if !self.config.set_window_size(width, height) {
            return false;
        }
        self.config_changed();
        true
    }

    // ---- everything else ----

    pub fn toggle_auto_save(&mut self) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        let enabled = !self.config.config().auto_save_enabled;
        self.config.set_auto_save_enabled(enabled);
        if !enabled {
            self.scheduler.cancel(TimerKind::AutoSave);
        }
        let label = if enabled { "enabled" } else { "disabled" };
        log::info!("Auto-save {}", label);
        self.emit(ChangeEvent::Notice(format!("Auto-save {}", label)));
        self.config_changed();
        true
    }

    pub fn open_help(&mut self) -> bool {
        self.open_modal(Modal::Help)
    }

    pub fn open_stats(&mut self) -> bool {
        self.open_modal(Modal::Stats)
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        if !self.state.allows_global_shortcuts() {
            return false;
        }
        self.fullscreen = !self.fullscreen;
        self.emit(ChangeEvent::FullscreenToggled);
        true
    }

    /// Flushes everything and asks the host to exit.
    pub fn quit(&mut self) -> bool {
        self.shutdown();
        self.emit(ChangeEvent::QuitRequested);
        true
    }

    /// Writes every dirty document now.
    ///
    /// # Returns
    /// `true` if every write succeeded
    pub fn flush(&mut self) -> bool {
        self.scheduler.cancel(TimerKind::ConfigSave);
        let mut ok = true;
        if self.notes_dirty {
            ok &= self.persist_notes();
        }
        if let Err(e) = self.config.save(self.store.as_ref()) {
            ok = self.report(e);
        }
        ok &= self.persist_themes();
        ok
    }

    /// Cancels all timers, saves an open editor and flushes.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        if self.state.view() == View::Editor {
            self.save_editor(false);
        }
        if self.flush() {
            log::info!("Shut down cleanly");
        }
    }

    // ---- messages and keys ----

    /// Routes a message from the app's receiver.
    pub fn dispatch(&mut self, message: AppMessage) -> bool {
        match message {
            AppMessage::Timer(event) => self.handle_timer(event),
            AppMessage::FontsLoaded(families) => {
                self.fonts_loaded(families);
                true
            }
        }
    }

    /// Runs an expired timer.
    ///
    /// # Returns
    /// `false` for stale events of restarted or cancelled timers
    pub fn handle_timer(&mut self, event: TimerEvent) -> bool {
        if !self.scheduler.accept(event) {
            log::trace!("Dropping stale {:?} timer", event.kind);
            return false;
        }
        log::debug!("Timer {:?} fired", event.kind);
        match event.kind {
            TimerKind::AutoSave => {
                if self.state.view() == View::Editor && self.config.config().auto_save_enabled {
                    self.save_editor(false);
                }
            }
            TimerKind::SearchDebounce => self.apply_search(),
            TimerKind::Focus => {
                if self.state.view() == View::Editor {
                    self.emit(ChangeEvent::FocusEditor);
                }
            }
            TimerKind::LayoutPoll => self.poll_layout(),
            TimerKind::ConfigSave => {
                self.flush();
            }
        }
        true
    }

    /// Runs the first action bound to `combo` that is legal right now.
    ///
    /// Printable keys are left to the text field that has focus.
    pub fn handle_key(&mut self, combo: &KeyCombo) -> bool {
        if combo.is_text_input() && self.state.accepts_text_input() {
            return false;
        }
        let actions = self.keymap.resolve(combo).to_vec();
        for action in actions {
            if self.perform(action) {
                log::debug!("{} handled by {}", combo, action.name());
                return true;
            }
        }
        false
    }

    /// Runs one action through its guarded intent.
    pub fn perform(&mut self, action: Action) -> bool {
        match action {
            Action::NewNote => self.create_new_note(),
            Action::Save => self.save(),
            Action::Back => self.back(),
            Action::Delete => self.request_delete(),
            Action::ConfirmDelete => self.confirm(),
            Action::CancelDelete => self.decline(),
            Action::QuickDelete => self.quick_delete(),
            Action::Search => self.open_search(),
            Action::NextNote => self.navigate(Direction::Down),
            Action::PrevNote => self.navigate(Direction::Up),
            Action::NextNoteHorizontal => self.navigate(Direction::Right),
            Action::PrevNoteHorizontal => self.navigate(Direction::Left),
            Action::OpenNote => self.open_selected(),
            Action::FirstNote => self.select_first(),
            Action::LastNote => self.select_last(),
            Action::Quit => self.quit(),
            Action::Help => self.open_help(),
            Action::ToggleFullscreen => self.toggle_fullscreen(),
            Action::OptimizeCardWidth => self.optimize_card_width(),
            Action::IncreaseCardTitleFontSize => self.step_font_size(FontTarget::CardTitle, true),
            Action::DecreaseCardTitleFontSize => self.step_font_size(FontTarget::CardTitle, false),
            Action::IncreaseFontSize => self.step_font_size(FontTarget::Editor, true),
            Action::DecreaseFontSize => self.step_font_size(FontTarget::Editor, false),
            Action::IncreaseCardFontSize => self.step_font_size(FontTarget::Card, true),
            Action::DecreaseCardFontSize => self.step_font_size(FontTarget::Card, false),
            Action::IncreaseCardHeight => self.step_card_height(true),
            Action::DecreaseCardHeight => self.step_card_height(false),
            Action::ThemeCycle => self.cycle_theme(true),
            Action::ThemeCycleBackward => self.cycle_theme(false),
            Action::FontCycle => self.cycle_font(true),
            Action::FontCycleBackward => self.cycle_font(false),
            Action::FontSelection => self.open_font_selection(),
            Action::NewCollection => self.open_new_collection(),
            Action::NextCollection => self.next_collection(),
            Action::PrevCollection => self.previous_collection(),
            Action::DeleteCollection => self.open_delete_collection(),
            Action::RenameCollection => self.open_rename_collection(),
            Action::ShowStats => self.open_stats(),
            Action::IncreaseColumns => self.increase_columns(),
            Action::DecreaseColumns => self.decrease_columns(),
            Action::ToggleAutoSave => self.toggle_auto_save(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::FileSystem;
    use crate::shortcuts::parse_shortcut;
    use crate::storage::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    struct FixedFonts;

    impl FontSource for FixedFonts {
        fn list_installed_fonts(&self) -> Vec<String> {
            vec!["Zed Mono".to_string(), "Alpha Sans".to_string()]
        }
    }

    fn note(id: i64, content: &str, age_minutes: i64) -> Note {
        let at = Utc::now() - ChronoDuration::minutes(age_minutes);
        Note {
            id,
            title: String::new(),
            content: content.to_string(),
            created: at,
            modified: at,
        }
    }

    fn boot(store: &Arc<MemoryStore>) -> App {
        let (app, _receiver) = App::with_font_source(Box::new(Arc::clone(store)), Arc::new(FixedFonts));
        app
    }

    fn inbox() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new().with_collection("Inbox", Vec::new()))
    }

    fn inbox_with(contents: &[&str]) -> Arc<MemoryStore> {
        // first content is the most recently modified
        let notes = contents
            .iter()
            .enumerate()
            .map(|(i, c)| note(i as i64, c, i as i64))
            .collect();
        Arc::new(MemoryStore::new().with_collection("Inbox", notes))
    }

    fn key(app: &mut App, combo: &str) -> bool {
        app.handle_key(&parse_shortcut(combo).unwrap())
    }

    fn fire(app: &mut App, kind: TimerKind) -> bool {
        let event = app.scheduler.pending_event(kind).unwrap();
        app.handle_timer(event)
    }

    fn drain(receiver: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_first_run_starts_in_setup_and_back_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let mut app = boot(&store);

        assert_eq!(*app.modal(), Modal::FirstTimeSetup);
        assert!(!app.back());
        assert_eq!(*app.modal(), Modal::FirstTimeSetup);
        assert!(!app.create_new_note());
        assert!(!app.open_search());
    }

    #[test]
    fn test_setup_first_collection() {
        let store = Arc::new(MemoryStore::new());
        let mut app = boot(&store);

        assert!(!app.setup_first_collection("   "));
        assert_eq!(*app.modal(), Modal::FirstTimeSetup);

        assert!(app.setup_first_collection(" Journal "));
        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.current_collection(), Some("Journal"));
        let stored = store.stored_collections().unwrap();
        assert_eq!(stored.collections, vec!["Journal"]);
        assert_eq!(stored.current_collection, "Journal");
        assert!(!app.setup_first_collection("Other"));
    }

    #[test]
    fn test_new_note_scenario() {
        let store = inbox();
        let mut app = boot(&store);

        assert!(app.create_new_note());
        assert_eq!(app.view(), View::Editor);
        assert_eq!(app.editor().note_id(), crate::models::NEW_NOTE_ID);

        assert!(app.edit_content("Hello\nWorld"));
        assert!(app.save());

        let saved = app.notes().get_by_index(0).unwrap();
        assert_eq!(saved.title, "Hello");
        assert_eq!(saved.content, "Hello\nWorld");
        assert_eq!(app.notes().total_count(), 1);
        assert_eq!(store.stored_notes("Inbox").unwrap().len(), 1);
        assert_eq!(app.editor().unsaved_changes(), 0);
    }

    #[test]
    fn test_leaving_blank_new_note_creates_nothing() {
        let store = inbox();
        let mut app = boot(&store);
        let mut events = app.subscribe();

        app.create_new_note();
        app.edit_content("  ");
        assert!(app.back());
        assert_eq!(app.view(), View::Grid);
        assert_eq!(app.notes().total_count(), 0);
        assert!(!drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::Notice(_))));
    }

    #[test]
    fn test_explicit_blank_save_is_reported() {
        let mut app = boot(&inbox());
        let mut events = app.subscribe();

        app.create_new_note();
        assert!(!app.save());
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::Notice(_))));
        assert_eq!(app.view(), View::Editor);
    }

    #[test]
    fn test_failed_save_keeps_unsaved_changes() {
        let store = inbox();
        let mut app = boot(&store);
        let mut events = app.subscribe();

        app.create_new_note();
        app.edit_content("draft");
        store.set_fail_writes(true);
        assert!(!app.save());
        assert_eq!(app.editor().unsaved_changes(), 1);
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::SaveFailed(_))));
        // the note exists in memory and keeps its id
        assert_eq!(app.notes().total_count(), 1);

        store.set_fail_writes(false);
        assert!(app.save());
        assert_eq!(app.editor().unsaved_changes(), 0);
        assert_eq!(store.stored_notes("Inbox").unwrap().len(), 1);
    }

    #[test]
    fn test_unsaved_limit_forces_save() {
        let store = inbox();
        let mut app = boot(&store);
        let limit = app.config().max_unsaved_changes;

        app.create_new_note();
        for i in 1..limit {
            app.edit_content(&format!("text {}", i));
        }
        assert!(store.stored_notes("Inbox").unwrap().is_empty());
        assert!(app.scheduler.is_pending(TimerKind::AutoSave));

        app.edit_content("final");
        assert_eq!(store.stored_notes("Inbox").unwrap()[0].content, "final");
        assert!(!app.scheduler.is_pending(TimerKind::AutoSave));
    }

    #[test]
    fn test_auto_save_timer_saves() {
        let store = inbox();
        let mut app = boot(&store);
        app.create_new_note();
        app.edit_content("typed");

        assert!(fire(&mut app, TimerKind::AutoSave));
        assert_eq!(store.stored_notes("Inbox").unwrap()[0].content, "typed");
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut app = boot(&inbox());
        app.create_new_note();
        app.edit_content("a");
        let stale = app.scheduler.pending_event(TimerKind::AutoSave).unwrap();
        app.edit_content("ab");
        assert!(!app.handle_timer(stale));
        assert!(fire(&mut app, TimerKind::AutoSave));
    }

    #[test]
    fn test_toggle_auto_save_cancels_timer() {
        let mut app = boot(&inbox());
        app.create_new_note();
        app.edit_content("a");
        assert!(app.toggle_auto_save());
        assert!(!app.config().auto_save_enabled);
        assert!(!app.scheduler.is_pending(TimerKind::AutoSave));
        app.edit_content("ab");
        assert!(!app.scheduler.is_pending(TimerKind::AutoSave));
    }

    #[test]
    fn test_back_from_editor_selects_edited_note() {
        let store = inbox_with(&["one", "two", "three"]);
        let mut app = boot(&store);

        assert!(app.open_editor(2));
        app.edit_content("three, edited");
        assert!(app.back());
        assert_eq!(app.view(), View::Grid);
        // the edited note moved to the front
        assert_eq!(app.selected_index(), 0);
        assert_eq!(app.selected_note().unwrap().content, "three, edited");
    }

    #[test]
    fn test_delete_from_grid_clamps_selection() {
        let store = inbox_with(&["one", "two", "three"]);
        let mut app = boot(&store);

        assert!(app.select_last());
        assert!(app.request_delete());
        assert_eq!(*app.modal(), Modal::Delete);
        assert!(app.confirm_delete());

        assert_eq!(app.notes().total_count(), 2);
        assert_eq!(app.selected_index(), 1);
        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(store.stored_notes("Inbox").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_from_editor_returns_to_grid() {
        let mut app = boot(&inbox_with(&["one", "two"]));
        app.open_editor(0);
        assert!(app.request_delete());
        assert!(app.confirm_delete());
        assert_eq!(app.view(), View::Grid);
        assert!(!app.editor().is_open());
        assert_eq!(app.notes().total_count(), 1);
    }

    #[test]
    fn test_new_note_cannot_be_deleted() {
        let mut app = boot(&inbox_with(&["one"]));
        app.create_new_note();
        assert!(!app.request_delete());
        assert!(!app.confirm_delete());
    }

    #[test]
    fn test_deleting_last_collection_fails() {
        let store = inbox();
        let mut app = boot(&store);

        assert!(!app.open_delete_collection());
        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.collection_names(), ["Inbox".to_string()]);
    }

    #[test]
    fn test_collection_lifecycle() {
        let store = inbox_with(&["inbox note"]);
        let mut app = boot(&store);

        assert!(app.open_new_collection());
        assert!(!app.submit_new_collection("Inbox"));
        assert_eq!(*app.modal(), Modal::NewCollection);
        assert!(app.submit_new_collection("Work"));
        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.current_collection(), Some("Work"));
        assert_eq!(app.notes().total_count(), 0);

        assert!(app.open_rename_collection());
        assert!(app.submit_rename_collection("Projects"));
        assert_eq!(app.current_collection(), Some("Projects"));
        assert_eq!(app.notes().collection(), Some("Projects"));

        assert!(app.open_delete_collection());
        assert!(app.confirm_delete_collection());
        assert_eq!(app.current_collection(), Some("Inbox"));
        assert_eq!(app.notes().total_count(), 1);
        assert_eq!(store.archived(), vec!["Projects"]);

        let info = app.collection_info();
        assert_eq!(info.len(), 1);
        assert!(info[0].is_current);
        assert_eq!(info[0].note_count, 1);
    }

    #[test]
    fn test_switching_collection_keeps_search_open() {
        let store = Arc::new(
            MemoryStore::new()
                .with_collection("Inbox", vec![note(0, "apple", 0), note(1, "pear", 1)])
                .with_collection("Work", vec![note(0, "apple tart", 0), note(1, "plum", 1)]),
        );
        let mut app = boot(&store);

        assert!(app.open_search());
        assert!(app.search_text_changed("apple"));
        fire(&mut app, TimerKind::SearchDebounce);
        assert_eq!(app.notes().filtered_count(), 1);

        assert!(app.next_collection());
        assert_eq!(*app.modal(), Modal::Search);
        assert_eq!(app.current_collection(), Some("Work"));
        assert_eq!(app.search_text(), "apple");
        assert_eq!(app.notes().filtered_count(), 1);
    }

    #[test]
    fn test_search_debounce_and_back_clears() {
        let mut app = boot(&inbox_with(&["apple pie", "banana", "apple juice"]));

        assert!(!app.search_text_changed("x"));
        assert!(app.open_search());
        app.search_text_changed("apple");
        assert_eq!(app.notes().filtered_count(), 3);
        fire(&mut app, TimerKind::SearchDebounce);
        assert_eq!(app.notes().filtered_count(), 2);

        assert!(app.back());
        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.search_text(), "");
        assert_eq!(app.notes().filtered_count(), 3);
    }

    #[test]
    fn test_open_editor_from_search() {
        let mut app = boot(&inbox_with(&["apple pie", "banana"]));
        app.open_search();
        app.search_text_changed("banana");
        fire(&mut app, TimerKind::SearchDebounce);

        assert!(key(&mut app, "Return"));
        assert_eq!(app.view(), View::Editor);
        assert_eq!(app.editor().content(), "banana");
    }

    #[test]
    fn test_navigation_uses_measured_columns() {
        let contents: Vec<String> = (0..10).map(|i| format!("note {}", i)).collect();
        let refs: Vec<&str> = contents.iter().map(|c| c.as_str()).collect();
        let mut app = boot(&inbox_with(&refs));

        // unmeasured grid: one column, down moves by one
        assert!(app.navigate(Direction::Down));
        assert_eq!(app.selected_index(), 1);

        app.set_viewport(1000, 30);
        app.apply_columns(4);
        assert_eq!(app.columns(), 4);
        assert!(app.navigate(Direction::Down));
        assert_eq!(app.selected_index(), 5);
        assert!(app.select_last());
        assert_eq!(app.selected_index(), 9);
    }

    #[test]
    fn test_keys_respect_text_input() {
        let mut app = boot(&inbox_with(&["one", "two"]));

        assert!(key(&mut app, "J"));
        assert_eq!(app.selected_index(), 1);
        assert!(key(&mut app, "Space"));
        assert_eq!(app.view(), View::Editor);
        // typing in the editor
        assert!(!key(&mut app, "J"));
        assert!(!key(&mut app, "Y"));
        assert!(key(&mut app, "Escape"));
        assert_eq!(app.view(), View::Grid);
    }

    #[test]
    fn test_confirm_keys() {
        let mut app = boot(&inbox_with(&["one", "two"]));
        assert!(key(&mut app, "Delete"));
        assert!(key(&mut app, "N"));
        assert_eq!(app.notes().total_count(), 2);
        assert!(key(&mut app, "Delete"));
        assert!(key(&mut app, "Y"));
        assert_eq!(app.notes().total_count(), 1);
    }

    #[test]
    fn test_modal_blocks_global_shortcuts() {
        let mut app = boot(&inbox());
        let size = app.config().font_size;
        assert!(key(&mut app, "F1"));
        assert_eq!(*app.modal(), Modal::Help);
        assert!(!key(&mut app, "Ctrl+="));
        assert_eq!(app.config().font_size, size);
        assert!(key(&mut app, "Escape"));
        assert!(key(&mut app, "Ctrl+="));
        assert_eq!(app.config().font_size, size + 1);
        assert!(app.scheduler.is_pending(TimerKind::ConfigSave));
    }

    #[test]
    fn test_config_save_timer_writes_config() {
        let store = inbox();
        let mut app = boot(&store);
        app.step_card_height(true);
        assert!(fire(&mut app, TimerKind::ConfigSave));
        let stored = store.stored_config().unwrap();
        assert_eq!(stored.card_height, app.config().card_height);
    }

    #[test]
    fn test_theme_cycle_and_fork_of_builtin() {
        let store = inbox();
        let mut app = boot(&store);
        assert_eq!(app.active_theme(), themes::DEFAULT_THEME);

        assert!(app.cycle_theme(true));
        assert_ne!(app.active_theme(), themes::DEFAULT_THEME);
        assert_eq!(app.config().current_theme, app.active_theme());

        let palette = app.theme_palette();
        assert!(app.open_themes());
        assert!(app.open_theme_editor(Some(themes::DEFAULT_THEME)));
        assert!(app.submit_theme_editor("My Dark", palette));
        assert_eq!(app.active_theme(), "mydark");
        assert!(themes::is_builtin(themes::DEFAULT_THEME));

        assert!(!app.request_delete_theme(themes::DEFAULT_THEME));
        assert!(app.open_themes());
        assert!(app.request_delete_theme("mydark"));
        assert!(app.confirm_delete_theme());
        assert!(!app.themes.contains("mydark"));
        assert_eq!(app.config().current_theme, app.active_theme());
    }

    #[test]
    fn test_collection_sharing_a_notes_file_is_refused() {
        let dir = tempdir().unwrap();
        let boot_fs = || {
            let fs = FileSystem::new_with_base(dir.path());
            fs.ensure_directories().unwrap();
            App::with_font_source(Box::new(fs), Arc::new(FixedFonts)).0
        };

        let mut app = boot_fs();
        assert!(app.setup_first_collection("a/b"));
        app.create_new_note();
        app.edit_content("precious");
        assert!(app.back());

        assert!(app.open_new_collection());
        assert!(!app.submit_new_collection("a_b"));
        assert!(!app.submit_new_collection("A/B"));
        assert_eq!(*app.modal(), Modal::NewCollection);
        assert_eq!(app.collection_names(), ["a/b".to_string()]);
        assert!(app.submit_new_collection("Other"));
        assert!(app.open_rename_collection());
        assert!(!app.submit_rename_collection("a:b"));
        app.shutdown();

        let app = boot_fs();
        assert_eq!(app.collection_names().len(), 2);
        let info = app.collection_info();
        let shared = info.iter().find(|c| c.name == "a/b").unwrap();
        assert_eq!(shared.note_count, 1);
    }

    fn searching_for_apple() -> App {
        let mut app = boot(&inbox_with(&["apple pie", "banana", "apple juice"]));
        app.open_search();
        app.search_text_changed("apple");
        fire(&mut app, TimerKind::SearchDebounce);
        assert_eq!(app.notes().filtered_count(), 2);
        app
    }

    #[test]
    fn test_collection_dialog_from_search_drops_filter_on_back() {
        let mut app = searching_for_apple();
        assert!(app.open_new_collection());
        assert!(app.back());

        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.search_text(), "");
        assert_eq!(app.notes().filtered_count(), 3);
    }

    #[test]
    fn test_collection_dialog_from_search_drops_filter_on_submit() {
        let mut app = searching_for_apple();
        assert!(app.open_rename_collection());
        assert!(app.submit_rename_collection("Kitchen"));

        assert_eq!(*app.modal(), Modal::None);
        assert_eq!(app.search_text(), "");
        assert_eq!(app.notes().filtered_count(), 3);
        assert_eq!(app.current_collection(), Some("Kitchen"));
    }

    #[test]
    fn test_update_and_rename_theme_are_stored() {
        let store = inbox();
        let mut app = boot(&store);
        let mut palette = app.theme_palette();
        let key = app.create_theme(None, "Paper", palette.clone()).unwrap();
        assert_eq!(key, "paper");
        let mut events = app.subscribe();

        palette.primary = "#123456".to_string();
        assert!(app.update_theme(&key, "Paper", palette.clone()));
        let stored = store.load_themes().unwrap();
        assert_eq!(stored[&key].palette.primary, "#123456");
        let seen = drain(&mut events);
        assert!(seen.contains(&ChangeEvent::ThemesChanged));
        assert!(!seen.contains(&ChangeEvent::ConfigChanged));

        // updating the active theme also restyles the view
        assert!(app.set_theme(&key));
        drain(&mut events);
        assert!(app.update_theme(&key, "Paper", palette));
        assert!(drain(&mut events).contains(&ChangeEvent::ConfigChanged));

        assert!(app.rename_theme(&key, "Ink"));
        assert_eq!(store.load_themes().unwrap()[&key].name, "Ink");
        assert!(drain(&mut events).contains(&ChangeEvent::ThemesChanged));

        assert!(!app.rename_theme(themes::DEFAULT_THEME, "Mine"));
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::Notice(_))));
    }

    #[test]
    fn test_theme_edit_survives_failed_write() {
        let store = inbox();
        let mut app = boot(&store);
        let palette = app.theme_palette();
        let key = app.create_theme(None, "Paper", palette).unwrap();
        let mut events = app.subscribe();

        store.set_fail_writes(true);
        assert!(app.rename_theme(&key, "Ink"));
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::SaveFailed(_))));
        assert_eq!(store.load_themes().unwrap()[&key].name, "Paper");

        store.set_fail_writes(false);
        assert!(app.flush());
        assert_eq!(store.load_themes().unwrap()[&key].name, "Ink");
    }

    #[test]
    fn test_bad_palette_is_reported_and_nothing_changes() {
        let mut app = boot(&inbox());
        let mut events = app.subscribe();
        let mut palette = app.theme_palette();
        palette.error = "red".to_string();
        let before = app.theme_list().len();

        assert_eq!(app.create_theme(None, "Broken", palette), None);
        assert_eq!(app.theme_list().len(), before);
        assert!(drain(&mut events)
            .iter()
            .any(|e| matches!(e, ChangeEvent::Notice(_))));
    }

    #[test]
    fn test_fonts_loaded_and_cycled() {
        let mut app = boot(&inbox());
        assert!(!app.available_fonts().is_empty());

        app.fonts_loaded(vec!["Alpha Sans".to_string(), "Zed Mono".to_string()]);
        assert_eq!(app.available_fonts(), vec!["Alpha Sans", "Zed Mono"]);
        assert!(!app.preload_fonts());

        // "Victor Mono" is not in the list, so forward starts at the first
        assert!(app.cycle_font(true));
        assert_eq!(app.current_font(), "Alpha Sans");
        assert!(app.cycle_font(false));
        assert_eq!(app.current_font(), "Zed Mono");
        assert!(!app.set_font("  "));
    }

    #[test]
    fn test_optimize_waits_for_measurement() {
        let mut app = boot(&inbox_with(&["a", "b", "c"]));
        assert!(!app.optimize_card_width());
        assert!(app.scheduler.is_pending(TimerKind::LayoutPoll));

        for _ in 0..MAX_LAYOUT_POLLS {
            if !app.scheduler.is_pending(TimerKind::LayoutPoll) {
                break;
            }
            fire(&mut app, TimerKind::LayoutPoll);
        }
        assert!(!app.scheduler.is_pending(TimerKind::LayoutPoll));

        assert!(!app.optimize_card_width());
        app.set_viewport(680, 30);
        fire(&mut app, TimerKind::LayoutPoll);
        assert_eq!(app.columns(), 3);
    }

    #[test]
    fn test_stats() {
        let mut app = boot(&inbox_with(&["One two three.", "Four five."]));
        let stats = app.note_stats().unwrap();
        assert_eq!(stats.words, 3);

        let overall = app.overall_stats();
        assert_eq!(overall.total_notes, 2);
        assert_eq!(overall.total_words, 5);
        assert!(app.open_stats());
        assert_eq!(*app.modal(), Modal::Stats);
    }

    #[test]
    fn test_shutdown_saves_open_editor() {
        let store = inbox();
        let mut app = boot(&store);
        app.create_new_note();
        app.edit_content("unsaved work");
        app.shutdown();

        assert_eq!(store.stored_notes("Inbox").unwrap()[0].content, "unsaved work");
        assert!(!app.scheduler.is_pending(TimerKind::AutoSave));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_arrive_through_receiver() {
        let store = inbox();
        let (mut app, mut receiver) =
            App::with_font_source(Box::new(Arc::clone(&store)), Arc::new(FixedFonts));

        app.create_new_note();
        app.edit_content("async draft");

        // focus fires first, then auto-save
        while store.stored_notes("Inbox").unwrap().is_empty() {
            let message = receiver.recv().await.unwrap();
            app.dispatch(message);
        }
        assert_eq!(store.stored_notes("Inbox").unwrap()[0].content, "async draft");
    }

    #[tokio::test]
    async fn test_font_enumeration_posts_back() {
        let (mut app, mut receiver) =
            App::with_font_source(Box::new(inbox()), Arc::new(FixedFonts));
        let mut events = app.subscribe();

        assert!(app.open_font_selection());
        assert!(app.fonts_loading());
        let message = receiver.recv().await.unwrap();
        assert!(matches!(message, AppMessage::FontsLoaded(_)));
        app.dispatch(message);

        assert_eq!(app.available_fonts(), vec!["Alpha Sans", "Zed Mono"]);
        assert!(drain(&mut events).contains(&ChangeEvent::FontsUpdated));
    }
}
