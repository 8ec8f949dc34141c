use tokio::sync::broadcast;

use crate::timers::TimerEvent;

const EVENT_CAPACITY: usize = 256;

/// Notifications published to the rendering layer.
///
/// Views subscribe and re-read whatever state the event names; the events
/// themselves carry only what cannot be read back (messages).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The visible note list (content, order or filter) changed
    NotesChanged,
    /// A different collection became current
    CollectionChanged(String),
    /// Collections were added, renamed or removed
    CollectionsChanged,
    ConfigChanged,
    ThemesChanged,
    FontsUpdated,
    /// View, modal or selection changed
    StateChanged,
    /// The editor input should take keyboard focus now
    FocusEditor,
    SaveSucceeded,
    SaveFailed(String),
    /// Transient message for the user, typically a rejected operation
    Notice(String),
    FullscreenToggled,
    QuitRequested,
}

/// Messages posted back to the owner of the `App` from timers and workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppMessage {
    Timer(TimerEvent),
    FontsLoaded(Vec<String>),
}

/// Broadcast fan-out for change events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscriber is not an error.
    pub fn emit(&self, event: ChangeEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("Change event dropped, no subscribers");
        }
    }
}
