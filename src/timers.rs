//! Single-shot, restartable timers.
//!
//! A timer is a spawned tokio task that sleeps and then posts a
//! `TimerEvent` on the app's message channel. Restarting aborts the pending
//! task and bumps the generation, so an event that was already in flight
//! when the timer was restarted or cancelled is recognised as stale by
//! `accept` and dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::events::AppMessage;

/// The deferred jobs the app schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Saves the editor buffer after typing pauses
    AutoSave,
    /// Applies the search text after typing pauses
    SearchDebounce,
    /// Hands focus to the editor after the current layout pass
    Focus,
    /// Polls for a measured grid before optimising columns
    LayoutPoll,
    /// Writes config and collections after a burst of changes
    ConfigSave,
}

/// A timer expiry, as delivered through the app's message channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerEvent {
    pub kind: TimerKind,
    pub generation: u64,
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

/// Owns every pending timer.
#[derive(Debug)]
pub struct Scheduler {
    sender: UnboundedSender<AppMessage>,
    pending: HashMap<TimerKind, Pending>,
    generation: u64,
}

impl Scheduler {
    pub fn new(sender: UnboundedSender<AppMessage>) -> Self {
        Self {
            sender,
            pending: HashMap::new(),
            generation: 0,
        }
    }

    /// Cancels any pending `kind` timer and schedules a new one.
    ///
    /// Outside a tokio runtime the timer is only recorded; it can still be
    /// fired by hand through `pending_event`.
    pub fn restart(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        self.generation += 1;
        let event = TimerEvent {
            kind,
            generation: self.generation,
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let sender = self.sender.clone();
                Some(runtime.spawn(async move {
                    sleep(delay).await;
                    if sender.send(AppMessage::Timer(event)).is_err() {
                        log::debug!("Timer {:?} fired after the app went away", event.kind);
                    }
                }))
            }
            Err(_) => {
                log::debug!("No runtime, timer {:?} must be fired manually", kind);
                None
            }
        };

        self.pending.insert(
            kind,
            Pending {
                generation: self.generation,
                handle,
            },
        );
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(pending) = self.pending.remove(&kind) {
            if let Some(handle) = pending.handle {
                handle.abort();
            }
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            if let Some(handle) = pending.handle {
                handle.abort();
            }
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// The event the pending `kind` timer will deliver.
    pub fn pending_event(&self, kind: TimerKind) -> Option<TimerEvent> {
        self.pending.get(&kind).map(|pending| TimerEvent {
            kind,
            generation: pending.generation,
        })
    }

    /// Consumes a delivered event.
    ///
    /// # Returns
    /// `true` if the event belongs to the live timer of its kind, `false`
    /// for stale events of restarted or cancelled timers
    pub fn accept(&mut self, event: TimerEvent) -> bool {
        match self.pending.get(&event.kind) {
            Some(pending) if pending.generation == event.generation => {
                self.pending.remove(&event.kind);
                true
            }
            _ => false,
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_restart_without_runtime_records_pending() {
        let (sender, _receiver) = unbounded_channel();
        let mut scheduler = Scheduler::new(sender);

        scheduler.restart(TimerKind::AutoSave, Duration::from_millis(10));
        let first = scheduler.pending_event(TimerKind::AutoSave).unwrap();
        scheduler.restart(TimerKind::AutoSave, Duration::from_millis(10));
        let second = scheduler.pending_event(TimerKind::AutoSave).unwrap();

        assert!(!scheduler.accept(first));
        assert!(scheduler.accept(second));
        assert!(!scheduler.is_pending(TimerKind::AutoSave));
        // a second delivery of the same event is stale
        assert!(!scheduler.accept(second));
    }

    #[test]
    fn test_cancel_makes_events_stale() {
        let (sender, _receiver) = unbounded_channel();
        let mut scheduler = Scheduler::new(sender);

        scheduler.restart(TimerKind::SearchDebounce, Duration::from_millis(10));
        scheduler.restart(TimerKind::Focus, Duration::from_millis(10));
        let event = scheduler.pending_event(TimerKind::SearchDebounce).unwrap();
        scheduler.cancel_all();

        assert!(!scheduler.accept(event));
        assert!(!scheduler.is_pending(TimerKind::Focus));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_posts_event_after_delay() {
        let (sender, mut receiver) = unbounded_channel();
        let mut scheduler = Scheduler::new(sender);

        scheduler.restart(TimerKind::AutoSave, Duration::from_millis(1000));
        let message = receiver.recv().await.unwrap();
        let AppMessage::Timer(event) = message else {
            panic!("expected a timer event, got {:?}", message);
        };
        assert_eq!(event.kind, TimerKind::AutoSave);
        assert!(scheduler.accept(event));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_debounces() {
        let (sender, mut receiver) = unbounded_channel();
        let mut scheduler = Scheduler::new(sender);

        scheduler.restart(TimerKind::SearchDebounce, Duration::from_millis(300));
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.restart(TimerKind::SearchDebounce, Duration::from_millis(300));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(receiver.try_recv().is_err());

        let AppMessage::Timer(event) = receiver.recv().await.unwrap() else {
            panic!("expected a timer event");
        };
        assert!(scheduler.accept(event));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (sender, mut receiver) = unbounded_channel();
        let mut scheduler = Scheduler::new(sender);

        scheduler.restart(TimerKind::ConfigSave, Duration::from_millis(50));
        scheduler.cancel(TimerKind::ConfigSave);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(receiver.try_recv().is_err());
    }
}
