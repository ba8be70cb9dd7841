use crate::metadata::LocalMetadata;
use crate::model::{Theme, Track};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// Typed notifications the core publishes toward the presentation layer.
/// Events carry owned data so subscribers never borrow into core state.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackStarted { index: usize, track: Track },
    PlaybackPaused,
    PlaybackResumed,
    PlaylistChanged,
    ThemeChanged { old: Theme, new: Theme },
    TimerArmed { minutes: u64 },
    TimerExtended { minutes: u64 },
    TimerCancelled,
    TimerExpired,
    MetadataResolved { path: PathBuf, metadata: LocalMetadata },
    Notification { level: Level, message: String },
}

type Subscriber = Box<dyn FnMut(&PlayerEvent)>;

/// Fire-and-forget broadcast: the core never reads anything back from a
/// subscriber.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&PlayerEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn publish(&mut self, event: PlayerEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        self.publish(PlayerEvent::Notification {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn publish_reaches_every_subscriber() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |event| {
                if let PlayerEvent::Notification { message, .. } = event {
                    seen.borrow_mut().push(message.clone());
                }
            });
        }

        bus.notify(Level::Info, "hello");
        assert_eq!(seen.borrow().len(), 2);
    }
}
