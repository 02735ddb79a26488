use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    rc::Rc,
};

use strum::EnumIter;

use crate::{device::DeviceError, queue::RepeatMode, track::Track};

/// Names observers subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    Play,
    Pause,
    Stop,
    Change,
    TimeUpdate,
    RepeatModeChange,
    Error,
    CanPlay,
}

/// Position report forwarded to observers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUpdate {
    pub position: f32,
    pub duration: f32,
    /// 0..=100 (may overshoot while the device does)
    pub progress: f32,
}

/// State changes broadcast by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Device started playing the current track
    Play(Option<Track>),
    Pause,
    Stop,
    /// A new current track was loaded
    Change(Track),
    TimeUpdate(TimeUpdate),
    RepeatModeChange(RepeatMode),
    Error(DeviceError),
    CanPlay,
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlaybackEvent::Play(_) => EventKind::Play,
            PlaybackEvent::Pause => EventKind::Pause,
            PlaybackEvent::Stop => EventKind::Stop,
            PlaybackEvent::Change(_) => EventKind::Change,
            PlaybackEvent::TimeUpdate(_) => EventKind::TimeUpdate,
            PlaybackEvent::RepeatModeChange(_) => EventKind::RepeatModeChange,
            PlaybackEvent::Error(_) => EventKind::Error,
            PlaybackEvent::CanPlay => EventKind::CanPlay,
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&PlaybackEvent) -> anyhow::Result<()>>;

struct Subscription {
    id: ListenerId,
    listener: Listener,
}

/// Ordered listener lists keyed by event kind.
///
/// Dispatch works on a snapshot of the list, so listeners may subscribe,
/// unsubscribe or emit again while being called.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<EventKind, Vec<Subscription>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PlaybackEvent) -> anyhow::Result<()> + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Subscription {
                id,
                listener: Rc::new(listener),
            });
        id
    }

    /// Remove one listener. Returns false if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(subs) = listeners.get_mut(&kind) else {
            return false;
        };

        let before = subs.len();
        subs.retain(|sub| sub.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Remove every listener for `kind`
    pub fn off_all(&self, kind: EventKind) {
        self.listeners.borrow_mut().remove(&kind);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    /// Call every listener for the event's kind in registration order.
    /// A failing listener is logged and skipped.
    pub fn emit(&self, event: &PlaybackEvent) {
        let kind = event.kind();
        let snapshot: Vec<Listener> = match self.listeners.borrow().get(&kind) {
            Some(subs) => subs.iter().map(|sub| Rc::clone(&sub.listener)).collect(),
            None => return,
        };

        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("{} listener failed: {:#}", kind, e),
                Err(_) => log::error!("{} listener panicked", kind),
            }
        }
    }
}
