use std::{
    cell::{Ref, RefCell},
    rc::Rc,
};

use lyra_core::{
    EventKind, PlaybackEngine, PlaybackEvent, PlaybackState, Track,
    events::ListenerId,
    queue::RepeatMode,
    time::ProgressThrottle,
};
use strum::IntoEnumIterator;

/// What a widget shows about playback, fed by engine events
#[derive(Debug, Clone, Default)]
pub struct PlayerView {
    pub track: Option<Track>,
    pub is_playing: bool,
    pub position: f32,
    pub duration: f32,
    /// 0..=100
    pub progress: f32,
    pub repeat_mode: RepeatMode,
    pub error: Option<String>,
    throttle: ProgressThrottle,
}

impl PlayerView {
    /// Copy everything from an engine snapshot
    pub fn sync(&mut self, state: &PlaybackState) {
        self.track = state.current_track.clone();
        self.is_playing = state.is_playing;
        self.position = state.position_seconds;
        self.duration = state.duration_seconds;
        self.progress = state.progress_percent;
        self.repeat_mode = state.repeat_mode;
        self.throttle.reset();
    }

    /// Apply one event. Returns false when nothing visible changed.
    pub fn apply(&mut self, event: &PlaybackEvent) -> bool {
        match event {
            PlaybackEvent::Play(track) => {
                self.is_playing = true;
                self.error = None;
                if let Some(track) = track {
                    self.track = Some(track.clone());
                }
            }
            PlaybackEvent::Pause => self.is_playing = false,
            PlaybackEvent::Stop => {
                self.is_playing = false;
                self.position = 0.0;
                self.progress = 0.0;
                self.throttle.reset();
            }
            PlaybackEvent::Change(track) => {
                self.duration = track.duration_seconds;
                self.track = Some(track.clone());
                self.position = 0.0;
                self.progress = 0.0;
                self.error = None;
                self.throttle.reset();
            }
            PlaybackEvent::TimeUpdate(update) => {
                if !self.throttle.should_render(update.progress, update.duration) {
                    return false;
                }
                self.position = update.position;
                self.duration = update.duration;
                self.progress = update.progress;
            }
            PlaybackEvent::RepeatModeChange(mode) => self.repeat_mode = *mode,
            PlaybackEvent::Error(error) => self.error = Some(error.message.clone()),
            PlaybackEvent::CanPlay => return false,
        }
        true
    }
}

/// Listener registrations held by one UI element while it is visible
pub struct Observer {
    name: &'static str,
    view: Rc<RefCell<PlayerView>>,
    subscriptions: Vec<(EventKind, ListenerId)>,
}

impl Observer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            view: Rc::new(RefCell::new(PlayerView::default())),
            subscriptions: Vec::new(),
        }
    }

    pub fn view(&self) -> Ref<'_, PlayerView> {
        self.view.borrow()
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Catch up with the engine and subscribe to every event
    pub fn attach(&mut self, engine: &PlaybackEngine) {
        if self.is_attached() {
            return;
        }

        self.view.borrow_mut().sync(&engine.state());

        for kind in EventKind::iter() {
            let view = Rc::clone(&self.view);
            let name = self.name;
            let id = engine.on(kind, move |event| {
                let mut view = view
                    .try_borrow_mut()
                    .map_err(|_| anyhow::anyhow!("{} view is busy", name))?;
                view.apply(event);
                Ok(())
            });
            self.subscriptions.push((kind, id));
        }
        log::debug!("{} attached", self.name);
    }

    /// Drop every subscription made by [`Observer::attach`]
    pub fn detach(&mut self, engine: &PlaybackEngine) {
        for (kind, id) in self.subscriptions.drain(..) {
            engine.off(kind, id);
        }
        log::debug!("{} detached", self.name);
    }
}
