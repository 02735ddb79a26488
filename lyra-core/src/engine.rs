use std::cell::RefCell;

use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::{
    commands::PlayerCommand,
    device::{AudioDevice, DeviceEvent},
    events::{EventBus, EventKind, ListenerId, PlaybackEvent, TimeUpdate},
    queue::{PlayQueue, RepeatMode},
    time::{clamp_volume, progress_percent},
    track::Track,
};

#[derive(Error, Debug)]
pub enum PlayError {
    #[error("track {0:?} has no audio source")]
    MissingSource(String),
}

/// Where the engine believes the device is.
///
/// Commands only ever move to `Loading`; `Playing`, `Paused` and `Ended` are
/// entered from device callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    /// Nothing loaded
    #[default]
    Idle,
    /// Source requested, device has not answered yet
    Loading,
    /// Source ready (or stopped and rewound), not playing
    Loaded,
    Playing,
    Paused,
    /// Source played to the end
    Ended,
}

/// Snapshot returned by [`PlaybackEngine::state`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub position_seconds: f32,
    pub duration_seconds: f32,
    /// `position / duration * 100`, 0 while the duration is unknown.
    /// Not clamped: the device may briefly report a position past the end.
    pub progress_percent: f32,
    pub repeat_mode: RepeatMode,
    pub queue: PlayQueue,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Volume pushed to the device at startup
    pub initial_volume: f32,
    pub repeat_mode: RepeatMode,
    /// Fixed seed for shuffle picks; OS entropy when `None`
    pub shuffle_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            repeat_mode: RepeatMode::QueueRepeat,
            shuffle_seed: None,
        }
    }
}

/// Owns the one audio device and all playback state.
///
/// Everything runs on the host's event loop. Methods take `&self` so the
/// engine can be shared as `Rc<PlaybackEngine>` and called again from inside
/// a listener; no borrow is held while listeners run.
pub struct PlaybackEngine {
    device: RefCell<Box<dyn AudioDevice>>,
    state: RefCell<PlaybackState>,
    bus: EventBus,
    rng: RefCell<StdRng>,
}

impl PlaybackEngine {
    pub fn new(device: Box<dyn AudioDevice>, config: EngineConfig) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let engine = Self {
            device: RefCell::new(device),
            state: RefCell::new(PlaybackState {
                repeat_mode: config.repeat_mode,
                ..Default::default()
            }),
            bus: EventBus::new(),
            rng: RefCell::new(rng),
        };
        engine.set_volume(config.initial_volume);
        engine
    }

    // ==============================
    // Commands
    // ==============================

    /// Load `track` and start playing it.
    ///
    /// A non-empty `queue` replaces the current one. The cursor moves to the
    /// track's position in the queue, or is cleared if it is not there.
    /// A track without an audio source is logged and ignored.
    pub fn play(&self, track: Track, queue: Option<Vec<Track>>) {
        if let Err(e) = Self::check_source(&track) {
            log::warn!("Ignoring play request: {}", e);
            return;
        }

        {
            let mut state = self.state.borrow_mut();
            if let Some(tracks) = queue.filter(|tracks| !tracks.is_empty()) {
                state.queue.replace(tracks);
            }
            let index = state.queue.position_of(&track.id);
            state.queue.select(index);
        }

        self.load_and_play(track);
    }

    /// Pause if playing, resume otherwise. No-op without a current track.
    pub fn toggle_play(&self) {
        let (has_track, is_playing) = {
            let state = self.state.borrow();
            (state.current_track.is_some(), state.is_playing)
        };
        if !has_track {
            return;
        }

        if is_playing {
            self.pause();
        } else {
            self.resume();
        }
    }

    pub fn pause(&self) {
        self.device.borrow_mut().pause();
    }

    pub fn resume(&self) {
        self.device.borrow_mut().play();
    }

    pub fn stop(&self) {
        self.device.borrow_mut().stop();
    }

    pub fn play_next(&self) {
        self.skip(true);
    }

    pub fn play_previous(&self) {
        self.skip(false);
    }

    /// Seek to `seconds`. Not checked against the duration; the device clamps.
    pub fn seek(&self, seconds: f32) {
        self.device.borrow_mut().seek(seconds.max(0.0));
    }

    /// Seek to a percentage of the measured duration. Ignored until the
    /// duration is known.
    pub fn seek_percent(&self, percent: f32) {
        let duration = self.state.borrow().duration_seconds;
        if duration <= 0.0 {
            log::debug!("Seek to {}% ignored, duration unknown", percent);
            return;
        }
        self.seek(percent.clamp(0.0, 100.0) / 100.0 * duration);
    }

    pub fn set_volume(&self, volume: f32) {
        self.device.borrow_mut().set_volume(clamp_volume(volume));
    }

    /// Effective device volume
    pub fn volume(&self) -> f32 {
        self.device.borrow().volume()
    }

    pub fn cycle_repeat_mode(&self) -> RepeatMode {
        let mode = {
            let mut state = self.state.borrow_mut();
            state.repeat_mode = state.repeat_mode.next();
            state.repeat_mode
        };
        log::info!("Repeat mode: {}", mode);
        self.bus.emit(&PlaybackEvent::RepeatModeChange(mode));
        mode
    }

    pub fn execute(&self, command: PlayerCommand) {
        match command {
            PlayerCommand::Play { track, queue } => self.play(track, queue),
            PlayerCommand::TogglePlay => self.toggle_play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Resume => self.resume(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::Next => self.play_next(),
            PlayerCommand::Previous => self.play_previous(),
            PlayerCommand::Seek(seconds) => self.seek(seconds),
            PlayerCommand::SeekPercent(percent) => self.seek_percent(percent),
            PlayerCommand::SetVolume(volume) => self.set_volume(volume),
            PlayerCommand::CycleRepeatMode => {
                self.cycle_repeat_mode();
            }
        }
    }

    // ==============================
    // State & subscriptions
    // ==============================

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.borrow().repeat_mode
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&PlaybackEvent) -> anyhow::Result<()> + 'static,
    {
        self.bus.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    pub fn off_all(&self, kind: EventKind) {
        self.bus.off_all(kind);
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    // ==============================
    // Device callbacks
    // ==============================

    /// Drain the device and apply its events in order. Returns how many ran.
    pub fn pump(&self) -> usize {
        let events = self.device.borrow_mut().drain_events();
        let count = events.len();
        for event in events {
            self.handle_device_event(event);
        }
        count
    }

    /// Apply one device callback. This is the only place `is_playing` and
    /// the Playing/Paused/Ended states change.
    ///
    /// `Ended` and `TimeUpdate` received while a new source is loading are
    /// left over from the previous source and dropped.
    pub fn handle_device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Play => {
                let track = {
                    let mut state = self.state.borrow_mut();
                    state.is_playing = true;
                    state.status = PlayerStatus::Playing;
                    state.current_track.clone()
                };
                self.bus.emit(&PlaybackEvent::Play(track));
            }
            DeviceEvent::Pause => {
                {
                    let mut state = self.state.borrow_mut();
                    state.is_playing = false;
                    state.status = PlayerStatus::Paused;
                }
                self.bus.emit(&PlaybackEvent::Pause);
            }
            DeviceEvent::Stop => {
                {
                    let mut state = self.state.borrow_mut();
                    state.is_playing = false;
                    state.position_seconds = 0.0;
                    state.progress_percent = 0.0;
                    state.status = if state.current_track.is_some() {
                        PlayerStatus::Loaded
                    } else {
                        PlayerStatus::Idle
                    };
                }
                self.bus.emit(&PlaybackEvent::Stop);
            }
            DeviceEvent::Ended => {
                {
                    let mut state = self.state.borrow_mut();
                    // Still loading a newer source: this end belongs to the old one
                    if state.status == PlayerStatus::Loading {
                        log::debug!("Ignoring end of previous source");
                        return;
                    }
                    state.is_playing = false;
                    state.status = PlayerStatus::Ended;
                }
                self.handle_track_end();
            }
            DeviceEvent::Error(error) => {
                log::error!("Playback error: {}", error);
                self.bus.emit(&PlaybackEvent::Error(error));
            }
            DeviceEvent::TimeUpdate { position, duration } => {
                if duration <= 0.0 {
                    return;
                }
                let update = {
                    let mut state = self.state.borrow_mut();
                    if state.status == PlayerStatus::Loading {
                        return;
                    }
                    state.position_seconds = position;
                    state.duration_seconds = duration;
                    state.progress_percent = progress_percent(position, duration);
                    if let Some(track) = state.current_track.as_mut() {
                        track.duration_seconds = duration;
                    }
                    TimeUpdate {
                        position,
                        duration,
                        progress: state.progress_percent,
                    }
                };
                self.bus.emit(&PlaybackEvent::TimeUpdate(update));
            }
            DeviceEvent::CanPlay => {
                {
                    let mut state = self.state.borrow_mut();
                    if state.status == PlayerStatus::Loading {
                        state.status = PlayerStatus::Loaded;
                    }
                }
                self.bus.emit(&PlaybackEvent::CanPlay);
            }
        }
    }

    // ==============================
    // Internals
    // ==============================

    fn check_source(track: &Track) -> Result<(), PlayError> {
        if track.has_source() {
            Ok(())
        } else {
            Err(PlayError::MissingSource(track.id.clone()))
        }
    }

    /// TrackRepeat replays in place; every other mode behaves like next
    fn handle_track_end(&self) {
        let replay = {
            let mut state = self.state.borrow_mut();
            if state.repeat_mode == RepeatMode::TrackRepeat && state.current_track.is_some() {
                state.status = PlayerStatus::Loaded;
                true
            } else {
                false
            }
        };

        if replay {
            log::debug!("Track ended, repeating");
            let mut device = self.device.borrow_mut();
            device.seek(0.0);
            device.play();
        } else {
            log::debug!("Track ended, advancing");
            self.play_next();
        }
    }

    fn skip(&self, forward: bool) {
        let (index, track) = {
            let state = self.state.borrow();
            let mut rng = self.rng.borrow_mut();
            let index = if forward {
                state.queue.next_index(state.repeat_mode, &mut *rng)
            } else {
                state.queue.previous_index(state.repeat_mode, &mut *rng)
            };
            let Some(index) = index else {
                log::debug!("Queue is empty, nothing to skip to");
                return;
            };
            match state.queue.get(index) {
                Some(track) => (index, track.clone()),
                None => return,
            }
        };

        if let Err(e) = Self::check_source(&track) {
            log::warn!("Cannot skip to index {}: {}", index, e);
            return;
        }

        self.state.borrow_mut().queue.select(Some(index));
        self.load_and_play(track);
    }

    fn load_and_play(&self, track: Track) {
        {
            let mut state = self.state.borrow_mut();
            state.current_track = Some(track.clone());
            state.status = PlayerStatus::Loading;
            state.position_seconds = 0.0;
            state.duration_seconds = track.duration_seconds.max(0.0);
            state.progress_percent = 0.0;
        }

        {
            let mut device = self.device.borrow_mut();
            device.set_source(&track.audio_url);
            device.play();
        }

        log::info!("Now loading: {} ({})", track.display_title(), track.audio_url);
        self.bus.emit(&PlaybackEvent::Change(track));
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::device::{
        DeviceError,
        mock::{DeviceCall, MockDevice, MockLog},
    };

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| {
                Track::new(format!("song-{i}"), format!("/music/{i}.mp3"))
                    .with_title(format!("Song {i}"))
                    .with_duration(180.0)
            })
            .collect()
    }

    fn engine_with(config: EngineConfig) -> (PlaybackEngine, Rc<RefCell<MockLog>>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let (device, log) = MockDevice::new();
        let engine = PlaybackEngine::new(Box::new(device), config);
        log.borrow_mut().calls.clear();
        (engine, log)
    }

    fn engine() -> (PlaybackEngine, Rc<RefCell<MockLog>>) {
        engine_with(EngineConfig {
            shuffle_seed: Some(9),
            ..Default::default()
        })
    }

    fn record(engine: &PlaybackEngine, kind: EventKind) -> Rc<RefCell<Vec<PlaybackEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        engine.on(kind, move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        seen
    }

    fn set_mode(engine: &PlaybackEngine, mode: RepeatMode) {
        while engine.repeat_mode() != mode {
            engine.cycle_repeat_mode();
        }
    }

    #[test]
    fn play_points_cursor_at_track_in_new_queue() {
        let (engine, _) = engine();
        let queue = tracks(5);
        for (i, track) in queue.iter().enumerate() {
            engine.play(track.clone(), Some(queue.clone()));
            let state = engine.state();
            assert_eq!(state.queue.current_index, Some(i));
            assert_eq!(state.current_track.as_ref(), Some(track));
            assert_eq!(state.queue.tracks, queue);
        }
    }

    #[test]
    fn play_loads_source_and_emits_change() {
        let (engine, log) = engine();
        let changes = record(&engine, EventKind::Change);
        let queue = tracks(3);

        engine.play(queue[1].clone(), Some(queue.clone()));

        assert_eq!(
            log.borrow().calls,
            vec![DeviceCall::SetSource("/music/1.mp3".into()), DeviceCall::Play]
        );
        assert_eq!(*changes.borrow(), vec![PlaybackEvent::Change(queue[1].clone())]);
        assert_eq!(engine.state().status, PlayerStatus::Loading);
    }

    #[test]
    fn is_playing_flips_only_on_device_callbacks() {
        let (engine, _) = engine();
        let queue = tracks(2);
        let plays = record(&engine, EventKind::Play);

        engine.play(queue[0].clone(), Some(queue.clone()));
        assert!(!engine.state().is_playing);
        assert!(plays.borrow().is_empty());

        engine.handle_device_event(DeviceEvent::Play);
        assert!(engine.state().is_playing);
        assert_eq!(engine.state().status, PlayerStatus::Playing);
        assert_eq!(*plays.borrow(), vec![PlaybackEvent::Play(Some(queue[0].clone()))]);

        engine.pause();
        assert!(engine.state().is_playing);
        engine.handle_device_event(DeviceEvent::Pause);
        assert!(!engine.state().is_playing);
        assert_eq!(engine.state().status, PlayerStatus::Paused);
    }

    #[test]
    fn play_without_source_changes_nothing() {
        let (engine, log) = engine();
        let changes = record(&engine, EventKind::Change);
        let before = engine.state();

        engine.play(Track::new("broken", ""), Some(tracks(3)));

        assert_eq!(engine.state(), before);
        assert!(log.borrow().calls.is_empty());
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn track_missing_from_queue_clears_cursor() {
        let (engine, _) = engine();
        let stray = Track::new("stray", "/music/stray.mp3");

        engine.play(stray.clone(), Some(tracks(3)));
        let state = engine.state();
        assert_eq!(state.queue.current_index, None);
        assert_eq!(state.current_track, Some(stray));

        engine.play_next();
        assert_eq!(engine.state().queue.current_index, Some(0));
    }

    #[test]
    fn empty_queue_argument_keeps_existing_queue() {
        let (engine, _) = engine();
        let queue = tracks(3);
        engine.play(queue[0].clone(), Some(queue.clone()));

        engine.play(queue[2].clone(), Some(Vec::new()));
        let state = engine.state();
        assert_eq!(state.queue.tracks, queue);
        assert_eq!(state.queue.current_index, Some(2));
    }

    #[test]
    fn repeat_mode_is_a_three_cycle() {
        let (engine, _) = engine();
        let changes = record(&engine, EventKind::RepeatModeChange);
        let start = engine.repeat_mode();

        let modes: Vec<RepeatMode> = (0..3).map(|_| engine.cycle_repeat_mode()).collect();

        assert_eq!(engine.repeat_mode(), start);
        assert_eq!(
            modes,
            vec![RepeatMode::TrackRepeat, RepeatMode::Shuffle, RepeatMode::QueueRepeat]
        );
        let expected: Vec<PlaybackEvent> =
            modes.into_iter().map(PlaybackEvent::RepeatModeChange).collect();
        assert_eq!(*changes.borrow(), expected);
    }

    #[test]
    fn next_and_previous_wrap_around() {
        let (engine, _) = engine();
        let queue = tracks(4);

        engine.play(queue[3].clone(), Some(queue.clone()));
        engine.play_next();
        assert_eq!(engine.state().queue.current_index, Some(0));
        assert_eq!(engine.state().current_track.as_ref(), Some(&queue[0]));

        engine.play_previous();
        assert_eq!(engine.state().queue.current_index, Some(3));
    }

    #[test]
    fn manual_skip_advances_even_in_track_repeat() {
        let (engine, _) = engine();
        let queue = tracks(3);
        set_mode(&engine, RepeatMode::TrackRepeat);

        engine.play(queue[0].clone(), Some(queue.clone()));
        engine.play_next();
        assert_eq!(engine.state().queue.current_index, Some(1));
    }

    #[test]
    fn shuffle_never_repeats_immediately() {
        let (engine, _) = engine();
        let queue = tracks(4);
        set_mode(&engine, RepeatMode::Shuffle);
        engine.play(queue[0].clone(), Some(queue.clone()));

        for _ in 0..200 {
            let before = engine.state().queue.current_index;
            engine.play_next();
            let after = engine.state().queue.current_index;
            assert!(after.is_some());
            assert_ne!(after, before);
        }
    }

    #[test]
    fn volume_is_clamped_before_reaching_device() {
        let (engine, log) = engine();

        engine.set_volume(-0.5);
        assert_eq!(engine.volume(), 0.0);
        engine.set_volume(1.7);
        assert_eq!(engine.volume(), 1.0);
        assert_eq!(
            log.borrow().calls,
            vec![DeviceCall::SetVolume(0.0), DeviceCall::SetVolume(1.0)]
        );
    }

    #[test]
    fn initial_volume_comes_from_config() {
        let (engine, _) = engine_with(EngineConfig {
            initial_volume: 0.4,
            ..Default::default()
        });
        assert_eq!(engine.volume(), 0.4);
    }

    #[test]
    fn ended_in_track_repeat_replays_same_track() {
        let (engine, log) = engine();
        let queue = tracks(3);
        set_mode(&engine, RepeatMode::TrackRepeat);
        engine.play(queue[1].clone(), Some(queue.clone()));
        engine.handle_device_event(DeviceEvent::Play);

        let changes = record(&engine, EventKind::Change);
        let plays = record(&engine, EventKind::Play);
        log.borrow_mut().calls.clear();

        engine.handle_device_event(DeviceEvent::Ended);
        assert_eq!(log.borrow().calls, vec![DeviceCall::Seek(0.0), DeviceCall::Play]);
        assert_eq!(engine.state().status, PlayerStatus::Loaded);

        engine.handle_device_event(DeviceEvent::Play);
        let state = engine.state();
        assert_eq!(state.queue.current_index, Some(1));
        assert_eq!(state.current_track.as_ref(), Some(&queue[1]));
        assert!(state.is_playing);
        assert!(changes.borrow().is_empty());
        assert_eq!(*plays.borrow(), vec![PlaybackEvent::Play(Some(queue[1].clone()))]);
    }

    #[test]
    fn ended_in_queue_repeat_advances() {
        let (engine, log) = engine();
        let queue = tracks(3);
        engine.play(queue[2].clone(), Some(queue.clone()));
        engine.handle_device_event(DeviceEvent::Play);
        log.borrow_mut().calls.clear();

        engine.handle_device_event(DeviceEvent::Ended);

        assert_eq!(engine.state().queue.current_index, Some(0));
        assert_eq!(
            log.borrow().calls,
            vec![DeviceCall::SetSource("/music/0.mp3".into()), DeviceCall::Play]
        );
    }

    #[test]
    fn ended_in_shuffle_picks_another_track() {
        let (engine, _) = engine();
        let queue = tracks(3);
        set_mode(&engine, RepeatMode::Shuffle);
        engine.play(queue[0].clone(), Some(queue.clone()));
        engine.handle_device_event(DeviceEvent::Play);

        engine.handle_device_event(DeviceEvent::Ended);
        assert_ne!(engine.state().queue.current_index, Some(0));
    }

    #[test]
    fn stale_end_of_previous_source_is_ignored() {
        let (engine, log) = engine();
        let queue = tracks(3);
        let changes = record(&engine, EventKind::Change);
        engine.play(queue[0].clone(), Some(queue.clone()));
        engine.handle_device_event(DeviceEvent::Play);

        // Track 0 ended on the device, but the user skipped before the host pumped
        log.borrow_mut().pending = vec![
            DeviceEvent::TimeUpdate {
                position: 180.0,
                duration: 180.0,
            },
            DeviceEvent::Ended,
        ];
        engine.play_next();
        assert_eq!(engine.pump(), 2);

        let state = engine.state();
        assert_eq!(state.queue.current_index, Some(1));
        assert_eq!(state.current_track.as_ref(), Some(&queue[1]));
        assert_eq!(state.status, PlayerStatus::Loading);
        assert_eq!(state.position_seconds, 0.0);
        assert_eq!(changes.borrow().len(), 2);

        engine.handle_device_event(DeviceEvent::CanPlay);
        engine.handle_device_event(DeviceEvent::Play);
        engine.handle_device_event(DeviceEvent::Ended);
        assert_eq!(engine.state().queue.current_index, Some(2));
    }

    #[test]
    fn failing_time_update_listener_is_isolated() {
        let (engine, _) = engine();
        let queue = tracks(1);
        engine.play(queue[0].clone(), Some(queue));
        engine.handle_device_event(DeviceEvent::Play);

        engine.on(EventKind::TimeUpdate, |_| anyhow::bail!("view gone"));
        let updates = record(&engine, EventKind::TimeUpdate);

        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 45.0,
            duration: 180.0,
        });

        assert_eq!(
            *updates.borrow(),
            vec![PlaybackEvent::TimeUpdate(TimeUpdate {
                position: 45.0,
                duration: 180.0,
                progress: 25.0,
            })]
        );
    }

    #[test]
    fn skipping_on_fresh_engine_is_a_no_op() {
        let (engine, log) = engine();
        engine.play_next();
        engine.play_previous();

        let state = engine.state();
        assert_eq!(state.current_track, None);
        assert_eq!(state.queue.current_index, None);
        assert_eq!(state.status, PlayerStatus::Idle);
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn toggle_without_track_does_nothing() {
        let (engine, log) = engine();
        engine.toggle_play();
        assert!(log.borrow().calls.is_empty());
    }

    #[test]
    fn toggle_follows_reported_state() {
        let (engine, log) = engine();
        let queue = tracks(1);
        engine.play(queue[0].clone(), None);
        engine.handle_device_event(DeviceEvent::Play);
        log.borrow_mut().calls.clear();

        engine.toggle_play();
        engine.handle_device_event(DeviceEvent::Pause);
        engine.toggle_play();
        assert_eq!(log.borrow().calls, vec![DeviceCall::Pause, DeviceCall::Play]);
    }

    #[test]
    fn stop_rewinds_on_callback() {
        let (engine, log) = engine();
        let stops = record(&engine, EventKind::Stop);
        let queue = tracks(1);
        engine.play(queue[0].clone(), Some(queue));
        engine.handle_device_event(DeviceEvent::Play);
        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 90.0,
            duration: 180.0,
        });

        engine.stop();
        assert_eq!(log.borrow().calls.last(), Some(&DeviceCall::Stop));
        assert_eq!(engine.state().position_seconds, 90.0);

        engine.handle_device_event(DeviceEvent::Stop);
        let state = engine.state();
        assert_eq!(state.position_seconds, 0.0);
        assert_eq!(state.progress_percent, 0.0);
        assert!(!state.is_playing);
        assert_eq!(state.status, PlayerStatus::Loaded);
        assert_eq!(stops.borrow().len(), 1);
    }

    #[test]
    fn time_update_records_measured_duration() {
        let (engine, _) = engine();
        let queue = tracks(1);
        engine.play(queue[0].clone(), Some(queue));
        engine.handle_device_event(DeviceEvent::CanPlay);

        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 10.0,
            duration: 200.0,
        });

        let state = engine.state();
        assert_eq!(state.duration_seconds, 200.0);
        assert_eq!(state.progress_percent, 5.0);
        assert_eq!(state.current_track.map(|t| t.duration_seconds), Some(200.0));
    }

    #[test]
    fn time_update_without_duration_is_ignored() {
        let (engine, _) = engine();
        let updates = record(&engine, EventKind::TimeUpdate);

        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 3.0,
            duration: 0.0,
        });

        assert!(updates.borrow().is_empty());
        assert_eq!(engine.state().position_seconds, 0.0);
    }

    #[test]
    fn position_past_duration_is_not_clamped() {
        let (engine, _) = engine();
        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 181.0,
            duration: 180.0,
        });
        assert_eq!(engine.state().position_seconds, 181.0);
    }

    #[test]
    fn device_error_is_forwarded_without_state_change() {
        let (engine, _) = engine();
        let errors = record(&engine, EventKind::Error);
        let queue = tracks(2);
        engine.play(queue[0].clone(), Some(queue));
        engine.handle_device_event(DeviceEvent::Play);
        let before = engine.state();

        let error = DeviceError::with_code(10004, "decode failed");
        engine.handle_device_event(DeviceEvent::Error(error.clone()));

        assert_eq!(engine.state(), before);
        assert_eq!(*errors.borrow(), vec![PlaybackEvent::Error(error)]);
    }

    #[test]
    fn can_play_marks_source_loaded() {
        let (engine, _) = engine();
        let queue = tracks(1);
        engine.play(queue[0].clone(), Some(queue));
        engine.handle_device_event(DeviceEvent::CanPlay);
        assert_eq!(engine.state().status, PlayerStatus::Loaded);
    }

    #[test]
    fn seek_percent_uses_measured_duration() {
        let (engine, log) = engine();
        engine.seek_percent(50.0);
        assert!(log.borrow().calls.is_empty());

        engine.handle_device_event(DeviceEvent::TimeUpdate {
            position: 0.0,
            duration: 120.0,
        });
        engine.seek_percent(25.0);
        engine.seek(-4.0);
        assert_eq!(log.borrow().calls, vec![DeviceCall::Seek(30.0), DeviceCall::Seek(0.0)]);
    }

    #[test]
    fn seek_past_any_length_is_left_to_the_device() {
        let (engine, log) = engine();
        engine.seek(f32::INFINITY);
        assert_eq!(log.borrow().calls, vec![DeviceCall::Seek(f32::INFINITY)]);
    }

    #[test]
    fn execute_dispatches_commands() {
        let (engine, log) = engine();
        let queue = tracks(2);

        engine.execute(PlayerCommand::Play {
            track: queue[0].clone(),
            queue: Some(queue.clone()),
        });
        engine.execute(PlayerCommand::Next);
        engine.execute(PlayerCommand::SetVolume(3.0));
        engine.execute(PlayerCommand::CycleRepeatMode);

        assert_eq!(engine.state().queue.current_index, Some(1));
        assert_eq!(engine.volume(), 1.0);
        assert_eq!(engine.repeat_mode(), RepeatMode::TrackRepeat);
        assert_eq!(log.borrow().calls.len(), 5);
    }

    #[test]
    fn pump_applies_queued_device_events() {
        let (engine, log) = engine();
        let queue = tracks(1);
        engine.play(queue[0].clone(), Some(queue));

        log.borrow_mut().pending = vec![
            DeviceEvent::CanPlay,
            DeviceEvent::Play,
            DeviceEvent::TimeUpdate {
                position: 1.0,
                duration: 100.0,
            },
        ];

        assert_eq!(engine.pump(), 3);
        let state = engine.state();
        assert!(state.is_playing);
        assert_eq!(state.progress_percent, 1.0);
        assert_eq!(engine.pump(), 0);
    }

    #[test]
    fn listener_may_issue_commands_reentrantly() {
        let (engine, _) = engine();
        let engine = Rc::new(engine);
        let queue = tracks(3);

        let weak = Rc::downgrade(&engine);
        let skipped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&skipped);
        engine.on(EventKind::Change, move |_| {
            if !flag.replace(true) {
                if let Some(engine) = weak.upgrade() {
                    engine.play_next();
                    engine.cycle_repeat_mode();
                }
            }
            Ok(())
        });

        engine.play(queue[0].clone(), Some(queue.clone()));

        let state = engine.state();
        assert_eq!(state.queue.current_index, Some(1));
        assert_eq!(state.repeat_mode, RepeatMode::TrackRepeat);
    }

    #[test]
    fn detached_listener_stops_receiving() {
        let (engine, _) = engine();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let id = engine.on(EventKind::Pause, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        engine.handle_device_event(DeviceEvent::Pause);
        assert!(engine.off(EventKind::Pause, id));
        engine.handle_device_event(DeviceEvent::Pause);
        assert_eq!(calls.get(), 1);

        record(&engine, EventKind::Pause);
        engine.off_all(EventKind::Pause);
        assert_eq!(engine.events().listener_count(EventKind::Pause), 0);
    }
}
