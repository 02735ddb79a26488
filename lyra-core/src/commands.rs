use crate::track::Track;

/// Commands observers send to the playback engine
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Play a track, optionally replacing the queue it belongs to
    Play {
        track: Track,
        queue: Option<Vec<Track>>,
    },
    /// Pause if playing, resume otherwise
    TogglePlay,
    Pause,
    Resume,
    /// Stop playback and rewind
    Stop,
    /// Skip to the next track per repeat mode
    Next,
    /// Skip to the previous track per repeat mode
    Previous,
    /// Seek to position in seconds
    Seek(f32),
    /// Seek to a percentage (0..=100) of the known duration
    SeekPercent(f32),
    /// Set volume (clamped to 0.0..=1.0)
    SetVolume(f32),
    /// Advance the repeat mode one step
    CycleRepeatMode,
}
