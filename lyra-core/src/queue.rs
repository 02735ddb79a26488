use rand::Rng;
use strum::EnumIter;

use crate::track::Track;

/// Repeat mode applied when resolving the next/previous track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, strum::Display)]
pub enum RepeatMode {
    #[default]
    #[strum(serialize = "🔁 Repeat All")]
    QueueRepeat,
    #[strum(serialize = "🔂 Repeat One")]
    TrackRepeat,
    #[strum(serialize = "🔀 Shuffle")]
    Shuffle,
}

impl RepeatMode {
    /// QueueRepeat -> TrackRepeat -> Shuffle -> QueueRepeat
    pub fn next(self) -> Self {
        match self {
            RepeatMode::QueueRepeat => RepeatMode::TrackRepeat,
            RepeatMode::TrackRepeat => RepeatMode::Shuffle,
            RepeatMode::Shuffle => RepeatMode::QueueRepeat,
        }
    }
}

/// Ordered tracks plus a cursor on the one loaded into the device.
///
/// When `current_index` is `Some(i)`, `i < tracks.len()` and `tracks[i]` is the
/// loaded track (not necessarily playing).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayQueue {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            current_index: None,
        }
    }

    /// Swap in a new list. The cursor is dropped; the caller reselects.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current_index = None;
    }

    /// Index of the first track with the given id
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.id == id)
    }

    /// Move the cursor. Out of range indices clear it.
    pub fn select(&mut self, index: Option<usize>) {
        self.current_index = index.filter(|&i| i < self.tracks.len());
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Index a manual "next" resolves to. `None` only when the queue is empty.
    ///
    /// TrackRepeat still advances here; it only matters for the automatic
    /// advance at end of track.
    pub fn next_index<R: Rng + ?Sized>(&self, mode: RepeatMode, rng: &mut R) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match mode {
            RepeatMode::Shuffle => Some(self.random_index(rng)),
            RepeatMode::QueueRepeat | RepeatMode::TrackRepeat => match self.current_index {
                Some(current) => Some((current + 1) % len),
                None => Some(0),
            },
        }
    }

    /// Index a manual "previous" resolves to. `None` only when the queue is empty.
    pub fn previous_index<R: Rng + ?Sized>(&self, mode: RepeatMode, rng: &mut R) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        match mode {
            RepeatMode::Shuffle => Some(self.random_index(rng)),
            RepeatMode::QueueRepeat | RepeatMode::TrackRepeat => match self.current_index {
                Some(current) => Some((current + len - 1) % len),
                None => Some(len - 1),
            },
        }
    }

    /// Uniform pick that never lands on the current index when there is a choice
    fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let len = self.tracks.len();
        match self.current_index {
            Some(current) if len > 1 => {
                let pick = rng.random_range(0..len - 1);
                if pick >= current { pick + 1 } else { pick }
            }
            Some(current) => current,
            None => rng.random_range(0..len),
        }
    }
}
