/// A playable item handed to the engine by whoever fetched it.
///
/// The engine never edits a caller's track; the only field it touches on its
/// own copy is `duration_seconds`, which is replaced by the measured duration
/// once the device reports one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Track {
    /// Opaque identifier, unique within a queue
    pub id: String,
    pub title: String,
    pub artist: String,
    pub cover_url: String,
    /// Location the device loads audio from
    pub audio_url: String,
    /// Server-reported duration until the device measures the real one
    pub duration_seconds: f32,
}

impl Track {
    pub fn new(id: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            audio_url: audio_url.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_cover_url(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = cover_url.into();
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Whether there is anything for the device to load
    pub fn has_source(&self) -> bool {
        !self.audio_url.trim().is_empty()
    }

    /// Title for display, falling back to the id
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() { &self.id } else { &self.title }
    }
}
