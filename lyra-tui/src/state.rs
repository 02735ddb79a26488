use crate::observer::Observer;

/// Application state shared by every route
pub struct AppState {
    /// Mini-player bar, attached for the whole session
    pub mini_player: Observer,
    /// Device volume, refreshed every frame
    pub volume: f32,
    /// Status message to display
    pub status_message: String,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            mini_player: Observer::new("Mini player"),
            volume: 1.0,
            status_message: "No audio loaded. Pass files or a directory as arguments.".to_string(),
        }
    }
}
