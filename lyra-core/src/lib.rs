pub mod backend;
pub mod commands;
pub mod device;
pub mod engine;
pub mod events;
pub mod queue;
pub mod time;
pub mod track;

pub use engine::{EngineConfig, PlaybackEngine, PlaybackState, PlayerStatus};
pub use events::{EventKind, PlaybackEvent};
pub use track::Track;
