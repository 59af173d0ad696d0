// ScoreSync - Library exports for the CLI, tests and benchmarks

pub mod config;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod playback;
pub mod project;
pub mod score;
pub mod sync;
pub mod workspace;

// Re-export commonly used types for convenience
pub use config::SyncConfig;
pub use engine::{AudioEngine, ScoreRenderer};
pub use error::{MediaKind, SyncError, SyncResult};
pub use playback::{PlayState, PlaybackController, PlaybackOptions};
pub use project::{Embed, InterchangeDocument, Project, ProjectId, ProjectStore};
pub use sync::{
    BarTickMap, EmissionFilter, Marker, MarkerStore, PositionResolver, RecordingSession,
    Resolution,
};
pub use workspace::{ChannelSet, Mode, Workspace};
