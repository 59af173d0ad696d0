// Playback - Transport state machine and per-frame cursor sync

pub mod controller;
pub mod scheduler;
pub mod transport;

pub use controller::{
    CursorUpdate, DEFAULT_STEP_DEBOUNCE, FrameOutcome, PlaybackController, PlaybackOptions,
    SyncData,
};
pub use scheduler::{FrameHandle, FrameScheduler};
pub use transport::{PlayState, TransportState, validate_rate};
