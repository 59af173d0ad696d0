// Engine contracts - The audio engine and score renderer the sync core drives
//
// Both are black boxes: loads complete asynchronously through the event
// channels in `messaging`, everything else is a direct call.

pub mod clock;
pub mod headless;
pub mod probe;

use crate::messaging::event::LoadToken;
use crate::sync::tick_map::Tick;

pub use clock::{Clock, ClockEngine, ManualClock, SystemClock};
pub use headless::HeadlessRenderer;
pub use probe::{AudioFormat, AudioInfo, probe_audio};

/// Seekable, rate-adjustable audio playback
pub trait AudioEngine {
    /// Start decoding `bytes`; completion is reported as `AudioEvent::Ready`
    /// or `AudioEvent::Error` carrying `token`
    fn load(&mut self, bytes: &[u8], token: LoadToken);

    /// Start playback at `from_seconds`
    fn play(&mut self, from_seconds: f64);

    /// Stop playback, returning the position it stopped at
    fn pause(&mut self) -> f64;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Playback rate multiplier (1.0 = normal speed)
    fn set_rate(&mut self, multiplier: f64);

    /// Output level in [0, 1]
    fn set_volume(&mut self, level: f32);
}

/// Error returned by a renderer for a cursor position it cannot show
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Renderer rejected cursor position {position}: {reason}")]
pub struct RenderError {
    pub position: Tick,
    pub reason: String,
}

/// Score rendering and cursor placement
pub trait ScoreRenderer {
    /// Start decoding and laying out `bytes`; reports `ScoreLoaded`, then
    /// `LayoutFinished` (or `Error`) carrying `token`
    fn load(&mut self, bytes: &[u8], token: LoadToken);

    /// Choose which tracks/parts are displayed
    fn set_active_tracks(&mut self, indices: &[usize]);

    /// Move the playback cursor; best effort
    fn set_cursor_position(&mut self, position: Tick) -> Result<(), RenderError>;
}
