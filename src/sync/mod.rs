// Sync core - Markers, bar tick ranges, time resolution and tapping
//
// Data flow:
// - RecordingSession appends markers while audio plays (edit mode)
// - BarTickMap is built once the renderer reports its layout
// - PositionResolver turns audio time into (bar, tick) using both

pub mod marker;
pub mod recording;
pub mod resolver;
pub mod tick_map;

pub use marker::{Marker, MarkerStore};
pub use recording::{RecordingSession, TapOutcome, TapRejection};
pub use resolver::{
    BarProgress, DEFAULT_JITTER_TICKS, EmissionFilter, PositionResolver, Resolution,
    SymbolicPosition,
};
pub use tick_map::{BarSpan, BarTickMap, BarTickRange, Tick};
