// Score - Meter-based layouts for scores the engine cannot decode itself

pub mod layout;

pub use layout::{MeteredLayout, TICKS_PER_QUARTER, TimeSignature};
