// Metered layout - Tick ranges for a score described by its bar meters
// Ticks follow the MIDI convention of a fixed resolution per quarter note

use crate::error::{SyncError, SyncResult};
use crate::sync::tick_map::{BarSpan, Tick};
use std::fmt;
use std::str::FromStr;

/// Pulses per quarter note
pub const TICKS_PER_QUARTER: Tick = 480;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar (typically 3, 4, 5, 6, 7)
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    ///
    /// # Errors
    /// `OutOfRange` for a zero numerator or a denominator that is not a
    /// power of two up to 32.
    pub fn new(numerator: u8, denominator: u8) -> SyncResult<Self> {
        if numerator == 0 {
            return Err(SyncError::OutOfRange(
                "time signature numerator must be > 0".to_string(),
            ));
        }
        if !denominator.is_power_of_two() || denominator > 32 {
            return Err(SyncError::OutOfRange(format!(
                "time signature denominator {} must be a power of 2 up to 32",
                denominator
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self {
            numerator: 3,
            denominator: 4,
        }
    }

    /// Ticks in one bar of this meter
    pub fn ticks_per_bar(&self) -> Tick {
        self.numerator as Tick * TICKS_PER_QUARTER * 4 / self.denominator as Tick
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| SyncError::OutOfRange(format!("'{}' is not a time signature", s)))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u8>()
                .map_err(|_| SyncError::OutOfRange(format!("'{}' is not a time signature", s)))
        };
        Self::new(parse(num)?, parse(den)?)
    }
}

/// Sequence of bars, each with its own meter, laid out back to back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteredLayout {
    bars: Vec<TimeSignature>,
}

impl MeteredLayout {
    /// `bar_count` bars of the same meter
    pub fn uniform(bar_count: u32, meter: TimeSignature) -> Self {
        Self {
            bars: vec![meter; bar_count as usize],
        }
    }

    pub fn from_meters(bars: Vec<TimeSignature>) -> Self {
        Self { bars }
    }

    pub fn bar_count(&self) -> u32 {
        self.bars.len() as u32
    }

    /// Per-bar [start, end) tick ranges, in bar order
    pub fn spans(&self) -> Vec<BarSpan> {
        let mut start = 0;
        self.bars
            .iter()
            .map(|meter| {
                let end = start + meter.ticks_per_bar();
                let span = BarSpan::new(start, end);
                start = end;
                span
            })
            .collect()
    }

    /// Tick just past the last bar
    pub fn total_ticks(&self) -> Tick {
        self.bars.iter().map(TimeSignature::ticks_per_bar).sum()
    }
}
