// BarTickMap - Bar number to renderer tick range table
// Built once per score layout, immutable afterwards

use crate::error::{SyncError, SyncResult};

/// Renderer-internal cursor coordinate (opaque to the sync engine)
pub type Tick = u64;

/// One bar's [start, end) range as reported by the renderer's layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarSpan {
    pub start: Tick,
    pub end: Tick,
}

impl BarSpan {
    pub fn new(start: Tick, end: Tick) -> Self {
        Self { start, end }
    }
}

/// A bar's tick range keyed by its 1-based bar number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarTickRange {
    pub bar: u32,
    pub start: Tick,
    pub end: Tick,
}

impl BarTickRange {
    /// Tick at `progress` (0..=1) through the bar
    pub fn position_at(&self, progress: f64) -> Tick {
        let span = self.end as f64 - self.start as f64;
        let offset = (span * progress).round();
        (self.start as f64 + offset).max(0.0) as Tick
    }

    /// Number of ticks covered by the bar (0 for degenerate ranges)
    pub fn len(&self) -> Tick {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mapping from bar number (1..=bar_count) to renderer tick range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarTickMap {
    ranges: Vec<BarTickRange>,
}

impl BarTickMap {
    /// Build the table from the renderer's per-bar layout output
    ///
    /// `spans` must be in bar order and cover at least `bar_count` bars.
    ///
    /// # Errors
    /// `IncompleteLayout` if the renderer has not reported every bar yet.
    pub fn build(bar_count: u32, spans: &[BarSpan]) -> SyncResult<Self> {
        if spans.len() < bar_count as usize {
            return Err(SyncError::IncompleteLayout {
                expected: bar_count,
                received: spans.len(),
            });
        }

        let ranges = spans
            .iter()
            .take(bar_count as usize)
            .enumerate()
            .map(|(index, span)| BarTickRange {
                bar: index as u32 + 1,
                start: span.start,
                end: span.end,
            })
            .collect::<Vec<_>>();

        for pair in ranges.windows(2) {
            if pair[0].end != pair[1].start {
                log::debug!(
                    "Bar {} ends at tick {} but bar {} starts at {}",
                    pair[0].bar,
                    pair[0].end,
                    pair[1].bar,
                    pair[1].start
                );
            }
        }

        Ok(Self { ranges })
    }

    /// Range for `bar`
    ///
    /// # Errors
    /// `NotFound` if `bar` is outside `[1, bar_count]`.
    pub fn lookup(&self, bar: u32) -> SyncResult<&BarTickRange> {
        self.get(bar)
            .ok_or_else(|| SyncError::NotFound(format!("bar {} is not in the score", bar)))
    }

    /// Non-failing variant of `lookup`
    pub fn get(&self, bar: u32) -> Option<&BarTickRange> {
        if bar == 0 {
            return None;
        }
        self.ranges.get(bar as usize - 1)
    }

    pub fn bar_count(&self) -> u32 {
        self.ranges.len() as u32
    }

    /// Tick where the score starts (bar 1), 0 for an empty score
    pub fn score_start(&self) -> Tick {
        self.ranges.first().map_or(0, |r| r.start)
    }

    pub fn ranges(&self) -> &[BarTickRange] {
        &self.ranges
    }
}
