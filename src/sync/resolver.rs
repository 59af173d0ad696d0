// PositionResolver - Audio time to symbolic score position
//
// Piecewise-linear interpolation between tapped markers:
// 1. shift the audio time by the lead offset
// 2. pick the last marker (insertion order) reached at that time
// 3. interpolate between it and the following marker (or end of audio)
// 4. map the progress into the bar's renderer tick range

use crate::sync::marker::MarkerStore;
use crate::sync::tick_map::{BarTickMap, Tick};

/// Default damping threshold between two cursor updates inside one bar
pub const DEFAULT_JITTER_TICKS: Tick = 100;

/// Bars shorter than this are treated as zero-length
const MIN_BAR_SECONDS: f64 = 1e-9;

/// Where inside which bar the (offset) audio time falls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarProgress {
    pub bar: u32,
    /// Always within [0, 1]
    pub progress: f64,
    pub bar_start_time: f64,
    pub bar_end_time: f64,
}

/// Fully resolved cursor position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolicPosition {
    pub bar: u32,
    pub position: Tick,
    pub progress: f64,
}

/// Outcome of resolving one audio time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Before the first marker: the cursor stays at the start of the score
    PreSync,
    /// A bar was reached but the score has no tick range for it (yet)
    Unmapped(BarProgress),
    /// Cursor position ready to be applied to the renderer
    Located(SymbolicPosition),
}

impl Resolution {
    pub fn bar(&self) -> Option<u32> {
        match self {
            Resolution::PreSync => None,
            Resolution::Unmapped(p) => Some(p.bar),
            Resolution::Located(p) => Some(p.bar),
        }
    }

    pub fn progress(&self) -> Option<f64> {
        match self {
            Resolution::PreSync => None,
            Resolution::Unmapped(p) => Some(p.progress),
            Resolution::Located(p) => Some(p.progress),
        }
    }
}

/// Stateless time → position mapping, parameterized by the lead offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionResolver {
    lead_offset: f64,
}

impl PositionResolver {
    /// `lead_offset` is added to the audio time before resolving;
    /// a negative value makes the cursor trail the audio
    pub fn new(lead_offset: f64) -> Self {
        let lead_offset = if lead_offset.is_finite() {
            lead_offset
        } else {
            0.0
        };
        Self { lead_offset }
    }

    pub fn lead_offset(&self) -> f64 {
        self.lead_offset
    }

    /// Bar and progress at `time`, or `None` before the first marker
    pub fn locate(
        &self,
        time: f64,
        markers: &MarkerStore,
        audio_duration: Option<f64>,
    ) -> Option<BarProgress> {
        let shifted = time + self.lead_offset;
        let index = markers.active_index(shifted)?;
        let all = markers.markers();
        let active = all[index];

        let bar_end_time = match all.get(index + 1) {
            Some(next) => next.time,
            None => audio_duration.unwrap_or(active.time),
        };

        let length = bar_end_time - active.time;
        let progress = if length > MIN_BAR_SECONDS {
            ((shifted - active.time) / length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        // NaN guard for pathological inputs
        let progress = if progress.is_nan() { 0.0 } else { progress };

        Some(BarProgress {
            bar: active.bar,
            progress,
            bar_start_time: active.time,
            bar_end_time,
        })
    }

    /// Full resolution including the renderer tick position
    pub fn resolve(
        &self,
        time: f64,
        markers: &MarkerStore,
        ticks: Option<&BarTickMap>,
        audio_duration: Option<f64>,
    ) -> Resolution {
        let Some(located) = self.locate(time, markers, audio_duration) else {
            return Resolution::PreSync;
        };

        match ticks.and_then(|map| map.get(located.bar)) {
            Some(range) => Resolution::Located(SymbolicPosition {
                bar: located.bar,
                position: range.position_at(located.progress),
                progress: located.progress,
            }),
            None => Resolution::Unmapped(located),
        }
    }
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastEmission {
    Start,
    At { bar: u32, position: Tick },
}

/// Damps re-application of the cursor on every frame
///
/// An update passes when the bar changed or the position moved by more
/// than `threshold` ticks since the last update that passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionFilter {
    threshold: Tick,
    last: Option<LastEmission>,
}

impl EmissionFilter {
    pub fn new(threshold: Tick) -> Self {
        Self {
            threshold,
            last: None,
        }
    }

    pub fn threshold(&self) -> Tick {
        self.threshold
    }

    /// Whether `position` should be applied to the renderer
    pub fn admit(&mut self, position: &SymbolicPosition) -> bool {
        let pass = match self.last {
            Some(LastEmission::At { bar, position: last }) if bar == position.bar => {
                position.position.abs_diff(last) > self.threshold
            }
            _ => true,
        };

        if pass {
            self.last = Some(LastEmission::At {
                bar: position.bar,
                position: position.position,
            });
        } else {
            log::trace!(
                "Damped cursor update in bar {} at tick {}",
                position.bar,
                position.position
            );
        }
        pass
    }

    /// Whether the cursor needs to be parked at the score start
    pub fn admit_start(&mut self) -> bool {
        if self.last == Some(LastEmission::Start) {
            return false;
        }
        self.last = Some(LastEmission::Start);
        true
    }

    /// Forget the last emission so the next update always passes
    pub fn reset(&mut self) {
        self.last = None;
    }
}

impl Default for EmissionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_TICKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::tick_map::BarSpan;

    fn markers(times: &[f64]) -> MarkerStore {
        let mut store = MarkerStore::new();
        for (i, &t) in times.iter().enumerate() {
            store.append(i as u32 + 1, t, 100.0).unwrap();
        }
        store
    }

    fn tick_map(bars: u32) -> BarTickMap {
        let spans = (0..bars as u64)
            .map(|i| BarSpan::new(i * 1920, (i + 1) * 1920))
            .collect::<Vec<_>>();
        BarTickMap::build(bars, &spans).unwrap()
    }

    #[test]
    fn test_four_bar_scenario() {
        let store = markers(&[0.0, 2.0, 4.1, 6.0]);
        let resolver = PositionResolver::default();

        let located = resolver.locate(3.0, &store, Some(8.0)).unwrap();
        assert_eq!(located.bar, 2);
        assert!((located.progress - 1.0 / 2.1).abs() < 1e-9);
        assert!((located.progress - 0.476).abs() < 1e-3);
    }

    #[test]
    fn test_pre_sync() {
        let store = markers(&[1.0, 2.0]);
        let resolver = PositionResolver::default();

        assert_eq!(
            resolver.resolve(-1.0, &store, Some(&tick_map(2)), Some(4.0)),
            Resolution::PreSync
        );
        assert_eq!(
            resolver.resolve(0.5, &store, Some(&tick_map(2)), Some(4.0)),
            Resolution::PreSync
        );
        assert_eq!(
            resolver.resolve(1.0, &MarkerStore::new(), None, Some(4.0)),
            Resolution::PreSync
        );
    }

    #[test]
    fn test_last_bar_runs_to_end_of_audio() {
        let store = markers(&[0.0, 2.0]);
        let resolver = PositionResolver::default();

        let mid = resolver.locate(3.0, &store, Some(4.0)).unwrap();
        assert_eq!(mid.bar, 2);
        assert!((mid.progress - 0.5).abs() < 1e-9);

        let end = resolver.locate(4.0, &store, Some(4.0)).unwrap();
        assert_eq!(end.progress, 1.0);

        let past = resolver.locate(9.0, &store, Some(4.0)).unwrap();
        assert_eq!(past.bar, 2);
        assert_eq!(past.progress, 1.0);
    }

    #[test]
    fn test_zero_length_bar() {
        let store = markers(&[0.0, 2.0, 2.0, 3.0]);
        let resolver = PositionResolver::default();

        // Equal times: bar 3 wins, bar 2 is never active
        let located = resolver.locate(2.0, &store, Some(5.0)).unwrap();
        assert_eq!(located.bar, 3);
        assert_eq!(located.progress, 0.0);

        // Unknown duration after the last marker
        let tail = resolver.locate(4.0, &store, None).unwrap();
        assert_eq!(tail.bar, 4);
        assert_eq!(tail.progress, 0.0);
    }

    #[test]
    fn test_non_monotonic_markers_never_nan() {
        let store = markers(&[0.0, 5.0, 3.0, 4.0]);
        let resolver = PositionResolver::default();

        for step in 0..100 {
            let t = step as f64 * 0.1;
            if let Some(located) = resolver.locate(t, &store, Some(10.0)) {
                assert!(!located.progress.is_nan());
                assert!((0.0..=1.0).contains(&located.progress));
            }
        }
    }

    #[test]
    fn test_lead_offset_delays_cursor() {
        let store = markers(&[0.0, 2.0, 4.0]);
        let preview = PositionResolver::new(-0.15);

        // Audio is at 2.1s but the cursor should still be in bar 1
        let located = preview.locate(2.1, &store, Some(6.0)).unwrap();
        assert_eq!(located.bar, 1);

        let located = preview.locate(2.2, &store, Some(6.0)).unwrap();
        assert_eq!(located.bar, 2);
        assert!((located.progress - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_offset_is_ignored() {
        assert_eq!(PositionResolver::new(f64::NAN).lead_offset(), 0.0);
    }

    #[test]
    fn test_resolve_to_ticks() {
        let store = markers(&[0.0, 2.0, 4.0]);
        let resolver = PositionResolver::default();
        let map = tick_map(3);

        match resolver.resolve(3.0, &store, Some(&map), Some(6.0)) {
            Resolution::Located(pos) => {
                assert_eq!(pos.bar, 2);
                assert_eq!(pos.position, 1920 + 960);
            }
            other => panic!("unexpected resolution {:?}", other),
        }
    }

    #[test]
    fn test_unmapped_without_tick_map() {
        let store = markers(&[0.0, 2.0]);
        let resolver = PositionResolver::default();

        let resolution = resolver.resolve(1.0, &store, None, Some(4.0));
        assert!(matches!(resolution, Resolution::Unmapped(p) if p.bar == 1));

        // Marker beyond the score's last bar
        let resolution = resolver.resolve(3.0, &store, Some(&tick_map(1)), Some(4.0));
        assert_eq!(resolution.bar(), Some(2));
        assert!(matches!(resolution, Resolution::Unmapped(_)));
    }

    #[test]
    fn test_emission_filter_damping() {
        let mut filter = EmissionFilter::new(100);
        let at = |bar, position| SymbolicPosition {
            bar,
            position,
            progress: 0.0,
        };

        assert!(filter.admit(&at(1, 0)));
        assert!(!filter.admit(&at(1, 50)));
        assert!(!filter.admit(&at(1, 100)));
        assert!(filter.admit(&at(1, 101)));
        // Bar change always passes
        assert!(filter.admit(&at(2, 105)));

        filter.reset();
        assert!(filter.admit(&at(2, 105)));
    }

    #[test]
    fn test_emission_filter_start() {
        let mut filter = EmissionFilter::default();
        assert!(filter.admit_start());
        assert!(!filter.admit_start());
        assert!(filter.admit(&SymbolicPosition {
            bar: 1,
            position: 0,
            progress: 0.0,
        }));
        assert!(filter.admit_start());
    }
}
