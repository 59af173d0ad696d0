// Markers - Manually tapped (bar, time) pairs
// The store only ever grows by the next bar and shrinks from the end

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// "Audio reached `time` exactly when bar `bar` begins"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Bar number (1-based)
    pub bar: u32,
    /// Audio time in seconds
    pub time: f64,
}

impl Marker {
    pub fn new(bar: u32, time: f64) -> Self {
        Self { bar, time }
    }
}

/// Ordered collection of markers, always covering bars 1..=len
///
/// Times are expected to be non-decreasing but this is not enforced;
/// the store only tracks whether it currently is so lookups can take the
/// binary-search path.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStore {
    markers: Vec<Marker>,
    monotonic: bool,
}

impl MarkerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            markers: Vec::new(),
            monotonic: true,
        }
    }

    /// Rebuild a store from a persisted marker list
    ///
    /// The list must describe bars 1..=n in order with finite, non-negative
    /// times. Times outside the audio duration are tolerated here since the
    /// duration may not be known yet when a project is opened.
    pub fn from_markers(markers: Vec<Marker>) -> SyncResult<Self> {
        for (index, marker) in markers.iter().enumerate() {
            let expected = index as u32 + 1;
            if marker.bar != expected {
                return Err(SyncError::OutOfRange(format!(
                    "marker #{} is for bar {}, expected bar {}",
                    index + 1,
                    marker.bar,
                    expected
                )));
            }
            if !marker.time.is_finite() || marker.time < 0.0 {
                return Err(SyncError::OutOfRange(format!(
                    "marker for bar {} has invalid time {}",
                    marker.bar, marker.time
                )));
            }
        }

        let monotonic = is_non_decreasing(&markers);
        Ok(Self { markers, monotonic })
    }

    /// Append the marker for the next unmarked bar
    ///
    /// # Errors
    /// `OutOfRange` if `bar` is not `len() + 1` or `time` is outside
    /// `[0, audio_duration]`.
    pub fn append(&mut self, bar: u32, time: f64, audio_duration: f64) -> SyncResult<Marker> {
        let next = self.next_bar();
        if bar != next {
            return Err(SyncError::OutOfRange(format!(
                "bar {} cannot be marked, next unmarked bar is {}",
                bar, next
            )));
        }
        if !time.is_finite() || time < 0.0 || time > audio_duration {
            return Err(SyncError::OutOfRange(format!(
                "time {:.3}s is outside the audio range [0, {:.3}]",
                time, audio_duration
            )));
        }

        if let Some(last) = self.markers.last()
            && time < last.time
        {
            self.monotonic = false;
        }

        let marker = Marker::new(bar, time);
        self.markers.push(marker);
        Ok(marker)
    }

    /// Remove the most recently appended marker
    ///
    /// Returns `None` when the store is already empty.
    pub fn undo_last(&mut self) -> Option<Marker> {
        let removed = self.markers.pop();
        if removed.is_some() && !self.monotonic {
            self.monotonic = is_non_decreasing(&self.markers);
        }
        removed
    }

    /// Remove every marker, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.markers.len();
        self.markers.clear();
        self.monotonic = true;
        count
    }

    /// Number of markers
    pub fn count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Every bar of a score with `total_bars` bars has been marked
    pub fn is_complete(&self, total_bars: u32) -> bool {
        self.markers.len() == total_bars as usize
    }

    /// Bar number the next `append` must use
    pub fn next_bar(&self) -> u32 {
        self.markers.len() as u32 + 1
    }

    /// Markers in insertion (= bar) order
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn last(&self) -> Option<&Marker> {
        self.markers.last()
    }

    /// Marker for a given bar
    pub fn get(&self, bar: u32) -> Option<&Marker> {
        if bar == 0 {
            return None;
        }
        self.markers.get(bar as usize - 1)
    }

    /// Whether marker times are currently non-decreasing
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// Index of the last marker (in insertion order) whose time is `<= time`
    pub fn active_index(&self, time: f64) -> Option<usize> {
        if self.monotonic {
            let reached = self.markers.partition_point(|m| m.time <= time);
            reached.checked_sub(1)
        } else {
            self.markers.iter().rposition(|m| m.time <= time)
        }
    }

    /// Latest marker time strictly before `time - debounce`
    pub fn time_before(&self, time: f64, debounce: f64) -> Option<f64> {
        let limit = time - debounce;
        self.markers
            .iter()
            .map(|m| m.time)
            .filter(|&t| t < limit)
            .fold(None, |best: Option<f64>, t| {
                Some(best.map_or(t, |b| b.max(t)))
            })
    }

    /// Earliest marker time strictly after `time + debounce`
    pub fn time_after(&self, time: f64, debounce: f64) -> Option<f64> {
        let limit = time + debounce;
        self.markers
            .iter()
            .map(|m| m.time)
            .filter(|&t| t > limit)
            .fold(None, |best: Option<f64>, t| {
                Some(best.map_or(t, |b| b.min(t)))
            })
    }
}

impl Default for MarkerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_non_decreasing(markers: &[Marker]) -> bool {
    markers.windows(2).all(|pair| pair[0].time <= pair[1].time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(times: &[f64]) -> MarkerStore {
        let mut store = MarkerStore::new();
        for (i, &t) in times.iter().enumerate() {
            store.append(i as u32 + 1, t, 100.0).unwrap();
        }
        store
    }

    #[test]
    fn test_append_in_order() {
        let store = store_with(&[0.0, 2.0, 4.1]);
        assert_eq!(store.count(), 3);
        assert_eq!(store.next_bar(), 4);
        assert_eq!(store.get(2), Some(&Marker::new(2, 2.0)));
        assert!(store.get(0).is_none());
        assert!(store.get(4).is_none());
    }

    #[test]
    fn test_append_rejects_wrong_bar() {
        let mut store = store_with(&[0.0]);
        assert!(matches!(
            store.append(3, 1.0, 10.0),
            Err(SyncError::OutOfRange(_))
        ));
        assert!(matches!(
            store.append(1, 1.0, 10.0),
            Err(SyncError::OutOfRange(_))
        ));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_append_rejects_time_outside_audio() {
        let mut store = MarkerStore::new();
        assert!(store.append(1, -0.1, 10.0).is_err());
        assert!(store.append(1, 10.5, 10.0).is_err());
        assert!(store.append(1, f64::NAN, 10.0).is_err());
        assert!(store.append(1, 10.0, 10.0).is_ok());
    }

    #[test]
    fn test_undo_round_trip() {
        let mut store = store_with(&[0.0, 2.0]);
        let before = store.clone();

        store.append(3, 4.0, 10.0).unwrap();
        assert_eq!(store.undo_last(), Some(Marker::new(3, 4.0)));
        assert_eq!(store, before);
        assert_eq!(store.next_bar(), 3);
    }

    #[test]
    fn test_undo_empty_is_noop() {
        let mut store = MarkerStore::new();
        assert_eq!(store.undo_last(), None);
        assert_eq!(store.next_bar(), 1);
    }

    #[test]
    fn test_clear_and_completion() {
        let mut store = store_with(&[0.0, 1.0, 2.0, 3.0]);
        assert!(store.is_complete(4));
        assert!(!store.is_complete(5));
        assert_eq!(store.clear(), 4);
        assert!(store.is_empty());
        assert_eq!(store.next_bar(), 1);
    }

    #[test]
    fn test_monotonic_tracking() {
        let mut store = store_with(&[0.0, 5.0]);
        assert!(store.is_monotonic());

        store.append(3, 3.0, 10.0).unwrap();
        assert!(!store.is_monotonic());

        store.undo_last();
        assert!(store.is_monotonic());
    }

    #[test]
    fn test_active_index_monotonic() {
        let store = store_with(&[0.0, 2.0, 4.1, 6.0]);
        assert_eq!(store.active_index(-1.0), None);
        assert_eq!(store.active_index(0.0), Some(0));
        assert_eq!(store.active_index(3.0), Some(1));
        assert_eq!(store.active_index(4.1), Some(2));
        assert_eq!(store.active_index(60.0), Some(3));
    }

    #[test]
    fn test_active_index_non_monotonic() {
        // Bar 3 was tapped "before" bar 2
        let store = store_with(&[0.0, 5.0, 3.0]);
        assert_eq!(store.active_index(4.0), Some(2));
        assert_eq!(store.active_index(2.0), Some(0));
        assert_eq!(store.active_index(6.0), Some(2));
    }

    #[test]
    fn test_active_index_equal_times_takes_last() {
        let store = store_with(&[0.0, 2.0, 2.0]);
        assert_eq!(store.active_index(2.0), Some(2));
    }

    #[test]
    fn test_step_targets() {
        let store = store_with(&[0.0, 2.0, 4.0]);
        assert_eq!(store.time_before(2.05, 0.1), Some(0.0));
        assert_eq!(store.time_before(2.5, 0.1), Some(2.0));
        assert_eq!(store.time_before(0.05, 0.1), None);
        assert_eq!(store.time_after(1.95, 0.1), Some(4.0));
        assert_eq!(store.time_after(1.5, 0.1), Some(2.0));
        assert_eq!(store.time_after(4.0, 0.1), None);
    }

    #[test]
    fn test_from_markers_validation() {
        let ok = MarkerStore::from_markers(vec![Marker::new(1, 0.0), Marker::new(2, 1.0)]);
        assert!(ok.is_ok());

        let gap = MarkerStore::from_markers(vec![Marker::new(1, 0.0), Marker::new(3, 1.0)]);
        assert!(matches!(gap, Err(SyncError::OutOfRange(_))));

        let negative = MarkerStore::from_markers(vec![Marker::new(1, -2.0)]);
        assert!(negative.is_err());

        let unordered =
            MarkerStore::from_markers(vec![Marker::new(1, 3.0), Marker::new(2, 1.0)]).unwrap();
        assert!(!unordered.is_monotonic());
    }
}
