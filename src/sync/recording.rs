// RecordingSession - Edit-mode tapping state machine
// Owns the marker store; the next bar to mark is always count + 1

use crate::error::SyncResult;
use crate::sync::marker::{Marker, MarkerStore};

/// Why a tap did not produce a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapRejection {
    ScoreNotLoaded,
    AudioNotLoaded,
    AllBarsMarked,
}

impl std::fmt::Display for TapRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TapRejection::ScoreNotLoaded => write!(f, "no score loaded"),
            TapRejection::AudioNotLoaded => write!(f, "no audio loaded"),
            TapRejection::AllBarsMarked => write!(f, "every bar is already marked"),
        }
    }
}

/// Result of a tap that did not fail hard
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    Marked(Marker),
    Ignored(TapRejection),
}

/// Incremental bar-by-bar marker capture
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    markers: MarkerStore,
    total_bars: Option<u32>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a session from existing markers
    pub fn with_markers(markers: MarkerStore, total_bars: Option<u32>) -> Self {
        Self {
            markers,
            total_bars,
        }
    }

    /// Called when a score finishes loading
    pub fn set_total_bars(&mut self, total_bars: Option<u32>) {
        self.total_bars = total_bars;
    }

    pub fn total_bars(&self) -> Option<u32> {
        self.total_bars
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    /// Bar that the next tap will mark
    pub fn next_bar_to_mark(&self) -> u32 {
        self.markers.next_bar()
    }

    /// All bars of the loaded score are marked
    pub fn is_complete(&self) -> bool {
        self.total_bars
            .is_some_and(|total| self.next_bar_to_mark() > total)
    }

    /// Mark the next bar at the current audio position
    ///
    /// `audio` is `(current_time, duration)` of the loaded audio, if any.
    /// Missing media or a completed session is reported as `Ignored`;
    /// only a time outside the audio range is an error.
    pub fn tap(&mut self, audio: Option<(f64, f64)>) -> SyncResult<TapOutcome> {
        let Some(total_bars) = self.total_bars else {
            return Ok(TapOutcome::Ignored(TapRejection::ScoreNotLoaded));
        };
        let Some((current_time, duration)) = audio else {
            return Ok(TapOutcome::Ignored(TapRejection::AudioNotLoaded));
        };

        let bar = self.next_bar_to_mark();
        if bar > total_bars {
            return Ok(TapOutcome::Ignored(TapRejection::AllBarsMarked));
        }

        let marker = self.markers.append(bar, current_time, duration)?;
        log::debug!("Marked bar {} at {:.3}s", marker.bar, marker.time);
        Ok(TapOutcome::Marked(marker))
    }

    /// Remove the last marker
    pub fn undo(&mut self) -> Option<Marker> {
        let removed = self.markers.undo_last();
        if removed.is_none() {
            log::info!("Nothing to undo");
        }
        removed
    }

    /// Remove every marker; confirmation is the caller's job
    pub fn clear(&mut self) -> usize {
        self.markers.clear()
    }

    /// Replace all markers (project open / import)
    pub fn replace_markers(&mut self, markers: MarkerStore) {
        self.markers = markers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total_bars: u32) -> RecordingSession {
        let mut session = RecordingSession::new();
        session.set_total_bars(Some(total_bars));
        session
    }

    #[test]
    fn test_tap_sequence() {
        let mut session = session(4);
        for t in [0.0, 2.0, 4.1, 6.0] {
            assert!(matches!(
                session.tap(Some((t, 10.0))).unwrap(),
                TapOutcome::Marked(_)
            ));
        }

        let expected = vec![
            Marker::new(1, 0.0),
            Marker::new(2, 2.0),
            Marker::new(3, 4.1),
            Marker::new(4, 6.0),
        ];
        assert_eq!(session.markers().markers(), expected.as_slice());
        assert!(session.is_complete());
        assert_eq!(session.next_bar_to_mark(), 5);
    }

    #[test]
    fn test_tap_when_complete_is_noop() {
        let mut session = session(1);
        session.tap(Some((0.0, 10.0))).unwrap();

        let outcome = session.tap(Some((1.0, 10.0))).unwrap();
        assert_eq!(outcome, TapOutcome::Ignored(TapRejection::AllBarsMarked));
        assert_eq!(session.markers().count(), 1);
    }

    #[test]
    fn test_tap_without_media() {
        let mut session = RecordingSession::new();
        assert_eq!(
            session.tap(Some((0.0, 10.0))).unwrap(),
            TapOutcome::Ignored(TapRejection::ScoreNotLoaded)
        );

        session.set_total_bars(Some(4));
        assert_eq!(
            session.tap(None).unwrap(),
            TapOutcome::Ignored(TapRejection::AudioNotLoaded)
        );
        assert!(session.markers().is_empty());
    }

    #[test]
    fn test_tap_outside_audio_is_error() {
        let mut session = session(4);
        assert!(session.tap(Some((12.0, 10.0))).is_err());
        assert_eq!(session.next_bar_to_mark(), 1);
    }

    #[test]
    fn test_undo_restores_next_bar() {
        let mut session = session(4);
        session.tap(Some((0.0, 10.0))).unwrap();
        session.tap(Some((1.0, 10.0))).unwrap();
        assert_eq!(session.next_bar_to_mark(), 3);

        assert_eq!(session.undo(), Some(Marker::new(2, 1.0)));
        assert_eq!(session.next_bar_to_mark(), 2);

        session.undo();
        assert_eq!(session.undo(), None);
        assert_eq!(session.next_bar_to_mark(), 1);
    }

    #[test]
    fn test_undo_reopens_completed_session() {
        let mut session = session(2);
        session.tap(Some((0.0, 10.0))).unwrap();
        session.tap(Some((1.0, 10.0))).unwrap();
        assert!(session.is_complete());

        session.undo();
        assert!(!session.is_complete());
        assert!(matches!(
            session.tap(Some((1.5, 10.0))).unwrap(),
            TapOutcome::Marked(m) if m.bar == 2
        ));
    }

    #[test]
    fn test_clear_resets() {
        let mut session = session(4);
        session.tap(Some((0.0, 10.0))).unwrap();
        session.tap(Some((1.0, 10.0))).unwrap();

        assert_eq!(session.clear(), 2);
        assert_eq!(session.next_bar_to_mark(), 1);
    }
}
