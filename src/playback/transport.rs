// Transport - Playback state owned by the controller
// Never persisted

use crate::error::{SyncError, SyncResult};

/// Play/pause/stop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, PlayState::Stopped | PlayState::Paused)
    }
}

/// Transport settings and resume point
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    pub state: PlayState,
    /// Playback rate multiplier (> 0)
    pub rate: f64,
    /// Output level in [0, 1]
    pub volume: f32,
    pub looping: bool,
    /// Resume point in seconds while not playing
    pub position: f64,
}

impl TransportState {
    pub fn new(rate: f64, volume: f32, looping: bool) -> SyncResult<Self> {
        validate_rate(rate)?;
        Ok(Self {
            state: PlayState::Stopped,
            rate,
            volume: volume.clamp(0.0, 1.0),
            looping,
            position: 0.0,
        })
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            state: PlayState::Stopped,
            rate: 1.0,
            volume: 1.0,
            looping: false,
            position: 0.0,
        }
    }
}

/// Rates must be finite and strictly positive
pub fn validate_rate(rate: f64) -> SyncResult<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(SyncError::InvalidRate(rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_state() {
        assert!(PlayState::Playing.is_playing());
        assert!(!PlayState::Playing.is_stopped());
        assert!(PlayState::Paused.is_stopped());
        assert!(PlayState::Stopped.is_stopped());
        assert_eq!(PlayState::default(), PlayState::Stopped);
    }

    #[test]
    fn test_transport_new() {
        let transport = TransportState::new(0.75, 2.0, true).unwrap();
        assert_eq!(transport.rate, 0.75);
        assert_eq!(transport.volume, 1.0);
        assert!(transport.looping);
        assert!(!transport.is_playing());
    }

    #[test]
    fn test_invalid_rates() {
        assert!(matches!(validate_rate(0.0), Err(SyncError::InvalidRate(_))));
        assert!(validate_rate(-1.0).is_err());
        assert!(validate_rate(f64::NAN).is_err());
        assert!(validate_rate(f64::INFINITY).is_err());
        assert!(validate_rate(0.01).is_ok());
    }
}
