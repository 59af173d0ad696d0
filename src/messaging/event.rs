// Engine events - Audio engine / renderer → sync session
// Load completions carry a token so superseded loads can be discarded

use crate::error::MediaKind;
use crate::sync::tick_map::BarSpan;

/// Identifies one load request of a given media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken {
    pub kind: MediaKind,
    pub generation: u64,
}

/// Events emitted by the audio engine
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Ready { token: LoadToken, duration: f64 },
    Error { token: LoadToken, reason: String },
    TimeUpdate { seconds: f64 },
    Ended,
}

/// Events emitted by the score renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    ScoreLoaded {
        token: LoadToken,
        bar_count: u32,
        tracks: Vec<String>,
    },
    LayoutFinished {
        token: LoadToken,
        spans: Vec<BarSpan>,
    },
    Error {
        token: LoadToken,
        reason: String,
    },
}

impl RendererEvent {
    pub fn token(&self) -> LoadToken {
        match self {
            RendererEvent::ScoreLoaded { token, .. }
            | RendererEvent::LayoutFinished { token, .. }
            | RendererEvent::Error { token, .. } => *token,
        }
    }
}

/// Issues load tokens and tells current completions from stale ones
#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    score: u64,
    audio: u64,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load, superseding any in-flight load of the same kind
    pub fn begin(&mut self, kind: MediaKind) -> LoadToken {
        let counter = match kind {
            MediaKind::Score => &mut self.score,
            MediaKind::Audio => &mut self.audio,
        };
        *counter += 1;
        LoadToken {
            kind,
            generation: *counter,
        }
    }

    /// The token belongs to the most recent load of its kind
    pub fn is_current(&self, token: LoadToken) -> bool {
        let latest = match token.kind {
            MediaKind::Score => self.score,
            MediaKind::Audio => self.audio,
        };
        token.generation == latest && latest != 0
    }
}
