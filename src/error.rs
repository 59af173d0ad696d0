// Error taxonomy shared by the sync engine, persistence and interchange layers

use std::fmt;

/// Which kind of media a load failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MediaKind {
    Score,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Score => write!(f, "score"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Result type used across the crate
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync engine
///
/// Resolver anomalies (zero-length bars, out-of-order markers) are never
/// represented here: they are clamped and absorbed by the resolver.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Failed to load {kind}: {reason}")]
    Load { kind: MediaKind, reason: String },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Score layout incomplete: expected {expected} bars, renderer provided {received}")]
    IncompleteLayout { expected: u32, received: usize },

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("A {0} operation is already in progress")]
    Busy(&'static str),

    #[error("{0} is not loaded")]
    NotReady(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Helper for decode failures
    pub fn load(kind: MediaKind, reason: impl Into<String>) -> Self {
        SyncError::Load {
            kind,
            reason: reason.into(),
        }
    }
}
