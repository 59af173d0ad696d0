// Project persistence for ScoreSync
// ZIP container store plus the portable JSON interchange document

pub mod codec;
pub mod interchange;
pub mod store;
pub mod types;

pub use interchange::{Embed, INTERCHANGE_VERSION, InterchangeDocument};
pub use store::{PROJECT_EXTENSION, ProjectStore};
pub use types::{FormatVersion, MediaFile, Project, ProjectId, ProjectManifest, SyncRecord};

use crate::error::{SyncError, SyncResult};
use crate::sync::marker::Marker;

const MAX_TITLE_CHARS: usize = 255;
/// Slack for marker times written with a slightly different duration estimate
const DURATION_TOLERANCE: f64 = 1e-6;

/// Check that markers describe bars 1..n in order, inside the score and the audio
pub fn validate_markers(
    markers: &[Marker],
    total_bars: u32,
    audio_duration: Option<f64>,
) -> SyncResult<()> {
    for (index, marker) in markers.iter().enumerate() {
        let expected = index as u32 + 1;
        if marker.bar != expected {
            return Err(SyncError::InvalidDocument(format!(
                "marker {} is for bar {}, expected bar {}",
                index, marker.bar, expected
            )));
        }

        if marker.bar > total_bars {
            return Err(SyncError::InvalidDocument(format!(
                "marker for bar {} is beyond the last bar {}",
                marker.bar, total_bars
            )));
        }

        if !marker.time.is_finite() || marker.time < 0.0 {
            return Err(SyncError::InvalidDocument(format!(
                "bar {} has invalid time {}",
                marker.bar, marker.time
            )));
        }

        if let Some(duration) = audio_duration
            && marker.time > duration + DURATION_TOLERANCE
        {
            return Err(SyncError::InvalidDocument(format!(
                "bar {} at {:.3}s is past the end of the audio ({:.3}s)",
                marker.bar, marker.time, duration
            )));
        }
    }
    Ok(())
}

/// Validate a project before it is stored or after it is loaded
pub fn validate_project(project: &Project) -> SyncResult<()> {
    if project.title.trim().is_empty() {
        return Err(SyncError::InvalidDocument(
            "Project title cannot be empty".to_string(),
        ));
    }

    if project.title.chars().count() > MAX_TITLE_CHARS {
        return Err(SyncError::InvalidDocument(format!(
            "Project title cannot exceed {} characters",
            MAX_TITLE_CHARS
        )));
    }

    if project.total_bars == 0 {
        return Err(SyncError::InvalidDocument(
            "Project score has no bars".to_string(),
        ));
    }

    if !project.audio_duration.is_finite() || project.audio_duration <= 0.0 {
        return Err(SyncError::InvalidDocument(format!(
            "Invalid audio duration {}",
            project.audio_duration
        )));
    }

    if project.score.is_empty() {
        return Err(SyncError::InvalidDocument(
            "Project has no score data".to_string(),
        ));
    }

    if project.audio.is_empty() {
        return Err(SyncError::InvalidDocument(
            "Project has no audio data".to_string(),
        ));
    }

    validate_markers(
        &project.markers,
        project.total_bars,
        Some(project.audio_duration),
    )
}
