// Types for project persistence

use crate::error::{SyncError, SyncResult};
use crate::sync::marker::Marker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque project identity, assigned on first save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = SyncError;

    /// Ids that cannot be parsed can never name a stored project
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(ProjectId)
            .map_err(|_| SyncError::NotFound(format!("project {}", s)))
    }
}

/// Container format version
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
}

impl FormatVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn current() -> Self {
        Self::new(1, 0)
    }

    /// Older and same-major versions load as-is; a newer major does not
    pub fn ensure_supported(&self) -> SyncResult<()> {
        let current = Self::current();
        if self.major > current.major {
            return Err(SyncError::InvalidDocument(format!(
                "project format v{} is newer than supported v{}",
                self, current
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Named media payload (score or audio), kept as raw bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A saved alignment of one score with one recording
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// `None` until the first save
    pub id: Option<ProjectId>,
    pub title: String,
    pub artist: String,
    pub score: MediaFile,
    pub audio: MediaFile,
    pub markers: Vec<Marker>,
    pub total_bars: u32,
    /// Seconds
    pub audio_duration: f64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(title: impl Into<String>, score: MediaFile, audio: MediaFile) -> Self {
        Self {
            id: None,
            title: title.into(),
            artist: String::new(),
            score,
            audio,
            markers: Vec::new(),
            total_bars: 0,
            audio_duration: 0.0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}

/// Summary stored as `manifest.json` in each container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectManifest {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub total_bars: u32,
    pub audio_duration: f64,
    pub marker_count: usize,
    pub score_file: String,
    pub audio_file: String,
    pub version: FormatVersion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectManifest {
    pub(crate) fn describe(
        project: &Project,
        id: ProjectId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: project.title.clone(),
            artist: project.artist.clone(),
            total_bars: project.total_bars,
            audio_duration: project.audio_duration,
            marker_count: project.markers.len(),
            score_file: project.score.name.clone(),
            audio_file: project.audio.name.clone(),
            version: FormatVersion::current(),
            created_at,
            updated_at,
        }
    }
}

/// Sync data stored as `sync.ron` in each container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRecord {
    pub total_bars: u32,
    pub audio_duration: f64,
    pub markers: Vec<Marker>,
}
