// Interchange document - Portable marker list, optionally carrying its media inline

use crate::error::{SyncError, SyncResult};
use crate::project::codec::optional_base64;
use crate::project::types::{MediaFile, Project};
use crate::project::validate_markers;
use crate::sync::marker::Marker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Highest document version this crate reads and the one it writes
pub const INTERCHANGE_VERSION: u32 = 1;

/// Whether media bytes travel inside the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embed {
    /// File names only; bytes are supplied separately on import
    References,
    /// Score and audio embedded as base64 payloads
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterchangeDocument {
    pub version: u32,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub total_bars: u32,
    #[serde(default)]
    pub audio_duration: f64,
    pub markers: Vec<Marker>,
    pub score_file: String,
    pub audio_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_base64"
    )]
    pub score_data: Option<Vec<u8>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_base64"
    )]
    pub audio_data: Option<Vec<u8>>,
}

impl InterchangeDocument {
    pub fn from_project(project: &Project, embed: Embed) -> Self {
        let (score_data, audio_data) = match embed {
            Embed::References => (None, None),
            Embed::Inline => (
                Some(project.score.bytes.clone()),
                Some(project.audio.bytes.clone()),
            ),
        };

        Self {
            version: INTERCHANGE_VERSION,
            title: project.title.clone(),
            artist: project.artist.clone(),
            total_bars: project.total_bars,
            audio_duration: project.audio_duration,
            markers: project.markers.clone(),
            score_file: project.score.name.clone(),
            audio_file: project.audio.name.clone(),
            exported_at: Some(Utc::now()),
            score_data,
            audio_data,
        }
    }

    /// Whether both media payloads are embedded
    pub fn is_self_contained(&self) -> bool {
        self.score_data.is_some() && self.audio_data.is_some()
    }

    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a document
    pub fn from_json(text: &str) -> SyncResult<Self> {
        let document: InterchangeDocument = serde_json::from_str(text)
            .map_err(|e| SyncError::InvalidDocument(format!("malformed document: {}", e)))?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.version == 0 || self.version > INTERCHANGE_VERSION {
            return Err(SyncError::InvalidDocument(format!(
                "unsupported document version {}",
                self.version
            )));
        }
        if self.total_bars == 0 {
            return Err(SyncError::InvalidDocument(
                "document has no bars".to_string(),
            ));
        }
        if !self.audio_duration.is_finite() || self.audio_duration < 0.0 {
            return Err(SyncError::InvalidDocument(format!(
                "invalid audio duration {}",
                self.audio_duration
            )));
        }

        let duration = (self.audio_duration > 0.0).then_some(self.audio_duration);
        validate_markers(&self.markers, self.total_bars, duration)
            .map_err(|e| SyncError::InvalidDocument(e.to_string()))
    }

    /// Build an unsaved project
    ///
    /// Supplied bytes take precedence over embedded payloads; media that is
    /// neither supplied nor embedded is an error.
    pub fn into_project(
        self,
        score_bytes: Option<Vec<u8>>,
        audio_bytes: Option<Vec<u8>>,
    ) -> SyncResult<Project> {
        let score = score_bytes.or(self.score_data).ok_or_else(|| {
            SyncError::InvalidDocument(format!("score '{}' was not supplied", self.score_file))
        })?;
        let audio = audio_bytes.or(self.audio_data).ok_or_else(|| {
            SyncError::InvalidDocument(format!("audio '{}' was not supplied", self.audio_file))
        })?;

        let mut project = Project::new(
            self.title,
            MediaFile::new(self.score_file, score),
            MediaFile::new(self.audio_file, audio),
        );
        project.artist = self.artist;
        project.total_bars = self.total_bars;
        project.audio_duration = self.audio_duration;
        project.markers = self.markers;
        Ok(project)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?).map_err(|e| {
            SyncError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        log::info!("Exported sync document to {}", path.display());
        Ok(())
    }

    pub fn read_from<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SyncError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}
