// Configuration - Tunables for the sync session, stored as RON

use crate::error::{SyncError, SyncResult};
use crate::playback::{PlaybackOptions, validate_rate};
use crate::sync::tick_map::Tick;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "scoresync";
const CONFIG_FILE: &str = "config.ron";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds added to audio time while recording markers
    pub editor_lead_offset: f64,
    /// Seconds added to audio time during playback; negative trails the audio
    pub preview_lead_offset: f64,
    /// Cursor updates within the same bar smaller than this are dropped
    pub jitter_threshold_ticks: Tick,
    /// Bar stepping skips markers closer than this to the current time
    pub step_debounce: f64,
    pub default_rate: f64,
    pub default_volume: f32,
    pub looping: bool,
    /// Capacity of the audio and renderer event channels
    pub event_capacity: usize,
    pub notification_capacity: usize,
    /// Where saved projects live; platform data dir when unset
    pub store_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            editor_lead_offset: 0.0,
            preview_lead_offset: -0.15,
            jitter_threshold_ticks: 100,
            step_debounce: 0.1,
            default_rate: 1.0,
            default_volume: 1.0,
            looping: false,
            event_capacity: 256,
            notification_capacity: 64,
            store_dir: None,
        }
    }
}

impl SyncConfig {
    /// Platform location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Read and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: SyncConfig = ron::from_str(&content).map_err(|e| {
            SyncError::Storage(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Config from the platform location, defaults when absent or unreadable
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the config, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SyncError::Storage(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        validate_rate(self.default_rate)?;

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(SyncError::OutOfRange(format!(
                "default_volume {} not in [0, 1]",
                self.default_volume
            )));
        }
        if self.event_capacity == 0 || self.notification_capacity == 0 {
            return Err(SyncError::OutOfRange(
                "channel capacities must be positive".to_string(),
            ));
        }
        if !self.step_debounce.is_finite() || self.step_debounce < 0.0 {
            return Err(SyncError::OutOfRange(format!(
                "step_debounce {} must be >= 0",
                self.step_debounce
            )));
        }
        if !self.editor_lead_offset.is_finite() || !self.preview_lead_offset.is_finite() {
            return Err(SyncError::OutOfRange(
                "lead offsets must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Project store directory
    pub fn resolved_store_dir(&self) -> Option<PathBuf> {
        self.store_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR).join("projects")))
    }

    pub fn editor_options(&self) -> PlaybackOptions {
        self.playback_options(self.editor_lead_offset)
    }

    pub fn preview_options(&self) -> PlaybackOptions {
        self.playback_options(self.preview_lead_offset)
    }

    fn playback_options(&self, lead_offset: f64) -> PlaybackOptions {
        PlaybackOptions {
            lead_offset,
            jitter_threshold: self.jitter_threshold_ticks,
            step_debounce: self.step_debounce,
            rate: self.default_rate,
            volume: self.default_volume,
            looping: self.looping,
        }
    }
}
