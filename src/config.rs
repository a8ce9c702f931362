use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::video_match::{VideoMatchPolicy, VIDEO_SAMPLE_COUNT};
use crate::services::perceptual::DEFAULT_HASH_SIZE;
use crate::services::video::DEFAULT_SCALE_WIDTH;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid config {path}: {message}")]
    Invalid { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Aggregate image similarity a stored image has to beat.
    pub total_threshold: f64,
    /// Text similarity a stored image has to beat. Zero or less skips OCR.
    pub text_threshold: f64,
    pub hash_size: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            total_threshold: 85.0,
            text_threshold: 0.0,
            hash_size: DEFAULT_HASH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub sample_count: usize,
    pub scale_width: u32,
    #[serde(flatten)]
    pub policy: VideoMatchPolicy,
    /// Order video matches by match fraction instead of collection order.
    pub ranked: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            sample_count: VIDEO_SAMPLE_COUNT,
            scale_width: DEFAULT_SCALE_WIDTH,
            policy: VideoMatchPolicy::default(),
            ranked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub tesseract: PathBuf,
    /// Scratch directory for sampled frames. Defaults to the system temp dir.
    pub work_dir: Option<PathBuf>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            tesseract: PathBuf::from("tesseract"),
            work_dir: None,
        }
    }
}

impl ToolSettings {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("repostr"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: Option<PathBuf>,
    pub image: ImageSettings,
    pub video: VideoSettings,
    pub tools: ToolSettings,
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let settings: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.validate().map_err(|message| ConfigError::Invalid {
            path: path.display().to_string(),
            message,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values the matchers cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.video.policy.min_sequence_len == 0 {
            return Err("video.min_sequence_len must be at least 1".to_string());
        }
        if self.video.sample_count == 0 {
            return Err("video.sample_count must be at least 1".to_string());
        }
        if self.image.hash_size == 0 {
            return Err("image.hash_size must be at least 1".to_string());
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("repostr").join("config.json"))
}
