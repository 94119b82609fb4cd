//! Panel configuration
//!
//! Each panel owns one capture session. Panels are configured from a JSON
//! file or fall back to the built-in screen, camera and audio-only panels.

use crate::capture::{CaptureKind, CaptureOptions};
use crate::recorder::default_candidates;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Filename recordings are downloaded under
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "test.webm";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for one capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// What the session captures
    pub kind: CaptureKind,

    /// Constraints bag handed to the capture provider
    #[serde(default)]
    pub capture: CaptureOptions,

    /// Fixed recording type; skips negotiation when set
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Candidate recording types, best first (None = defaults for the kind)
    #[serde(default)]
    pub mime_candidates: Option<Vec<String>>,

    /// Flush recorded data every this many milliseconds (None = on stop only)
    #[serde(default)]
    pub timeslice_ms: Option<u64>,

    /// Filename used when downloading the recording
    #[serde(default = "default_download_filename")]
    pub download_filename: String,
}

fn default_download_filename() -> String {
    DEFAULT_DOWNLOAD_FILENAME.to_string()
}

impl SessionConfig {
    /// Defaults for a capture kind
    pub fn new(kind: CaptureKind) -> Self {
        Self {
            kind,
            capture: CaptureOptions::default(),
            mime_type: None,
            mime_candidates: None,
            timeslice_ms: None,
            download_filename: default_download_filename(),
        }
    }

    /// Recorder flush interval; zero means flush on stop only
    pub fn timeslice(&self) -> Option<Duration> {
        self.timeslice_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Candidate recording types to negotiate for a capture kind
    pub fn candidates_for(&self, kind: CaptureKind) -> Vec<String> {
        self.mime_candidates
            .clone()
            .unwrap_or_else(|| default_candidates(kind))
    }
}

/// One demo panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    /// Panel name, also used as its download subdirectory
    pub name: String,

    #[serde(flatten)]
    pub session: SessionConfig,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub panels: Vec<PanelConfig>,

    /// Where downloads land
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut screen = SessionConfig::new(CaptureKind::Screen);
        screen.capture.with_microphone = true;
        screen.timeslice_ms = Some(5000);

        Self {
            panels: vec![
                PanelConfig {
                    name: "screen-cap".to_string(),
                    session: screen,
                },
                PanelConfig {
                    name: "camera".to_string(),
                    session: SessionConfig::new(CaptureKind::Camera),
                },
                PanelConfig {
                    name: "audio-only".to_string(),
                    session: SessionConfig::new(CaptureKind::Audio),
                },
            ],
            output_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded {} panel(s) from {:?}", config.panels.len(), path);
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for panel in &self.panels {
            if panel.name.is_empty() {
                return Err(ConfigError::Invalid("panel name is empty".to_string()));
            }
            if !names.insert(panel.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate panel name: {}",
                    panel.name
                )));
            }
            if panel.session.download_filename.is_empty()
                || panel.session.download_filename.contains(['/', '\\'])
            {
                return Err(ConfigError::Invalid(format!(
                    "panel {}: download filename must be a plain file name",
                    panel.name
                )));
            }
        }
        Ok(())
    }
}
