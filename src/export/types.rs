//! Export types
//!
//! The recorded blob handed to playback and download, its container
//! format, and export errors.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container formats a recording may come out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Webm,
    Mp4,
    Ogg,
}

impl ContainerFormat {
    /// Container named by a MIME type, ignoring codec parameters
    pub fn from_mime_type(mime_type: &str) -> Self {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "video/mp4" | "audio/mp4" => ContainerFormat::Mp4,
            "audio/ogg" | "video/ogg" => ContainerFormat::Ogg,
            _ => ContainerFormat::Webm,
        }
    }

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Webm => "webm",
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Ogg => "ogg",
        }
    }
}

/// A completed recording: every chunk in order, tagged with its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBlob {
    mime_type: String,
    data: Bytes,
}

impl RecordedBlob {
    pub fn new(mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn format(&self) -> ContainerFormat {
        ContainerFormat::from_mime_type(&self.mime_type)
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing has been recorded yet")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExportError> for String {
    fn from(e: ExportError) -> String {
        e.to_string()
    }
}
