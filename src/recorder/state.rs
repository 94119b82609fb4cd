//! Recording state management
//!
//! Defines the session state machine, per-recording take tracking and the
//! events a session broadcasts to its panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label shown on the record button while idle
pub const START_RECORDING_LABEL: &str = "Start Recording";

/// Label shown on the record button while recording
pub const STOP_RECORDING_LABEL: &str = "Stop Recording";

/// State of the recorder itself
///
/// Only ever moves `Idle -> Recording -> Stopped -> Recording -> ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// Nothing recorded yet
    Idle,
    /// Currently recording
    Recording,
    /// Last recording completed
    Stopped,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// State of a whole capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No capture requested yet
    Idle,
    /// Not recording; capture is held, or must be re-requested after the
    /// source was lost
    Ready,
    /// Recording the held stream
    Recording,
    /// A recording completed and the stream is still held
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// One start/stop cycle of the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingTake {
    /// Take index (0, 1, 2, ...)
    pub index: usize,

    /// MIME type the recorder was constructed with
    pub mime_type: String,

    /// When the recorder started
    pub started_at: DateTime<Utc>,

    /// When the recorder stopped
    pub ended_at: Option<DateTime<Utc>>,
}

impl RecordingTake {
    /// Create a take starting now
    pub fn new(index: usize, mime_type: String) -> Self {
        Self {
            index,
            mime_type,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// End the take
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Duration in milliseconds, measured up to now while still running
    pub fn duration_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// Events broadcast by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session moved to a new state
    StateChanged(SessionState),
    /// User-visible message
    Notice(String),
    /// A chunk was appended to the current recording
    ChunkRecorded { index: usize, size: usize },
}

/// Which panel controls are usable, and the record button's label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelControls {
    pub start_enabled: bool,
    pub record_enabled: bool,
    pub record_label: &'static str,
    pub play_enabled: bool,
    pub download_enabled: bool,
}
