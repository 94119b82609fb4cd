//! Error types and handling
//!
//! Umbrella error for panel commands and its user-facing rendering.

use crate::capture::CaptureError;
use crate::export::ExportError;
use crate::recorder::RecordError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Any failure a panel command can surface
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("The stream was ended by user")]
    SourceEnded,
}

impl SessionError {
    /// Stable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            SessionError::Capture(CaptureError::Unsupported(_)) => "UNSUPPORTED",
            SessionError::Capture(CaptureError::Busy) => "BUSY",
            SessionError::Record(RecordError::NoStream) => "NO_STREAM",
            SessionError::Record(RecordError::EngineUnavailable(_)) => "ENGINE_UNAVAILABLE",
            SessionError::Record(RecordError::AlreadyRecording) => "ALREADY_RECORDING",
            SessionError::Record(RecordError::Busy) => "BUSY",
            SessionError::Export(ExportError::Empty) => "EMPTY",
            SessionError::Export(ExportError::Io(_)) => "IO_ERROR",
            SessionError::SourceEnded => "SOURCE_ENDED",
        }
    }
}

/// Error response for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using SessionError
pub type SessionResult<T> = Result<T, SessionError>;
