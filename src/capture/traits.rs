//! Capture trait definitions
//!
//! Host-agnostic types for capture sources: what kind of media a panel
//! captures, the tracks and streams a provider hands back, and the
//! provider itself.

use super::constraints::MediaConstraints;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// What a session captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    /// Camera video with microphone audio
    Camera,
    /// Microphone audio only
    Audio,
    /// Screen video, optionally composed with microphone audio
    Screen,
}

impl CaptureKind {
    /// Host facility that grants this kind of capture
    pub fn facility(&self) -> Facility {
        match self {
            CaptureKind::Camera | CaptureKind::Audio => Facility::UserMedia,
            CaptureKind::Screen => Facility::DisplayMedia,
        }
    }

    /// Track whose termination ends the whole source
    pub fn primary_track_kind(&self) -> TrackKind {
        match self {
            CaptureKind::Camera | CaptureKind::Screen => TrackKind::Video,
            CaptureKind::Audio => TrackKind::Audio,
        }
    }

    /// Container type used to tag exports when no codec string was negotiated
    pub fn container_mime_type(&self) -> &'static str {
        match self {
            CaptureKind::Camera | CaptureKind::Screen => "video/webm",
            CaptureKind::Audio => "audio/webm",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureKind::Camera => "camera",
            CaptureKind::Audio => "audio",
            CaptureKind::Screen => "screen",
        };
        f.write_str(name)
    }
}

/// Permission-gated capture facility offered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Facility {
    /// Camera and microphone
    UserMedia,
    /// Screen, window or tab
    DisplayMedia,
}

impl Facility {
    /// Name of the host API, used in user-facing messages
    pub fn api_name(&self) -> &'static str {
        match self {
            Facility::UserMedia => "mediaDevices.getUserMedia",
            Facility::DisplayMedia => "mediaDevices.getDisplayMedia",
        }
    }
}

/// Kind of a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Errors raised while acquiring a capture stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("Another capture or recording request is already in progress")]
    Busy,
}

/// One audio or video channel handed out by a [`CaptureProvider`]
#[async_trait]
pub trait MediaTrack: fmt::Debug + Send + Sync {
    /// Unique track ID
    fn id(&self) -> &str;

    /// Audio or video
    fn kind(&self) -> TrackKind;

    /// Human readable device label
    fn label(&self) -> &str;

    /// Whether the track still delivers media
    fn is_live(&self) -> bool;

    /// Stop the track and release the underlying device
    fn stop(&self);

    /// Resolves once the track has terminated, either because it was
    /// stopped or because the host revoked it.
    async fn ended(&self);
}

/// Identifier of an acquired stream
pub type StreamId = Uuid;

/// A live set of tracks
///
/// Cloning shares the tracks; stopping them through any clone stops them
/// for all.
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: StreamId,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    /// Create a stream from already acquired tracks
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Tracks of one kind, in insertion order
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// First track of one kind
    pub fn first_track(&self, kind: TrackKind) -> Option<Arc<dyn MediaTrack>> {
        self.tracks_of(kind).next().cloned()
    }

    /// Append a track taken from another stream
    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) {
        self.tracks.push(track);
    }

    pub fn has_live_tracks(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Host facility granting access to media streams
///
/// Requests are permission-gated and may stay pending for as long as the
/// user leaves the prompt open.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Whether the host offers the facility at all
    fn supports(&self, facility: Facility) -> bool;

    /// Acquire camera and/or microphone tracks
    async fn request_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// Acquire screen tracks
    async fn request_display_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;
}
