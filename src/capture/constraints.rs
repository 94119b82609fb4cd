//! Capture constraints
//!
//! Turns a panel's [`CaptureOptions`] into the constraint sets handed to
//! the capture provider for each capture kind.

use super::traits::CaptureKind;
use serde::{Deserialize, Serialize};

/// Which display surface a screen capture should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplaySurface {
    Monitor,
    Window,
    Browser,
}

/// Numeric constraint with optional ideal and upper bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstrainU32 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl ConstrainU32 {
    pub fn ideal(value: u32) -> Self {
        Self {
            ideal: Some(value),
            max: None,
        }
    }

    pub fn capped(value: u32) -> Self {
        Self {
            ideal: Some(value),
            max: Some(value),
        }
    }
}

/// Audio track constraints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    /// Exact echo cancellation requirement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo_cancellation: Option<bool>,
}

/// Video track constraints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<ConstrainU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<ConstrainU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<ConstrainU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_surface: Option<DisplaySurface>,
}

/// Full constraint set for one provider request
///
/// `None` means the request does not ask for that kind of track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
}

/// Per-panel capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureOptions {
    /// Require echo cancellation on microphone tracks
    pub echo_cancellation: bool,

    /// Camera width in pixels
    pub width: u32,

    /// Camera height in pixels
    pub height: u32,

    /// Cap resolution at the requested size instead of treating it as ideal
    pub cap_resolution: bool,

    /// Camera frame rate cap
    pub max_frame_rate: Option<u32>,

    /// Preferred display surface for screen capture
    pub display_surface: DisplaySurface,

    /// Compose a microphone track into screen capture
    pub with_microphone: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            width: 1280,
            height: 720,
            cap_resolution: false,
            max_frame_rate: None,
            display_surface: DisplaySurface::Monitor,
            with_microphone: false,
        }
    }
}

impl CaptureOptions {
    /// Constraints for the stream that defines the session
    pub fn primary_constraints(&self, kind: CaptureKind) -> MediaConstraints {
        match kind {
            CaptureKind::Camera => MediaConstraints {
                audio: Some(self.audio_constraints()),
                video: Some(self.camera_constraints()),
            },
            CaptureKind::Audio => MediaConstraints {
                audio: Some(self.audio_constraints()),
                video: None,
            },
            CaptureKind::Screen => MediaConstraints {
                audio: None,
                video: Some(VideoConstraints {
                    display_surface: Some(self.display_surface),
                    ..Default::default()
                }),
            },
        }
    }

    /// Constraints for the microphone composed into screen capture
    pub fn microphone_constraints(&self) -> MediaConstraints {
        MediaConstraints {
            audio: Some(self.audio_constraints()),
            video: None,
        }
    }

    fn audio_constraints(&self) -> AudioConstraints {
        AudioConstraints {
            echo_cancellation: Some(self.echo_cancellation),
        }
    }

    fn camera_constraints(&self) -> VideoConstraints {
        let size = |value| {
            if self.cap_resolution {
                ConstrainU32::capped(value)
            } else {
                ConstrainU32::ideal(value)
            }
        };
        VideoConstraints {
            width: Some(size(self.width)),
            height: Some(size(self.height)),
            frame_rate: self.max_frame_rate.map(ConstrainU32::capped),
            display_surface: None,
        }
    }
}
