//! MIME type negotiation
//!
//! Picks the first container/codec string the host can record, falling
//! back to the empty string (host default) when none is supported.

use super::engine::CapabilityProbe;
use crate::capture::CaptureKind;

/// Preferred codec strings for video kinds, best first
pub const VIDEO_MIME_CANDIDATES: &[&str] = &[
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Preferred codec strings for audio-only capture, best first
pub const AUDIO_MIME_CANDIDATES: &[&str] = &["audio/webm;codecs=opus", "audio/webm"];

/// Default candidate list for a capture kind
pub fn default_candidates(kind: CaptureKind) -> Vec<String> {
    let candidates = match kind {
        CaptureKind::Camera | CaptureKind::Screen => VIDEO_MIME_CANDIDATES,
        CaptureKind::Audio => AUDIO_MIME_CANDIDATES,
    };
    candidates.iter().map(|c| c.to_string()).collect()
}

/// Return the first candidate the probe supports, or `""`
pub fn negotiate_mime_type<S, P>(candidates: &[S], probe: &P) -> String
where
    S: AsRef<str>,
    P: CapabilityProbe + ?Sized,
{
    for candidate in candidates {
        let candidate = candidate.as_ref();
        if probe.is_type_supported(candidate) {
            tracing::debug!("Negotiated recording type {}", candidate);
            return candidate.to_string();
        }
        tracing::debug!("{} is not supported", candidate);
    }
    tracing::warn!("No candidate recording type is supported, using host default");
    String::new()
}
