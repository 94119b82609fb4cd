//! Capture sources
//!
//! Stream and track abstractions, per-kind constraints and the provider
//! seam behind which the host's capture facility lives.

pub mod constraints;
pub mod synthetic;
pub mod traits;

pub use constraints::{
    AudioConstraints, CaptureOptions, ConstrainU32, DisplaySurface, MediaConstraints,
    VideoConstraints,
};
pub use synthetic::{PromptOutcome, ProviderRequest, SyntheticProvider, SyntheticTrack};
pub use traits::{
    CaptureError, CaptureKind, CaptureProvider, Facility, MediaStream, MediaTrack, StreamId,
    TrackKind,
};
