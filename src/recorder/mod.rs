//! Recording system module
//!
//! - RecordingEngine/RecorderFactory traits the host encoder sits behind
//! - MIME type negotiation against the host's capability probe
//! - CaptureSessionController to orchestrate capture, recording and export

pub mod coordinator;
pub mod engine;
pub mod mime;
pub mod state;
pub mod synthetic;

pub use coordinator::{CaptureSessionController, SOURCE_ENDED_NOTICE};
pub use engine::{
    CapabilityProbe, ChunkBuffer, ChunkSink, RecordError, RecordResult, RecorderFactory,
    RecorderOptions, RecordingEngine,
};
pub use mime::{default_candidates, negotiate_mime_type};
pub use state::{PanelControls, RecordingState, RecordingTake, SessionEvent, SessionState};
pub use synthetic::{SyntheticRecorder, SyntheticRecorderFactory, SyntheticRecorderHandle};
