//! Capture sessions for camera, screen and microphone.
//!
//! Each session acquires one media source, records it into chunks and
//! exports the result for playback or download. The host's capture and
//! recording facilities sit behind the [`capture::CaptureProvider`] and
//! [`recorder::RecorderFactory`] traits; synthetic implementations of both
//! drive the headless demo and the tests.

pub mod capture;
pub mod commands;
pub mod config;
pub mod export;
pub mod recorder;
pub mod utils;

pub use capture::{CaptureKind, CaptureOptions, CaptureProvider, MediaStream};
pub use commands::{Button, Panel, PanelView, TracingView};
pub use config::{AppConfig, PanelConfig, SessionConfig};
pub use export::{ExportSink, FileExportSink, RecordedBlob};
pub use recorder::{CaptureSessionController, RecorderFactory, SessionEvent, SessionState};
pub use utils::{SessionError, SessionResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capture_session=debug,capture_session_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
