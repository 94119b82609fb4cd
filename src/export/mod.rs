//! Recording export
//!
//! Blob types and sinks for playback URLs and file downloads.

pub mod sink;
pub mod types;

pub use sink::{file_url, ExportSink, FileExportSink};
pub use types::{ContainerFormat, ExportError, RecordedBlob};
