//! Recording engine seam
//!
//! The host's encoder sits behind [`RecorderFactory`] and
//! [`RecordingEngine`]. Engines report encoded data through a
//! [`ChunkSink`], which appends it to the owning session in arrival order.

use super::state::SessionEvent;
use crate::capture::MediaStream;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Recording errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("No stream to record; start a capture first")]
    NoStream,

    #[error("Exception while creating recorder: {0}")]
    EngineUnavailable(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Another capture or recording request is already in progress")]
    Busy,
}

/// Result type for recording operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Answers whether the host can record a container/codec string
pub trait CapabilityProbe: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;
}

/// Options a recorder is constructed with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderOptions {
    /// Container/codec string; empty leaves the choice to the host
    pub mime_type: String,
}

/// Builds recording engines for a stream
pub trait RecorderFactory: CapabilityProbe {
    fn create(
        &self,
        stream: &MediaStream,
        options: &RecorderOptions,
        sink: ChunkSink,
    ) -> RecordResult<Box<dyn RecordingEngine>>;
}

/// A live encoder for one recording
#[async_trait]
pub trait RecordingEngine: Send {
    /// MIME type actually in use
    fn mime_type(&self) -> &str;

    /// Begin encoding. With a timeslice, data is flushed to the sink every
    /// interval; without one, only on stop.
    fn start(&mut self, timeslice: Option<Duration>) -> RecordResult<()>;

    /// Stop encoding. Resolves after the final buffered data has been
    /// delivered to the sink.
    async fn stop(&mut self);
}

/// Chunks recorded by a session
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    generation: u64,
    chunks: Vec<Bytes>,
}

impl ChunkBuffer {
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Concatenate every chunk in order
    pub fn concat(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.total_size());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out.freeze()
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation + 1
    }

    /// Start a new recording: drop previous chunks and reject anything
    /// still arriving from older sinks.
    pub(crate) fn begin(&mut self, generation: u64) {
        self.generation = generation;
        self.chunks.clear();
    }
}

/// Ordered data-available channel from an engine to its session
#[derive(Debug, Clone)]
pub struct ChunkSink {
    buffer: Arc<Mutex<ChunkBuffer>>,
    generation: u64,
    events: broadcast::Sender<SessionEvent>,
}

impl ChunkSink {
    pub(crate) fn new(
        buffer: Arc<Mutex<ChunkBuffer>>,
        generation: u64,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            buffer,
            generation,
            events,
        }
    }

    /// Deliver one chunk. Empty chunks are skipped. Returns whether the
    /// chunk was appended.
    pub fn deliver(&self, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            tracing::trace!("Skipping empty chunk");
            return false;
        }

        let size = chunk.len();
        let index = {
            let mut buffer = self.buffer.lock();
            if buffer.generation != self.generation {
                tracing::warn!(
                    "Dropping {} byte chunk from a superseded recording (generation {}, current {})",
                    size,
                    self.generation,
                    buffer.generation
                );
                return false;
            }
            buffer.chunks.push(chunk);
            buffer.chunks.len() - 1
        };

        tracing::debug!("Recorded chunk #{} ({} bytes)", index, size);
        let _ = self.events.send(SessionEvent::ChunkRecorded { index, size });
        true
    }
}
