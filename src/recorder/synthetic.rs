//! In-process recording engine
//!
//! Models the host recorder closely enough to drive a session without a
//! browser: encoded bytes are fed in from outside, buffered, and flushed
//! to the sink either every timeslice or on stop.

use super::engine::{
    CapabilityProbe, ChunkSink, RecordError, RecordResult, RecorderFactory, RecorderOptions,
    RecordingEngine,
};
use super::mime::{AUDIO_MIME_CANDIDATES, VIDEO_MIME_CANDIDATES};
use crate::capture::{MediaStream, TrackKind};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Shared {
    mime_type: String,
    pending: Mutex<BytesMut>,
    recording: AtomicBool,
    timeslice: Mutex<Option<Duration>>,
    sink: ChunkSink,
}

impl Shared {
    /// Deliver everything buffered so far. The pending lock is held through
    /// delivery so a periodic flush cannot land after the final one.
    fn flush(&self) -> bool {
        let mut pending = self.pending.lock();
        let data = pending.split().freeze();
        self.sink.deliver(data)
    }
}

/// Test and demo access to a recorder created by [`SyntheticRecorderFactory`]
#[derive(Clone)]
pub struct SyntheticRecorderHandle {
    shared: Arc<Shared>,
}

impl SyntheticRecorderHandle {
    /// Buffer encoded bytes; they reach the sink on the next flush.
    /// Ignored unless recording.
    pub fn feed(&self, data: &[u8]) -> bool {
        let mut pending = self.shared.pending.lock();
        if !self.shared.recording.load(Ordering::SeqCst) {
            return false;
        }
        pending.extend_from_slice(data);
        true
    }

    /// Raise a data-available notification directly
    pub fn emit_chunk(&self, chunk: impl Into<Bytes>) -> bool {
        self.shared.sink.deliver(chunk.into())
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    pub fn mime_type(&self) -> &str {
        &self.shared.mime_type
    }

    pub fn timeslice(&self) -> Option<Duration> {
        *self.shared.timeslice.lock()
    }
}

/// Recorder whose "encoder" is whatever gets fed through its handle
pub struct SyntheticRecorder {
    shared: Arc<Shared>,
    flusher: Option<JoinHandle<()>>,
}

impl SyntheticRecorder {
    fn abort_flusher(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.abort();
        }
    }
}

#[async_trait]
impl RecordingEngine for SyntheticRecorder {
    fn mime_type(&self) -> &str {
        &self.shared.mime_type
    }

    fn start(&mut self, timeslice: Option<Duration>) -> RecordResult<()> {
        if self.shared.recording.load(Ordering::SeqCst) {
            return Err(RecordError::AlreadyRecording);
        }

        if let Some(interval) = timeslice {
            if interval.is_zero() {
                return Err(RecordError::EngineUnavailable(
                    "timeslice must be positive".to_string(),
                ));
            }
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                RecordError::EngineUnavailable("no runtime to drive periodic flushes".to_string())
            })?;
            let shared = self.shared.clone();
            self.flusher = Some(runtime.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if !shared.recording.load(Ordering::SeqCst) {
                        break;
                    }
                    shared.flush();
                }
            }));
        }

        *self.shared.timeslice.lock() = timeslice;
        self.shared.recording.store(true, Ordering::SeqCst);
        tracing::debug!(
            "Synthetic recorder started ({}, timeslice {:?})",
            self.shared.mime_type,
            timeslice
        );
        Ok(())
    }

    async fn stop(&mut self) {
        let was_recording = {
            let _pending = self.shared.pending.lock();
            self.shared.recording.swap(false, Ordering::SeqCst)
        };
        if !was_recording {
            return;
        }
        self.abort_flusher();
        self.shared.flush();
        tracing::debug!("Synthetic recorder stopped");
    }
}

impl Drop for SyntheticRecorder {
    fn drop(&mut self) {
        self.abort_flusher();
    }
}

/// Factory for [`SyntheticRecorder`]s with a fixed set of supported types
pub struct SyntheticRecorderFactory {
    supported: HashSet<String>,
    recorders: Mutex<Vec<SyntheticRecorderHandle>>,
}

impl SyntheticRecorderFactory {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported.into_iter().map(Into::into).collect(),
            recorders: Mutex::new(Vec::new()),
        }
    }

    /// Factory supporting every default WebM candidate
    pub fn webm() -> Self {
        Self::new(
            VIDEO_MIME_CANDIDATES
                .iter()
                .chain(AUDIO_MIME_CANDIDATES.iter())
                .copied(),
        )
    }

    /// Number of recorders created so far
    pub fn created(&self) -> usize {
        self.recorders.lock().len()
    }

    /// Handle to the most recently created recorder
    pub fn last_recorder(&self) -> Option<SyntheticRecorderHandle> {
        self.recorders.lock().last().cloned()
    }
}

impl CapabilityProbe for SyntheticRecorderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(mime_type)
    }
}

impl RecorderFactory for SyntheticRecorderFactory {
    fn create(
        &self,
        stream: &MediaStream,
        options: &RecorderOptions,
        sink: ChunkSink,
    ) -> RecordResult<Box<dyn RecordingEngine>> {
        if !options.mime_type.is_empty() && !self.is_type_supported(&options.mime_type) {
            return Err(RecordError::EngineUnavailable(format!(
                "NotSupportedError: {} is not supported",
                options.mime_type
            )));
        }
        if !stream.has_live_tracks() {
            return Err(RecordError::EngineUnavailable(
                "stream has no live tracks".to_string(),
            ));
        }

        let mime_type = if !options.mime_type.is_empty() {
            options.mime_type.clone()
        } else if stream.first_track(TrackKind::Video).is_some() {
            "video/webm".to_string()
        } else {
            "audio/webm".to_string()
        };

        let shared = Arc::new(Shared {
            mime_type,
            pending: Mutex::new(BytesMut::new()),
            recording: AtomicBool::new(false),
            timeslice: Mutex::new(None),
            sink,
        });
        self.recorders.lock().push(SyntheticRecorderHandle {
            shared: shared.clone(),
        });

        Ok(Box::new(SyntheticRecorder {
            shared,
            flusher: None,
        }))
    }
}
