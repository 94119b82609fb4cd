//! Capture session controller
//!
//! Owns one capture/record/playback/download lifecycle for a single media
//! source. Every failure is reported as a [`SessionEvent::Notice`] and
//! returned to the caller; none of them leave the session unusable.

use super::engine::{
    ChunkBuffer, ChunkSink, RecordError, RecordResult, RecorderFactory, RecorderOptions,
    RecordingEngine,
};
use super::mime::negotiate_mime_type;
use super::state::{
    PanelControls, RecordingState, RecordingTake, SessionEvent, SessionState,
    START_RECORDING_LABEL, STOP_RECORDING_LABEL,
};
use crate::capture::{
    CaptureError, CaptureKind, CaptureOptions, CaptureProvider, Facility, MediaStream, StreamId,
    TrackKind,
};
use crate::config::SessionConfig;
use crate::export::{ExportError, RecordedBlob};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Notice shown when the host terminates the source
pub const SOURCE_ENDED_NOTICE: &str = "The stream was ended by user";

struct SessionInner {
    kind: CaptureKind,
    state: SessionState,
    recording_state: RecordingState,
    stream: Option<MediaStream>,
    engine: Option<Box<dyn RecordingEngine>>,
    mime_type: Option<String>,
    takes: Vec<RecordingTake>,
}

/// Clears the in-flight flag when an async operation finishes
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Controller for one capture session
pub struct CaptureSessionController {
    id: Uuid,
    config: SessionConfig,
    provider: Arc<dyn CaptureProvider>,
    recorders: Arc<dyn RecorderFactory>,
    inner: Mutex<SessionInner>,
    chunks: Arc<Mutex<ChunkBuffer>>,
    in_flight: AtomicBool,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CaptureSessionController {
    /// Create a session for one panel
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn CaptureProvider>,
        recorders: Arc<dyn RecorderFactory>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let id = Uuid::new_v4();
        tracing::debug!("Created {} session {}", config.kind, id);
        Self {
            id,
            inner: Mutex::new(SessionInner {
                kind: config.kind,
                state: SessionState::Idle,
                recording_state: RecordingState::Idle,
                stream: None,
                engine: None,
                mime_type: config.mime_type.clone(),
                takes: Vec::new(),
            }),
            config,
            provider,
            recorders,
            chunks: Arc::new(Mutex::new(ChunkBuffer::default())),
            in_flight: AtomicBool::new(false),
            event_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Kind of the held (or most recently requested) capture
    pub fn kind(&self) -> CaptureKind {
        self.inner.lock().kind
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn recording_state(&self) -> RecordingState {
        self.inner.lock().recording_state
    }

    /// Resolved recording type, once known
    pub fn mime_type(&self) -> Option<String> {
        self.inner.lock().mime_type.clone()
    }

    /// The held stream, if any
    pub fn stream(&self) -> Option<MediaStream> {
        self.inner.lock().stream.clone()
    }

    pub fn recorded_chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().chunks().to_vec()
    }

    pub fn takes(&self) -> Vec<RecordingTake> {
        self.inner.lock().takes.clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Which panel controls should be enabled right now
    pub fn controls(&self) -> PanelControls {
        let supported = self.provider.supports(self.kind().facility());
        let has_chunks = !self.chunks.lock().is_empty();
        let busy = self.in_flight.load(Ordering::Acquire);
        let inner = self.inner.lock();
        let recording = inner.recording_state == RecordingState::Recording;

        PanelControls {
            start_enabled: supported && inner.stream.is_none() && !busy,
            record_enabled: inner.stream.is_some() || recording,
            record_label: if recording {
                STOP_RECORDING_LABEL
            } else {
                START_RECORDING_LABEL
            },
            play_enabled: !recording && has_chunks,
            download_enabled: !recording && has_chunks,
        }
    }

    /// Check that the host offers what this session's kind needs
    pub fn check_support(&self) -> Result<(), CaptureError> {
        let facility = self.kind().facility();
        if self.provider.supports(facility) {
            return Ok(());
        }
        let error = CaptureError::Unsupported(facility.api_name().to_string());
        self.notify(error.to_string());
        Err(error)
    }

    /// Acquire a stream of the given kind and make it the session's source
    ///
    /// Any previously held stream is released once the new one has been
    /// granted. On failure nothing changes.
    pub async fn request_capture(
        &self,
        kind: CaptureKind,
        options: &CaptureOptions,
    ) -> Result<MediaStream, CaptureError> {
        let _flight = match self.begin_flight() {
            Some(guard) => guard,
            None => {
                let error = CaptureError::Busy;
                self.notify(error.to_string());
                return Err(error);
            }
        };

        tracing::info!("Session {}: requesting {} capture", self.id, kind);
        let stream = self.acquire(kind, options).await?;

        if self.recording_state() == RecordingState::Recording {
            self.stop_recording().await;
        }

        let state = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.stream.take() {
                tracing::debug!("Releasing previous stream {}", previous.id());
                previous.stop_all();
            }
            if inner.kind != kind && self.config.mime_type.is_none() {
                inner.mime_type = None;
            }
            inner.kind = kind;
            inner.stream = Some(stream.clone());
            inner.state = SessionState::Ready;
            inner.state
        };

        tracing::info!(
            "Session {}: got stream {} with {} track(s)",
            self.id,
            stream.id(),
            stream.tracks().len()
        );
        self.emit(SessionEvent::StateChanged(state));
        Ok(stream)
    }

    async fn acquire(
        &self,
        kind: CaptureKind,
        options: &CaptureOptions,
    ) -> Result<MediaStream, CaptureError> {
        let facility = kind.facility();
        if !self.provider.supports(facility) {
            let error = CaptureError::Unsupported(facility.api_name().to_string());
            self.notify(error.to_string());
            return Err(error);
        }

        let constraints = options.primary_constraints(kind);
        tracing::debug!("Using constraints: {:?}", constraints);

        match kind {
            CaptureKind::Camera | CaptureKind::Audio => self
                .provider
                .request_user_media(&constraints)
                .await
                .map_err(|e| self.capture_failed(facility, e)),
            CaptureKind::Screen => {
                // Microphone first, then the screen it gets composed into.
                let microphone = if options.with_microphone {
                    self.acquire_microphone(options).await
                } else {
                    None
                };

                let screen = match self.provider.request_display_media(&constraints).await {
                    Ok(screen) => screen,
                    Err(e) => {
                        if let Some(microphone) = microphone {
                            microphone.stop_all();
                        }
                        return Err(self.capture_failed(facility, e));
                    }
                };

                Ok(self.compose(screen, microphone))
            }
        }
    }

    /// Best-effort microphone for screen composition
    async fn acquire_microphone(&self, options: &CaptureOptions) -> Option<MediaStream> {
        let facility = Facility::UserMedia;
        if !self.provider.supports(facility) {
            self.notify(format!(
                "{} is not supported; recording video only",
                facility.api_name()
            ));
            return None;
        }

        let constraints = options.microphone_constraints();
        tracing::debug!("Microphone constraints: {:?}", constraints);
        match self.provider.request_user_media(&constraints).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                self.capture_failed(facility, e);
                None
            }
        }
    }

    /// Append the microphone's audio track to the screen stream
    fn compose(&self, mut screen: MediaStream, microphone: Option<MediaStream>) -> MediaStream {
        let Some(microphone) = microphone else {
            tracing::info!("Composing screen capture without microphone audio");
            return screen;
        };

        match microphone.first_track(TrackKind::Audio) {
            Some(track) => {
                for other in microphone.tracks().iter().filter(|t| t.id() != track.id()) {
                    other.stop();
                }
                tracing::info!("Composed microphone track {} into screen capture", track.id());
                screen.add_track(track);
            }
            None => {
                microphone.stop_all();
                self.notify("Microphone stream has no audio track; recording video only");
            }
        }
        screen
    }

    fn capture_failed(&self, facility: Facility, error: CaptureError) -> CaptureError {
        tracing::error!("{} error: {}", facility.api_name(), error);
        self.notify(format!("{} error: {}", facility.api_name(), error));
        error
    }

    /// Start recording the held stream
    ///
    /// Clears previously recorded chunks once the recorder is running. On
    /// failure the session is left exactly as it was.
    pub fn start_recording(&self) -> RecordResult<()> {
        let _flight = match self.begin_flight() {
            Some(guard) => guard,
            None => return Err(self.record_failed(RecordError::Busy)),
        };

        let (state, take) = {
            let mut inner = self.inner.lock();
            if inner.recording_state == RecordingState::Recording {
                drop(inner);
                return Err(self.record_failed(RecordError::AlreadyRecording));
            }
            let Some(stream) = inner.stream.clone() else {
                drop(inner);
                return Err(self.record_failed(RecordError::NoStream));
            };

            let mime_type = match inner.mime_type.clone() {
                Some(mime_type) => mime_type,
                None => {
                    let candidates = self.config.candidates_for(inner.kind);
                    let negotiated = negotiate_mime_type(&candidates, self.recorders.as_ref());
                    inner.mime_type = Some(negotiated.clone());
                    negotiated
                }
            };

            let generation = self.chunks.lock().next_generation();
            let sink = ChunkSink::new(self.chunks.clone(), generation, self.event_tx.clone());
            let options = RecorderOptions {
                mime_type: mime_type.clone(),
            };
            tracing::debug!("Recorder options: {:?}", options);

            let mut engine = match self.recorders.create(&stream, &options, sink) {
                Ok(engine) => engine,
                Err(e) => {
                    drop(inner);
                    return Err(self.record_failed(e));
                }
            };
            if let Err(e) = engine.start(self.config.timeslice()) {
                drop(inner);
                return Err(self.record_failed(e));
            }
            self.chunks.lock().begin(generation);

            let take = RecordingTake::new(inner.takes.len(), engine.mime_type().to_string());
            inner.takes.push(take.clone());
            inner.engine = Some(engine);
            inner.recording_state = RecordingState::Recording;
            inner.state = SessionState::Recording;
            (inner.state, take)
        };

        tracing::info!(
            "Session {}: recording take #{} as {:?}",
            self.id,
            take.index,
            take.mime_type
        );
        self.emit(SessionEvent::StateChanged(state));
        Ok(())
    }

    fn record_failed(&self, error: RecordError) -> RecordError {
        tracing::error!("Session {}: {}", self.id, error);
        self.notify(error.to_string());
        error
    }

    /// Stop recording, flushing the recorder's buffered data
    ///
    /// Does nothing unless recording.
    pub async fn stop_recording(&self) {
        let engine = {
            let mut inner = self.inner.lock();
            if inner.recording_state != RecordingState::Recording {
                return;
            }
            inner.recording_state = RecordingState::Stopped;
            inner.state = if inner.stream.is_some() {
                SessionState::Stopped
            } else {
                SessionState::Ready
            };
            if let Some(take) = inner.takes.last_mut() {
                take.end();
            }
            inner.engine.take()
        };

        if let Some(mut engine) = engine {
            engine.stop().await;
        }

        let (count, size) = {
            let chunks = self.chunks.lock();
            (chunks.chunks().len(), chunks.total_size())
        };
        tracing::info!(
            "Session {}: recording stopped, {} chunk(s), {} bytes",
            self.id,
            count,
            size
        );
        let state = self.state();
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Handle termination of the source by the host
    ///
    /// Notifications for streams the session no longer holds are ignored.
    pub async fn on_source_ended(&self, stream_id: StreamId) {
        let current = self.inner.lock().stream.as_ref().map(MediaStream::id);
        if current != Some(stream_id) {
            tracing::debug!("Ignoring end of stale stream {}", stream_id);
            return;
        }

        tracing::warn!("Session {}: source {} ended", self.id, stream_id);
        self.notify(SOURCE_ENDED_NOTICE);
        self.stop_recording().await;
        self.drop_stream(Some(stream_id));
    }

    /// Stop sharing: stop any recording and release the source
    ///
    /// Recorded data stays available for export.
    pub async fn release(&self) {
        self.stop_recording().await;
        self.drop_stream(None);
    }

    fn drop_stream(&self, only: Option<StreamId>) {
        let state = {
            let mut inner = self.inner.lock();
            let matches = match (&inner.stream, only) {
                (Some(stream), Some(id)) => stream.id() == id,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !matches {
                return;
            }
            if let Some(stream) = inner.stream.take() {
                stream.stop_all();
                tracing::info!("Session {}: released stream {}", self.id, stream.id());
            }
            inner.state = SessionState::Ready;
            inner.state
        };
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Concatenate the recorded chunks into one tagged blob
    pub fn export_recording(&self) -> Result<RecordedBlob, ExportError> {
        let data = {
            let chunks = self.chunks.lock();
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.concat())
            }
        };
        let Some(data) = data else {
            let error = ExportError::Empty;
            self.notify(error.to_string());
            return Err(error);
        };

        let mime_type = {
            let inner = self.inner.lock();
            match inner.mime_type.as_deref() {
                Some(mime_type) if !mime_type.is_empty() => mime_type.to_string(),
                _ => inner.kind.container_mime_type().to_string(),
            }
        };
        Ok(RecordedBlob::new(mime_type, data))
    }

    fn begin_flight(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.in_flight))
    }

    fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Session {}: {}", self.id, message);
        self.emit(SessionEvent::Notice(message));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for CaptureSessionController {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.engine = None;
        if let Some(stream) = inner.stream.take() {
            stream.stop_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MediaTrack, PromptOutcome, SyntheticProvider};
    use crate::recorder::SyntheticRecorderFactory;
    use tokio::sync::broadcast::error::TryRecvError;

    fn controller(
        config: SessionConfig,
        provider: &Arc<SyntheticProvider>,
        recorders: &Arc<SyntheticRecorderFactory>,
    ) -> CaptureSessionController {
        CaptureSessionController::new(config, provider.clone(), recorders.clone())
    }

    fn setup(kind: CaptureKind) -> (
        CaptureSessionController,
        Arc<SyntheticProvider>,
        Arc<SyntheticRecorderFactory>,
    ) {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(SessionConfig::new(kind), &provider, &recorders);
        (session, provider, recorders)
    }

    fn screen_with_microphone() -> SessionConfig {
        let mut config = SessionConfig::new(CaptureKind::Screen);
        config.capture.with_microphone = true;
        config
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    async fn capture(session: &CaptureSessionController) -> MediaStream {
        let config = session.config().clone();
        session
            .request_capture(config.kind, &config.capture)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_and_export() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        assert_eq!(session.state(), SessionState::Ready);

        session.start_recording().unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        let recorder = recorders.last_recorder().unwrap();
        assert!(recorder.emit_chunk(vec![1u8; 10]));
        assert!(!recorder.emit_chunk(Bytes::new()));
        assert!(recorder.emit_chunk(vec![2u8; 20]));
        session.stop_recording().await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.recording_state(), RecordingState::Stopped);
        assert_eq!(session.recorded_chunks().len(), 2);

        let blob = session.export_recording().unwrap();
        assert_eq!(blob.size(), 30);
        assert_eq!(blob.mime_type(), "video/webm;codecs=vp9,opus");
        assert_eq!(&blob.data()[..10], &[1u8; 10]);

        let takes = session.takes();
        assert_eq!(takes.len(), 1);
        assert!(takes[0].ended_at.is_some());
    }

    #[tokio::test]
    async fn test_double_stop_is_noop() {
        let (session, _, recorders) = setup(CaptureKind::Audio);
        capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().feed(b"abc");

        session.stop_recording().await;
        let mut rx = session.subscribe();
        session.stop_recording().await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.recorded_chunks().len(), 1);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_record_without_stream() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        let mut rx = session.subscribe();

        assert_eq!(session.start_recording(), Err(RecordError::NoStream));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert_eq!(recorders.created(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::Notice(RecordError::NoStream.to_string())]
        );
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        session.start_recording().unwrap();

        assert_eq!(session.start_recording(), Err(RecordError::AlreadyRecording));
        assert_eq!(recorders.created(), 1);
        assert_eq!(session.state(), SessionState::Recording);
    }

    #[tokio::test]
    async fn test_microphone_is_requested_first() {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(screen_with_microphone(), &provider, &recorders);

        let stream = capture(&session).await;
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].facility, Facility::UserMedia);
        assert!(requests[0].constraints.video.is_none());
        assert_eq!(requests[1].facility, Facility::DisplayMedia);

        assert_eq!(stream.tracks_of(TrackKind::Video).count(), 1);
        assert_eq!(stream.tracks_of(TrackKind::Audio).count(), 1);
    }

    #[tokio::test]
    async fn test_denied_microphone_records_video_only() {
        let provider = Arc::new(SyntheticProvider::new());
        provider.set_user_media(PromptOutcome::Deny);
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(screen_with_microphone(), &provider, &recorders);
        let mut rx = session.subscribe();

        let stream = capture(&session).await;
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(stream.tracks().len(), 1);
        assert!(stream.first_track(TrackKind::Audio).is_none());

        let notices: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Notice(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("mediaDevices.getUserMedia error"));
    }

    #[tokio::test]
    async fn test_unsupported_microphone_records_video_only() {
        let provider = Arc::new(SyntheticProvider::new().without(Facility::UserMedia));
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(screen_with_microphone(), &provider, &recorders);

        let stream = capture(&session).await;
        assert_eq!(stream.tracks().len(), 1);
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_denied_screen_releases_microphone() {
        let provider = Arc::new(SyntheticProvider::new());
        provider.set_display_media(PromptOutcome::Deny);
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let config = screen_with_microphone();
        let session = controller(config.clone(), &provider, &recorders);

        let result = session.request_capture(config.kind, &config.capture).await;
        assert!(matches!(result, Err(CaptureError::PermissionDenied(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.stream().is_none());

        let microphone = provider.last_track(TrackKind::Audio).unwrap();
        assert!(!microphone.is_live());
    }

    #[tokio::test]
    async fn test_unsupported_facility_rejected_before_prompt() {
        let provider = Arc::new(SyntheticProvider::new().without(Facility::DisplayMedia));
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(SessionConfig::new(CaptureKind::Screen), &provider, &recorders);

        assert!(session.check_support().is_err());
        let config = session.config().clone();
        let result = session.request_capture(config.kind, &config.capture).await;
        assert_eq!(
            result.err(),
            Some(CaptureError::Unsupported(
                "mediaDevices.getDisplayMedia".to_string()
            ))
        );
        assert!(provider.requests().is_empty());
        assert!(!session.controls().start_enabled);
    }

    #[tokio::test]
    async fn test_negotiates_first_supported_candidate() {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::new(["C"]));
        let mut config = SessionConfig::new(CaptureKind::Camera);
        config.mime_candidates = Some(vec!["A".into(), "B".into(), "C".into()]);
        let session = controller(config, &provider, &recorders);

        capture(&session).await;
        session.start_recording().unwrap();
        assert_eq!(session.mime_type().as_deref(), Some("C"));
        assert_eq!(recorders.last_recorder().unwrap().mime_type(), "C");
    }

    #[tokio::test]
    async fn test_no_candidate_falls_back_to_host_default() {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::new(Vec::<String>::new()));
        let session = controller(SessionConfig::new(CaptureKind::Audio), &provider, &recorders);

        capture(&session).await;
        session.start_recording().unwrap();
        assert_eq!(session.mime_type().as_deref(), Some(""));
        recorders.last_recorder().unwrap().feed(b"opus");
        session.stop_recording().await;

        let blob = session.export_recording().unwrap();
        assert_eq!(blob.mime_type(), "audio/webm");
    }

    #[tokio::test]
    async fn test_forced_unsupported_type_leaves_session_unchanged() {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let mut config = SessionConfig::new(CaptureKind::Camera);
        config.mime_type = Some("video/mp4".to_string());
        let session = controller(config, &provider, &recorders);

        capture(&session).await;
        let result = session.start_recording();
        assert!(matches!(result, Err(RecordError::EngineUnavailable(_))));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.recording_state(), RecordingState::Idle);
        assert!(session.takes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_restart_keeps_previous_chunks() {
        let (session, provider, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().feed(b"take one");
        session.stop_recording().await;

        for track in provider.issued_tracks() {
            track.stop();
        }
        let result = session.start_recording();
        assert!(matches!(result, Err(RecordError::EngineUnavailable(_))));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(
            session.export_recording().unwrap().data(),
            &Bytes::from_static(b"take one")
        );
    }

    #[tokio::test]
    async fn test_new_recording_rejects_late_chunks() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        session.start_recording().unwrap();
        let first = recorders.last_recorder().unwrap();
        first.feed(b"old");
        session.stop_recording().await;

        session.start_recording().unwrap();
        assert!(session.recorded_chunks().is_empty());
        assert!(!first.emit_chunk(&b"late"[..]));

        let second = recorders.last_recorder().unwrap();
        assert!(second.emit_chunk(&b"new"[..]));
        session.stop_recording().await;
        assert_eq!(session.recorded_chunks(), vec![Bytes::from_static(b"new")]);
        assert_eq!(session.takes().len(), 2);
    }

    #[tokio::test]
    async fn test_source_ended_while_recording() {
        let (session, _, recorders) = setup(CaptureKind::Screen);
        let stream = capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().feed(b"frames");

        let mut rx = session.subscribe();
        session.on_source_ended(stream.id()).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::Notice(SOURCE_ENDED_NOTICE.to_string()),
                SessionEvent::ChunkRecorded { index: 0, size: 6 },
                SessionEvent::StateChanged(SessionState::Stopped),
                SessionEvent::StateChanged(SessionState::Ready),
            ]
        );
        assert_eq!(session.recording_state(), RecordingState::Stopped);
        assert!(session.stream().is_none());
        assert!(!stream.has_live_tracks());
        assert_eq!(session.export_recording().unwrap().size(), 6);

        let controls = session.controls();
        assert!(controls.start_enabled);
        assert!(!controls.record_enabled);
        assert_eq!(controls.record_label, START_RECORDING_LABEL);
    }

    #[tokio::test]
    async fn test_stale_source_end_is_ignored() {
        let (session, _, _) = setup(CaptureKind::Camera);
        let first = capture(&session).await;
        let second = capture(&session).await;
        session.start_recording().unwrap();

        let mut rx = session.subscribe();
        session.on_source_ended(first.id()).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.state(), SessionState::Recording);
        assert_eq!(session.stream().map(|s| s.id()), Some(second.id()));
    }

    #[tokio::test]
    async fn test_reacquire_stops_previous_tracks() {
        let (session, _, _) = setup(CaptureKind::Camera);
        let first = capture(&session).await;
        let second = capture(&session).await;

        assert!(!first.has_live_tracks());
        assert!(second.has_live_tracks());
        assert_ne!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_reacquire_stops_active_recording() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().feed(b"partial");

        capture(&session).await;
        assert_eq!(session.recording_state(), RecordingState::Stopped);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.recorded_chunks().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_request_is_busy() {
        let provider = Arc::new(SyntheticProvider::new());
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = Arc::new(controller(
            SessionConfig::new(CaptureKind::Camera),
            &provider,
            &recorders,
        ));
        let gate = provider.hold_prompts();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move {
                let options = CaptureOptions::default();
                session.request_capture(CaptureKind::Camera, &options).await
            })
        };
        while provider.requests().is_empty() {
            tokio::task::yield_now().await;
        }

        let options = CaptureOptions::default();
        let second = session.request_capture(CaptureKind::Camera, &options).await;
        assert_eq!(second.err(), Some(CaptureError::Busy));
        assert_eq!(session.start_recording(), Err(RecordError::Busy));
        assert!(!session.controls().start_enabled);

        gate.notify_one();
        assert!(pending.await.unwrap().is_ok());
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_release_keeps_recording() {
        let (session, _, recorders) = setup(CaptureKind::Audio);
        let stream = capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().feed(b"voice");

        session.release().await;
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.stream().is_none());
        assert!(!stream.has_live_tracks());
        assert!(session.export_recording().is_ok());

        let controls = session.controls();
        assert!(controls.start_enabled);
        assert!(controls.play_enabled);
        assert!(controls.download_enabled);
    }

    #[tokio::test]
    async fn test_export_before_recording_is_empty() {
        let (session, _, _) = setup(CaptureKind::Camera);
        let mut rx = session.subscribe();

        assert!(matches!(session.export_recording(), Err(ExportError::Empty)));
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::Notice(ExportError::Empty.to_string())]
        );
    }

    #[tokio::test]
    async fn test_controls_while_recording() {
        let (session, _, recorders) = setup(CaptureKind::Camera);
        capture(&session).await;
        session.start_recording().unwrap();
        recorders.last_recorder().unwrap().emit_chunk(&b"x"[..]);

        let controls = session.controls();
        assert!(!controls.start_enabled);
        assert!(controls.record_enabled);
        assert_eq!(controls.record_label, STOP_RECORDING_LABEL);
        assert!(!controls.play_enabled);
        assert!(!controls.download_enabled);
    }

    #[test]
    fn test_drop_stops_tracks() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (session, _, _) = setup(CaptureKind::Camera);
        let stream = runtime.block_on(capture(&session));

        drop(session);
        assert!(!stream.has_live_tracks());
    }

    #[tokio::test]
    async fn test_composes_only_first_microphone_audio_track() {
        let provider = Arc::new(SyntheticProvider::new());
        provider.set_user_media_tracks(vec![TrackKind::Audio, TrackKind::Audio, TrackKind::Video]);
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(screen_with_microphone(), &provider, &recorders);

        let stream = capture(&session).await;
        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.tracks_of(TrackKind::Audio).count(), 1);
        assert!(stream.tracks().iter().all(|t| t.is_live()));

        let issued = provider.issued_tracks();
        assert_eq!(issued.len(), 4);
        assert!(issued[0].is_live());
        assert!(!issued[1].is_live());
        assert!(!issued[2].is_live());
        assert!(issued[3].is_live());
    }

    #[tokio::test]
    async fn test_microphone_without_audio_track_records_video_only() {
        let provider = Arc::new(SyntheticProvider::new());
        provider.set_user_media_tracks(vec![TrackKind::Video]);
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(screen_with_microphone(), &provider, &recorders);
        let mut rx = session.subscribe();

        let stream = capture(&session).await;
        assert_eq!(stream.tracks().len(), 1);
        assert!(stream.first_track(TrackKind::Audio).is_none());

        let issued = provider.issued_tracks();
        assert!(!issued[0].is_live());
        assert!(issued[1].is_live());
        assert!(drain(&mut rx).contains(&SessionEvent::Notice(
            "Microphone stream has no audio track; recording video only".to_string()
        )));
    }

    #[tokio::test]
    async fn test_controls_follow_requested_kind() {
        let provider = Arc::new(SyntheticProvider::new().without(Facility::UserMedia));
        let recorders = Arc::new(SyntheticRecorderFactory::webm());
        let session = controller(SessionConfig::new(CaptureKind::Camera), &provider, &recorders);
        assert!(!session.controls().start_enabled);

        let options = CaptureOptions::default();
        session
            .request_capture(CaptureKind::Screen, &options)
            .await
            .unwrap();
        session.release().await;

        assert_eq!(session.kind(), CaptureKind::Screen);
        assert!(session.check_support().is_ok());
        assert!(session.controls().start_enabled);
    }
}
