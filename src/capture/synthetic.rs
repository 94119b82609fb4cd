//! In-process capture provider
//!
//! Hands out tracks that produce no media but behave like host tracks:
//! they can be stopped, they can be ended "by the host", and every request
//! can be granted, denied or reported as unsupported. Used by the headless
//! demo and by tests.

use super::constraints::MediaConstraints;
use super::traits::{CaptureError, CaptureProvider, Facility, MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

/// Track backed by nothing but a liveness flag
#[derive(Debug)]
pub struct SyntheticTrack {
    id: String,
    kind: TrackKind,
    label: String,
    live: AtomicBool,
    ended_tx: watch::Sender<bool>,
}

impl SyntheticTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Arc<Self> {
        let (ended_tx, _) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            live: AtomicBool::new(true),
            ended_tx,
        })
    }

    /// Terminate the track from the host side, as when the user revokes
    /// sharing from the browser chrome.
    pub fn end(&self) {
        tracing::debug!("Track {} ({}) ended by host", self.id, self.label);
        self.terminate();
    }

    fn terminate(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.ended_tx.send_replace(true);
    }
}

#[async_trait]
impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.live.load(Ordering::SeqCst) {
            tracing::debug!("Stopping track {} ({})", self.id, self.label);
        }
        self.terminate();
    }

    async fn ended(&self) {
        let mut rx = self.ended_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// How the synthetic host answers a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Grant,
    Deny,
    Unsupported,
}

/// A request the provider has seen, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub facility: Facility,
    pub constraints: MediaConstraints,
}

/// Capture provider that fabricates tracks on demand
pub struct SyntheticProvider {
    unsupported: HashSet<Facility>,
    user_media: Mutex<PromptOutcome>,
    user_media_tracks: Mutex<Option<Vec<TrackKind>>>,
    display_media: Mutex<PromptOutcome>,
    requests: Mutex<Vec<ProviderRequest>>,
    issued: Mutex<Vec<Arc<SyntheticTrack>>>,
    consent: Mutex<Option<Arc<Notify>>>,
}

impl SyntheticProvider {
    /// Provider that grants every request
    pub fn new() -> Self {
        Self {
            unsupported: HashSet::new(),
            user_media: Mutex::new(PromptOutcome::Grant),
            user_media_tracks: Mutex::new(None),
            display_media: Mutex::new(PromptOutcome::Grant),
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
            consent: Mutex::new(None),
        }
    }

    /// Remove a facility from the host entirely
    pub fn without(mut self, facility: Facility) -> Self {
        self.unsupported.insert(facility);
        self
    }

    /// Set how future user-media prompts resolve
    pub fn set_user_media(&self, outcome: PromptOutcome) {
        *self.user_media.lock() = outcome;
    }

    /// Grant user-media requests with exactly these tracks, whatever the
    /// constraints ask for
    pub fn set_user_media_tracks(&self, kinds: Vec<TrackKind>) {
        *self.user_media_tracks.lock() = Some(kinds);
    }

    /// Set how future display-media prompts resolve
    pub fn set_display_media(&self, outcome: PromptOutcome) {
        *self.display_media.lock() = outcome;
    }

    /// Keep every future prompt open until the returned handle is notified
    /// once per prompt.
    pub fn hold_prompts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.consent.lock() = Some(gate.clone());
        gate
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().clone()
    }

    /// Every track handed out so far
    pub fn issued_tracks(&self) -> Vec<Arc<SyntheticTrack>> {
        self.issued.lock().clone()
    }

    /// Most recently issued track of one kind
    pub fn last_track(&self, kind: TrackKind) -> Option<Arc<SyntheticTrack>> {
        self.issued
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind == kind)
            .cloned()
    }

    async fn prompt(
        &self,
        facility: Facility,
        constraints: &MediaConstraints,
        outcome: PromptOutcome,
        kinds: Option<Vec<TrackKind>>,
        video_label: &str,
    ) -> Result<MediaStream, CaptureError> {
        self.requests.lock().push(ProviderRequest {
            facility,
            constraints: constraints.clone(),
        });

        let gate = self.consent.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.unsupported.contains(&facility) {
            return Err(CaptureError::Unsupported(facility.api_name().to_string()));
        }

        match outcome {
            PromptOutcome::Grant => {}
            PromptOutcome::Deny => {
                return Err(CaptureError::PermissionDenied(format!(
                    "NotAllowedError: {} was dismissed",
                    facility.api_name()
                )))
            }
            PromptOutcome::Unsupported => {
                return Err(CaptureError::Unsupported(facility.api_name().to_string()))
            }
        }

        let kinds = kinds.unwrap_or_else(|| {
            constraints
                .video
                .iter()
                .map(|_| TrackKind::Video)
                .chain(constraints.audio.iter().map(|_| TrackKind::Audio))
                .collect()
        });
        let tracks: Vec<Arc<SyntheticTrack>> = kinds
            .into_iter()
            .map(|kind| match kind {
                TrackKind::Video => SyntheticTrack::new(kind, video_label),
                TrackKind::Audio => SyntheticTrack::new(kind, "Synthetic microphone"),
            })
            .collect();
        self.issued.lock().extend(tracks.iter().cloned());

        Ok(MediaStream::new(
            tracks
                .into_iter()
                .map(|t| t as Arc<dyn MediaTrack>)
                .collect(),
        ))
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureProvider for SyntheticProvider {
    fn supports(&self, facility: Facility) -> bool {
        !self.unsupported.contains(&facility)
    }

    async fn request_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let outcome = *self.user_media.lock();
        let kinds = self.user_media_tracks.lock().clone();
        self.prompt(
            Facility::UserMedia,
            constraints,
            outcome,
            kinds,
            "Synthetic camera",
        )
        .await
    }

    async fn request_display_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let outcome = *self.display_media.lock();
        self.prompt(
            Facility::DisplayMedia,
            constraints,
            outcome,
            None,
            "Synthetic screen",
        )
        .await
    }
}
