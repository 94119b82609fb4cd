//! Capture and recording commands

use super::Panel;
use crate::capture::MediaStream;
use crate::recorder::RecordingState;
use crate::utils::error::{SessionError, SessionResult};
use std::sync::Arc;

impl Panel {
    /// Start button: request capture and preview the stream
    pub async fn on_start_clicked(self: &Arc<Self>) -> SessionResult<()> {
        let config = self.controller.config();
        let result = self
            .controller
            .request_capture(config.kind, &config.capture)
            .await;

        if let Ok(stream) = &result {
            self.view.show_preview(stream);
            self.watch_source(stream);
        }
        self.sync();
        result.map(|_| ()).map_err(SessionError::from)
    }

    /// Record button: start or stop depending on the current state
    pub async fn on_record_clicked(&self) -> SessionResult<()> {
        let result = if self.controller.recording_state() == RecordingState::Recording {
            self.controller.stop_recording().await;
            Ok(())
        } else {
            self.start_recording().await
        };
        self.sync();
        result
    }

    async fn start_recording(&self) -> SessionResult<()> {
        if let Some(stream) = self.controller.stream() {
            if !stream.has_live_tracks() {
                self.controller.on_source_ended(stream.id()).await;
                return Err(SessionError::SourceEnded);
            }
        }
        self.controller.start_recording()?;
        Ok(())
    }

    /// Stop sharing: end any recording and release the devices
    pub async fn on_stop_clicked(&self) {
        self.controller.release().await;
        self.sync();
    }

    /// Report the session's source as ended once its primary track ends
    fn watch_source(self: &Arc<Self>, stream: &MediaStream) {
        let kind = self.controller.kind().primary_track_kind();
        let Some(track) = stream.first_track(kind) else {
            tracing::warn!(
                "[{}] stream {} has no {:?} track to watch",
                self.name,
                stream.id(),
                kind
            );
            return;
        };

        let panel = Arc::downgrade(self);
        let stream_id = stream.id();
        tokio::spawn(async move {
            track.ended().await;
            // A dropped panel has already released its session.
            let Some(panel) = panel.upgrade() else {
                return;
            };
            panel.controller.on_source_ended(stream_id).await;
            panel.sync();
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::capture::{CaptureKind, Facility, MediaTrack, SyntheticProvider, TrackKind};
    use std::sync::Arc;
    use crate::commands::tests::panel_with;
    use crate::commands::Button;
    use crate::config::SessionConfig;
    use crate::recorder::state::{START_RECORDING_LABEL, STOP_RECORDING_LABEL};
    use crate::recorder::SessionState;
    use crate::utils::error::SessionError;

    #[tokio::test]
    async fn test_unsupported_keeps_start_disabled() {
        let provider = SyntheticProvider::new().without(Facility::DisplayMedia);
        let (panel, view, _, _) = panel_with(SessionConfig::new(CaptureKind::Screen), provider);

        assert!(!panel.init());
        assert_eq!(
            view.notices(),
            vec!["mediaDevices.getDisplayMedia is not supported".to_string()]
        );
        assert_eq!(view.enabled(Button::Start), Some(false));
        assert_eq!(view.enabled(Button::Record), Some(false));
    }

    #[tokio::test]
    async fn test_start_record_stop_cycle() {
        let (panel, view, _, recorders) =
            panel_with(SessionConfig::new(CaptureKind::Camera), SyntheticProvider::new());
        assert!(panel.init());
        assert_eq!(view.enabled(Button::Start), Some(true));

        panel.on_start_clicked().await.unwrap();
        assert_eq!(view.previews(), 1);
        assert_eq!(view.enabled(Button::Start), Some(false));
        assert_eq!(view.enabled(Button::Record), Some(true));

        panel.on_record_clicked().await.unwrap();
        assert_eq!(view.record_label(), STOP_RECORDING_LABEL);
        assert_eq!(view.enabled(Button::Play), Some(false));

        recorders.last_recorder().unwrap().feed(b"frames");
        panel.on_record_clicked().await.unwrap();
        assert_eq!(view.record_label(), START_RECORDING_LABEL);
        assert_eq!(view.enabled(Button::Play), Some(true));
        assert_eq!(view.enabled(Button::Download), Some(true));
    }

    #[tokio::test]
    async fn test_host_revocation_reenables_start() {
        let provider = SyntheticProvider::new();
        let (panel, view, provider, _) =
            panel_with(SessionConfig::new(CaptureKind::Screen), provider);
        panel.init();
        panel.on_start_clicked().await.unwrap();
        panel.on_record_clicked().await.unwrap();

        let screen = provider.last_track(TrackKind::Video).unwrap();
        screen.end();

        for _ in 0..10 {
            if panel.controller().state() == SessionState::Ready {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(panel.controller().state(), SessionState::Ready);
        panel.sync();
        assert!(view
            .notices()
            .contains(&"The stream was ended by user".to_string()));
        assert_eq!(view.enabled(Button::Start), Some(true));
        assert_eq!(view.record_label(), START_RECORDING_LABEL);
    }

    #[tokio::test]
    async fn test_record_on_dead_stream_reports_source_ended() {
        let (panel, _, provider, _) =
            panel_with(SessionConfig::new(CaptureKind::Audio), SyntheticProvider::new());
        panel.init();
        panel.on_start_clicked().await.unwrap();

        // The watcher has not run yet when the record click lands.
        for track in provider.issued_tracks() {
            track.stop();
        }
        let result = panel.on_record_clicked().await;
        assert!(matches!(result, Err(SessionError::SourceEnded)));
        assert!(panel.controller().stream().is_none());
    }

    #[tokio::test]
    async fn test_dropping_panel_releases_tracks() {
        let (panel, _, provider, _) =
            panel_with(SessionConfig::new(CaptureKind::Camera), SyntheticProvider::new());
        panel.init();
        panel.on_start_clicked().await.unwrap();

        let controller = Arc::downgrade(panel.controller());
        let camera = provider.last_track(TrackKind::Video).unwrap();
        assert!(camera.is_live());

        drop(panel);
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert!(controller.upgrade().is_none());
        assert!(provider.issued_tracks().iter().all(|t| !t.is_live()));
    }
}
