//! Playback and download commands

use super::Panel;
use crate::utils::error::{SessionError, SessionResult};
use std::path::PathBuf;

impl Panel {
    /// Play button: export the recording and hand a playable URL to the view
    pub fn on_play_clicked(&self) -> SessionResult<String> {
        let result = self.playback_url();
        self.sync();
        result
    }

    /// Download button: export the recording under the configured filename
    pub fn on_download_clicked(&self) -> SessionResult<PathBuf> {
        let result = self.download();
        self.sync();
        result
    }

    fn playback_url(&self) -> SessionResult<String> {
        let blob = self.controller.export_recording()?;
        let url = self.sink.playback_url(&blob).map_err(|e| self.sink_failed(e.into()))?;
        self.view.show_playback(&url);
        Ok(url)
    }

    fn download(&self) -> SessionResult<PathBuf> {
        let blob = self.controller.export_recording()?;
        let filename = &self.controller.config().download_filename;
        self.sink
            .download(&blob, filename)
            .map_err(|e| self.sink_failed(e.into()))
    }

    fn sink_failed(&self, error: SessionError) -> SessionError {
        tracing::error!("[{}] export failed: {}", self.name, error);
        self.view.show_notice(&error.to_string());
        error
    }
}
