//! Panel command handlers
//!
//! Binds one capture session to a panel view: button clicks become
//! session operations, and session events become notices and button
//! states on the view.

pub mod export;
pub mod recording;

use crate::capture::MediaStream;
use crate::export::ExportSink;
use crate::recorder::{CaptureSessionController, PanelControls, SessionEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Panel buttons the session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Start,
    Record,
    Play,
    Download,
}

/// What a panel can show
///
/// The session only toggles buttons, sets the record label, posts
/// notices and hands over media to show. Layout belongs to the view.
pub trait PanelView: Send + Sync {
    fn set_enabled(&self, button: Button, enabled: bool);
    fn set_record_label(&self, label: &str);
    fn show_notice(&self, message: &str);
    fn show_preview(&self, stream: &MediaStream);
    fn show_playback(&self, url: &str);
}

/// View that logs everything, for headless runs
#[derive(Debug, Clone)]
pub struct TracingView {
    panel: String,
}

impl TracingView {
    pub fn new(panel: impl Into<String>) -> Self {
        Self {
            panel: panel.into(),
        }
    }
}

impl PanelView for TracingView {
    fn set_enabled(&self, button: Button, enabled: bool) {
        tracing::trace!("[{}] {:?} enabled={}", self.panel, button, enabled);
    }

    fn set_record_label(&self, label: &str) {
        tracing::trace!("[{}] record label: {}", self.panel, label);
    }

    fn show_notice(&self, message: &str) {
        tracing::warn!("[{}] {}", self.panel, message);
    }

    fn show_preview(&self, stream: &MediaStream) {
        let labels: Vec<&str> = stream.tracks().iter().map(|t| t.label()).collect();
        tracing::info!("[{}] previewing {}", self.panel, labels.join(", "));
    }

    fn show_playback(&self, url: &str) {
        tracing::info!("[{}] playing {}", self.panel, url);
    }
}

/// One demo panel: a session, the view it drives and where exports go
pub struct Panel {
    name: String,
    controller: Arc<CaptureSessionController>,
    view: Arc<dyn PanelView>,
    sink: Arc<dyn ExportSink>,
    events: Mutex<broadcast::Receiver<SessionEvent>>,
}

impl Panel {
    pub fn new(
        name: impl Into<String>,
        controller: Arc<CaptureSessionController>,
        view: Arc<dyn PanelView>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let events = Mutex::new(controller.subscribe());
        Self {
            name: name.into(),
            controller,
            view,
            sink,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller(&self) -> &Arc<CaptureSessionController> {
        &self.controller
    }

    /// Check availability and put the buttons in their initial state.
    /// Returns whether capture can be started at all.
    pub fn init(&self) -> bool {
        let supported = self.controller.check_support().is_ok();
        self.sync();
        supported
    }

    /// Forward pending session events to the view and refresh the buttons
    pub fn sync(&self) {
        {
            let mut events = self.events.lock();
            loop {
                match events.try_recv() {
                    Ok(SessionEvent::Notice(message)) => self.view.show_notice(&message),
                    Ok(SessionEvent::StateChanged(state)) => {
                        tracing::debug!("[{}] session state: {:?}", self.name, state)
                    }
                    Ok(SessionEvent::ChunkRecorded { .. }) => {}
                    Err(TryRecvError::Lagged(missed)) => {
                        tracing::warn!("[{}] missed {} session events", self.name, missed)
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }
        self.apply_controls(self.controller.controls());
    }

    fn apply_controls(&self, controls: PanelControls) {
        self.view.set_enabled(Button::Start, controls.start_enabled);
        self.view.set_enabled(Button::Record, controls.record_enabled);
        self.view.set_record_label(controls.record_label);
        self.view.set_enabled(Button::Play, controls.play_enabled);
        self.view.set_enabled(Button::Download, controls.download_enabled);
    }
}
