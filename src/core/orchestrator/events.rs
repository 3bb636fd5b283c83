use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::pipeline::{Branch, PipelineState};

/// Messages for whatever front-end is listening. Independent of tracing:
/// these are the user-facing lines, tracing is the diagnostic log.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum InstallEvent {
    Info(String),
    Error(String),
    /// Each branch moves forward on its own; `Branch::Operation` follows
    /// the least advanced one.
    StateChanged { branch: Branch, state: PipelineState },
    /// Sent exactly once per operation, after every branch has finished.
    Completed(String),
}

/// Non-blocking sender half handed to every pipeline stage.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<InstallEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: InstallEvent) {
        // A front-end that stopped listening must not stall the install.
        let _ = self.tx.send(event);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(InstallEvent::Info(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(InstallEvent::Error(message.into()));
    }
}

/// Emit through an optional sink, mirroring how stages run with or
/// without a front-end attached.
pub(crate) fn notify(sink: Option<&EventSink>, event: InstallEvent) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}
