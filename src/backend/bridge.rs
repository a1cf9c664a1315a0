//! Thread-safe marshalling of progress and log events
//!
//! Background work pushes events through an unbounded channel; the
//! collaborator drains the receiving end with an event-driven wake. Neither
//! side ever blocks the other: sends are non-blocking, and a vanished
//! receiver simply discards events.

use crate::backend::messages::{BackendEvent, ToolStatus};
use crate::pipeline::progress::ProgressEvent;
use crate::update::checker::ReleaseInfo;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ProgressBridge {
    tx: mpsc::UnboundedSender<BackendEvent>,
}

impl ProgressBridge {
    /// Create a bridge plus the receiving end the collaborator drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BackendEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, request_id: Uuid, event: ProgressEvent) {
        let _ = self.tx.send(BackendEvent::Progress { request_id, event });
    }

    pub fn log(&self, line: impl Into<String>) {
        let _ = self.tx.send(BackendEvent::Log {
            at: Utc::now(),
            line: line.into(),
        });
    }

    pub fn tool_status(&self, status: ToolStatus) {
        let _ = self.tx.send(BackendEvent::ToolStatus(status));
    }

    pub fn update_available(&self, info: ReleaseInfo) {
        let _ = self.tx.send(BackendEvent::UpdateAvailable(info));
    }

    pub fn update_staged(&self, version: String) {
        let _ = self.tx.send(BackendEvent::UpdateStaged { version });
    }
}
