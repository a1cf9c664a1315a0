//! Command/event contract between the collaborator and the backend

use crate::pipeline::progress::ProgressEvent;
use crate::pipeline::request::DownloadRequest;
use crate::update::checker::ReleaseInfo;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Commands submitted by the collaborator
#[derive(Debug, Clone)]
pub enum BackendCommand {
    SubmitDownload(DownloadRequest),
    CheckForUpdates,
    /// The user accepted an offered update
    ApplyUpdate(ReleaseInfo),
    Shutdown,
}

/// Provisioning status surfaced to the collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Ready,
    Installing,
    Failed,
}

/// Events flowing back to the collaborator.
///
/// Events for a given request are delivered in generation order; events of
/// different requests carry distinct ids and are not ordered relative to
/// each other.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Progress {
        request_id: Uuid,
        event: ProgressEvent,
    },
    Log {
        at: DateTime<Utc>,
        line: String,
    },
    ToolStatus(ToolStatus),
    UpdateAvailable(ReleaseInfo),
    /// The swap script is launched; the process should exit now
    UpdateStaged {
        version: String,
    },
}
