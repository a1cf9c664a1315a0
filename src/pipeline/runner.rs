//! The download pipeline state machine
//!
//! `Idle → ResolvingTool → Probing → Downloading → Postprocessing → Done`,
//! with an error exit from any phase to `Failed`. One terminal progress
//! event is guaranteed on every exit path, so the collaborator can always
//! re-enable submission and reset its progress display.

use crate::backend::bridge::ProgressBridge;
use crate::pipeline::progress::{DownloadMeter, FailureKind, ProgressEvent};
use crate::pipeline::request::{DownloadRequest, MediaKind};
use crate::retriever::models::{ProbeKind, RetrievalJob, RetrievalNotice};
use crate::retriever::Retriever;
use crate::tool::ToolProvisioner;
use crate::utils::config::Session;
use crate::utils::error::MediagrabError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    ResolvingTool,
    Probing,
    Downloading,
    Postprocessing,
    Done,
    Failed,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::ResolvingTool => "resolving tool",
            PipelinePhase::Probing => "probing",
            PipelinePhase::Downloading => "downloading",
            PipelinePhase::Postprocessing => "postprocessing",
            PipelinePhase::Done => "done",
            PipelinePhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Map a component error onto the terminal failure categories.
pub fn classify_failure(err: &MediagrabError) -> FailureKind {
    match err {
        MediagrabError::CertificateError(_) => FailureKind::Certificate,
        MediagrabError::NetworkError(_) | MediagrabError::HttpStatusError(_) => FailureKind::Network,
        MediagrabError::ToolUnavailable(_) | MediagrabError::VerificationFailed => {
            FailureKind::ToolUnavailable
        }
        MediagrabError::RetrievalError(text) => classify_text(text),
        _ => FailureKind::Unknown,
    }
}

fn classify_text(text: &str) -> FailureKind {
    let lower = text.to_lowercase();
    if lower.contains("certificate") || lower.contains("ssl") {
        FailureKind::Certificate
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
    {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    }
}

pub struct DownloadPipeline {
    provisioner: Arc<ToolProvisioner>,
    retriever: Arc<dyn Retriever>,
    session: Session,
    bridge: ProgressBridge,
}

impl DownloadPipeline {
    pub fn new(
        provisioner: Arc<ToolProvisioner>,
        retriever: Arc<dyn Retriever>,
        session: Session,
        bridge: ProgressBridge,
    ) -> Self {
        Self {
            provisioner,
            retriever,
            session,
            bridge,
        }
    }

    /// Run one request to its terminal event. Never leaks state into the
    /// next run; the request is consumed.
    pub async fn run(&self, request: DownloadRequest) -> Uuid {
        let request_id = Uuid::new_v4();
        self.bridge.log(format!("Starting download: {}", request.url));

        match self.execute(request_id, &request).await {
            Ok(location) => {
                self.enter(PipelinePhase::Done);
                self.bridge
                    .log(format!("Download completed, saved under {}", location.display()));
                self.bridge
                    .progress(request_id, ProgressEvent::Finished { location });
            }
            Err((kind, detail)) => {
                self.enter(PipelinePhase::Failed);
                self.bridge
                    .log(format!("Download failed: {}. {}", detail, kind.remediation()));
                self.bridge
                    .progress(request_id, ProgressEvent::Failed { kind, detail });
            }
        }

        request_id
    }

    async fn execute(
        &self,
        request_id: Uuid,
        request: &DownloadRequest,
    ) -> Result<PathBuf, (FailureKind, String)> {
        self.enter(PipelinePhase::ResolvingTool);
        let tool = self
            .provisioner
            .ensure_ready(&self.bridge)
            .await
            .map_err(|e| (FailureKind::ToolUnavailable, e.to_string()))?;

        self.enter(PipelinePhase::Probing);
        let probe = self
            .retriever
            .probe(&request.url, request.playlist)
            .await
            .map_err(|e| (classify_failure(&e), e.to_string()))?;

        let item_cap = match probe.kind {
            ProbeKind::Collection { entries } => {
                let cap = effective_cap(entries, request.max_items);
                self.bridge.log(format!(
                    "Collection '{}' has {} entries, processing {}",
                    probe.title, entries, cap
                ));
                Some(cap)
            }
            ProbeKind::Single => None,
        };

        let job = self.plan_job(request, item_cap);
        tokio::fs::create_dir_all(&job.dest_dir)
            .await
            .map_err(|e| (FailureKind::Unknown, e.to_string()))?;

        self.enter(PipelinePhase::Downloading);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_notices(notice_rx, self.bridge.clone(), request_id));

        let outcome = self.retriever.retrieve(&job, &tool, notice_tx).await;

        // The notice sender is dropped inside retrieve; the forwarder drains
        // whatever is buffered and then finishes, keeping per-request
        // ordering intact before any terminal event goes out.
        let reported_postprocessing = forwarder.await.unwrap_or(false);
        let outcome = outcome.map_err(|e| (classify_failure(&e), e.to_string()))?;

        self.enter(PipelinePhase::Postprocessing);
        if !reported_postprocessing {
            self.bridge.progress(request_id, ProgressEvent::Postprocessing);
        }

        let mut location = outcome.location;
        if request.playlist {
            let candidate = location.join(&probe.title);
            if candidate.is_dir() {
                location = candidate;
            }
        }

        Ok(location)
    }

    fn plan_job(&self, request: &DownloadRequest, item_cap: Option<u32>) -> RetrievalJob {
        let (dest_dir, template) = if request.playlist {
            (
                self.session.settings.download_root.join("playlists"),
                "%(playlist_title)s/%(playlist_index)s_%(title)s.%(ext)s",
            )
        } else {
            match request.kind {
                MediaKind::Audio => (self.session.audio_dir(), "%(title)s.%(ext)s"),
                MediaKind::Video => (self.session.video_dir(), "%(title)s.%(ext)s"),
            }
        };

        RetrievalJob {
            format_selector: request.format_selector(),
            request: request.clone(),
            dest_dir,
            output_template: template.to_string(),
            item_cap,
            retry_budget: self.session.settings.retry_budget,
            socket_timeout_secs: self.session.settings.socket_timeout_secs,
        }
    }

    fn enter(&self, phase: PipelinePhase) {
        debug!("Pipeline phase: {}", phase);
        if matches!(phase, PipelinePhase::ResolvingTool | PipelinePhase::Downloading) {
            info!("Pipeline entering {} phase", phase);
        }
    }
}

fn effective_cap(entries: u32, max_items: u32) -> u32 {
    // A zero cap would retrieve nothing; treat it as one.
    entries.min(max_items.max(1))
}

async fn forward_notices(
    mut rx: mpsc::UnboundedReceiver<RetrievalNotice>,
    bridge: ProgressBridge,
    request_id: Uuid,
) -> bool {
    let mut meter = DownloadMeter::new();
    let mut reported_postprocessing = false;

    while let Some(notice) = rx.recv().await {
        match notice {
            RetrievalNotice::Chunk {
                bytes_done,
                bytes_total,
                speed_bps,
            } => {
                bridge.progress(request_id, meter.on_bytes(bytes_done, bytes_total, speed_bps));
            }
            RetrievalNotice::Percent {
                percent,
                bytes_total,
                speed_bps,
            } => {
                bridge.progress(request_id, meter.on_percent(percent, bytes_total, speed_bps));
            }
            RetrievalNotice::PostprocessingStarted => {
                if !reported_postprocessing {
                    reported_postprocessing = true;
                    bridge.progress(request_id, ProgressEvent::Postprocessing);
                }
            }
        }
    }

    reported_postprocessing
}
