//! End-to-end pipeline runs against a stubbed retrieval layer.
//!
//! The external tool is faked with tiny scripts so provisioning passes
//! without network access; retrieval is a stub so the state machine and
//! its event stream can be asserted exactly.
#![cfg(unix)]

use async_trait::async_trait;
use mediagrab::backend::{BackendEvent, ProgressBridge};
use mediagrab::pipeline::{
    AudioQuality, ContainerFormat, DownloadPipeline, DownloadRequest, FailureKind, MediaKind,
    ProgressEvent, VideoQuality,
};
use mediagrab::retriever::{
    MediaProbe, ProbeKind, RetrievalJob, RetrievalNotice, Retriever, RetrieveOutcome,
};
use mediagrab::tool::{ToolBinary, ToolProvisioner};
use mediagrab::utils::{AppSettings, MediagrabError, Session};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn write_fake_tool(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Provisioner whose fast path succeeds immediately: the install dir
/// already holds working fake binaries.
fn satisfied_provisioner(temp: &TempDir) -> Arc<ToolProvisioner> {
    let install_dir = temp.path().join("toolchain");
    std::fs::create_dir_all(&install_dir).unwrap();
    write_fake_tool(&install_dir.join("ffmpeg"));
    write_fake_tool(&install_dir.join("ffprobe"));
    Arc::new(ToolProvisioner::new(install_dir, "http://127.0.0.1:1/unused.zip"))
}

fn session_with_root(temp: &TempDir) -> Session {
    let mut settings = AppSettings::default();
    settings.download_root = temp.path().join("downloads");
    settings.tool_dir = temp.path().join("toolchain");
    settings.update_state_file = temp.path().join("last_check.txt");
    Session::new(settings)
}

fn audio_request(url: &str) -> DownloadRequest {
    DownloadRequest {
        url: url.to_string(),
        kind: MediaKind::Audio,
        playlist: false,
        max_items: 100,
        video_quality: VideoQuality::Best,
        audio_quality: AudioQuality::Kbps192,
        container: ContainerFormat::Mp4,
    }
}

#[derive(Default)]
struct StubRetriever {
    probe_entries: Option<u32>,
    notices: Vec<RetrievalNotice>,
    failure: Option<fn() -> MediagrabError>,
    seen_jobs: Mutex<Vec<RetrievalJob>>,
}

#[async_trait]
impl Retriever for StubRetriever {
    fn id(&self) -> &'static str {
        "stub"
    }

    async fn probe(&self, _url: &str, _playlist: bool) -> Result<MediaProbe, MediagrabError> {
        Ok(MediaProbe {
            title: "Sample".to_string(),
            kind: match self.probe_entries {
                Some(entries) => ProbeKind::Collection { entries },
                None => ProbeKind::Single,
            },
        })
    }

    async fn retrieve(
        &self,
        job: &RetrievalJob,
        _tool: &ToolBinary,
        notices: mpsc::UnboundedSender<RetrievalNotice>,
    ) -> Result<RetrieveOutcome, MediagrabError> {
        self.seen_jobs.lock().unwrap().push(job.clone());

        if let Some(make_error) = self.failure {
            return Err(make_error());
        }

        for notice in &self.notices {
            let _ = notices.send(notice.clone());
        }
        std::fs::write(job.dest_dir.join("Sample.mp3"), b"audio").unwrap();
        Ok(RetrieveOutcome {
            location: job.dest_dir.clone(),
        })
    }
}

/// Drain progress events out of the full event stream.
fn progress_events(rx: &mut mpsc::UnboundedReceiver<BackendEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let BackendEvent::Progress { event, .. } = event {
            events.push(event);
        }
    }
    events
}

fn chunk(bytes_done: u64) -> RetrievalNotice {
    RetrievalNotice::Chunk {
        bytes_done,
        bytes_total: Some(1000),
        speed_bps: 500.0,
    }
}

#[tokio::test]
async fn audio_download_emits_expected_event_sequence() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        notices: vec![chunk(500), chunk(1000)],
        ..Default::default()
    });
    let (bridge, mut rx) = ProgressBridge::channel();

    let pipeline = DownloadPipeline::new(
        satisfied_provisioner(&temp),
        retriever.clone(),
        session.clone(),
        bridge,
    );
    pipeline.run(audio_request("https://example.com/v")).await;

    let events = progress_events(&mut rx);
    assert_eq!(events.len(), 4, "expected exactly four events, got {:?}", events);

    match &events[0] {
        ProgressEvent::Downloading { percent, .. } => assert_eq!(*percent, Some(50.0)),
        other => panic!("expected Downloading(50%), got {:?}", other),
    }
    match &events[1] {
        ProgressEvent::Downloading { percent, .. } => assert_eq!(*percent, Some(100.0)),
        other => panic!("expected Downloading(100%), got {:?}", other),
    }
    assert_eq!(events[2], ProgressEvent::Postprocessing);

    match &events[3] {
        ProgressEvent::Finished { location } => {
            assert_eq!(*location, session.audio_dir());
            assert!(location.join("Sample.mp3").is_file());
        }
        other => panic!("expected Finished, got {:?}", other),
    }
}

#[tokio::test]
async fn video_request_lands_in_video_directory() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        notices: vec![chunk(1000)],
        ..Default::default()
    });
    let (bridge, mut rx) = ProgressBridge::channel();

    let mut request = audio_request("https://example.com/v");
    request.kind = MediaKind::Video;
    request.video_quality = VideoQuality::P720;

    DownloadPipeline::new(satisfied_provisioner(&temp), retriever.clone(), session.clone(), bridge)
        .run(request)
        .await;

    let events = progress_events(&mut rx);
    assert!(matches!(events.last(), Some(ProgressEvent::Finished { location }) if *location == session.video_dir()));

    let jobs = retriever.seen_jobs.lock().unwrap();
    assert_eq!(jobs[0].format_selector, "bestvideo[height<=720]+bestaudio/best");
}

#[tokio::test]
async fn playlist_cap_limits_processed_items() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        probe_entries: Some(250),
        notices: vec![chunk(1000)],
        ..Default::default()
    });
    let (bridge, mut rx) = ProgressBridge::channel();

    let mut request = audio_request("https://example.com/playlist");
    request.playlist = true;
    request.max_items = 100;

    DownloadPipeline::new(satisfied_provisioner(&temp), retriever.clone(), session, bridge)
        .run(request)
        .await;

    let jobs = retriever.seen_jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].item_cap, Some(100));
    assert!(jobs[0].dest_dir.ends_with("playlists"));
    assert!(jobs[0].output_template.contains("%(playlist_index)s"));

    // Still reaches a terminal event.
    let events = progress_events(&mut rx);
    assert!(matches!(events.last(), Some(ProgressEvent::Finished { .. })));
}

#[tokio::test]
async fn small_collection_is_not_padded_to_the_cap() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        probe_entries: Some(7),
        notices: vec![chunk(1000)],
        ..Default::default()
    });
    let (bridge, _rx) = ProgressBridge::channel();

    let mut request = audio_request("https://example.com/playlist");
    request.playlist = true;
    request.max_items = 100;

    DownloadPipeline::new(satisfied_provisioner(&temp), retriever.clone(), session, bridge)
        .run(request)
        .await;

    let jobs = retriever.seen_jobs.lock().unwrap();
    assert_eq!(jobs[0].item_cap, Some(7));
}

#[tokio::test]
async fn certificate_failure_is_classified_distinctly() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        failure: Some(|| {
            MediagrabError::CertificateError("certificate verify failed".to_string())
        }),
        ..Default::default()
    });
    let (bridge, mut rx) = ProgressBridge::channel();

    DownloadPipeline::new(satisfied_provisioner(&temp), retriever, session, bridge)
        .run(audio_request("https://example.com/v"))
        .await;

    let events = progress_events(&mut rx);
    match events.last() {
        Some(ProgressEvent::Failed { kind, .. }) => assert_eq!(*kind, FailureKind::Certificate),
        other => panic!("expected Failed(Certificate), got {:?}", other),
    }
}

#[tokio::test]
async fn network_failure_is_not_classified_as_certificate() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    let retriever = Arc::new(StubRetriever {
        failure: Some(|| MediagrabError::NetworkError("connection reset".to_string())),
        ..Default::default()
    });
    let (bridge, mut rx) = ProgressBridge::channel();

    DownloadPipeline::new(satisfied_provisioner(&temp), retriever, session, bridge)
        .run(audio_request("https://example.com/v"))
        .await;

    let events = progress_events(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Failed { kind: FailureKind::Network, .. })
    ));
}

#[tokio::test]
async fn unreachable_tool_archive_fails_as_tool_unavailable() {
    let temp = TempDir::new().unwrap();
    let session = session_with_root(&temp);
    // Empty install dir plus an unreachable archive URL: provisioning fails.
    let provisioner = Arc::new(ToolProvisioner::new(
        temp.path().join("toolchain"),
        "http://127.0.0.1:1/toolchain.zip",
    ));
    let retriever = Arc::new(StubRetriever::default());
    let (bridge, mut rx) = ProgressBridge::channel();

    DownloadPipeline::new(provisioner, retriever.clone(), session, bridge)
        .run(audio_request("https://example.com/v"))
        .await;

    let events = progress_events(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::Failed { kind: FailureKind::ToolUnavailable, .. })
    ));
    // Retrieval must never have started.
    assert!(retriever.seen_jobs.lock().unwrap().is_empty());
}
