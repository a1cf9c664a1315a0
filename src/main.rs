//! Mediagrab - media downloader
//!
//! Thin CLI collaborator around the orchestration engine: submits one
//! download request, drains progress events, and answers update offers.

use anyhow::Result;
use clap::Parser;
use mediagrab::backend::{BackendActor, BackendCommand, BackendEvent, ProgressBridge, ToolStatus};
use mediagrab::pipeline::{
    AudioQuality, ContainerFormat, DownloadRequest, MediaKind, ProgressEvent, VideoQuality,
};
use mediagrab::retriever::{Retriever, YtDlpRetriever};
use mediagrab::utils::{AppSettings, Session};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "mediagrab", version, about = "Download video or audio from a media URL")]
struct Args {
    /// Media URL to download
    url: Option<String>,

    /// Download audio only (mp3)
    #[arg(long)]
    audio: bool,

    /// Download the entire playlist behind the URL
    #[arg(long)]
    playlist: bool,

    /// Maximum playlist items to process
    #[arg(long, default_value = "100")]
    max_items: String,

    /// Preferred video quality
    #[arg(long, value_enum, default_value = "best")]
    video_quality: VideoQuality,

    /// Audio bitrate in kbps
    #[arg(long, value_enum, default_value = "192")]
    audio_quality: AudioQuality,

    /// Container for video downloads
    #[arg(long, value_enum, default_value = "mp4")]
    format: ContainerFormat,

    /// Install an offered application update without prompting
    #[arg(long)]
    update: bool,

    /// Do not open the output folder after a finished download
    #[arg(long)]
    no_reveal: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let session = Session::new(AppSettings::default());
    session.ensure_output_layout().await?;

    let retriever: Arc<dyn Retriever> = Arc::new(
        YtDlpRetriever::new().map_err(|e| anyhow::anyhow!("{}", e))?,
    );

    let (bridge, mut events) = ProgressBridge::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(32);

    let actor = BackendActor::new(session, retriever, cmd_rx, bridge);
    let actor_handle = tokio::spawn(actor.run());

    if let Some(url) = args.url.clone() {
        let request = DownloadRequest {
            url,
            kind: if args.audio { MediaKind::Audio } else { MediaKind::Video },
            playlist: args.playlist,
            max_items: DownloadRequest::parse_max_items(&args.max_items),
            video_quality: args.video_quality,
            audio_quality: args.audio_quality,
            container: args.format,
        };
        cmd_tx.send(BackendCommand::SubmitDownload(request)).await?;
    }

    let mut failed = false;
    while let Some(event) = events.recv().await {
        match event {
            BackendEvent::Log { at, line } => {
                println!("[{}] {}", at.format("%H:%M:%S"), line);
            }
            BackendEvent::ToolStatus(status) => {
                match status {
                    ToolStatus::Ready => println!("Media toolchain ready"),
                    ToolStatus::Installing => println!("Installing media toolchain..."),
                    ToolStatus::Failed => println!("Media toolchain installation failed"),
                }
                // Without a URL this run only performs the startup checks;
                // the warmup status is the last of them.
                if args.url.is_none() && status != ToolStatus::Installing {
                    let _ = cmd_tx.send(BackendCommand::Shutdown).await;
                }
            }
            BackendEvent::Progress { event, .. } => match event {
                ProgressEvent::Downloading {
                    percent,
                    bytes_done,
                    bytes_total,
                    speed_bps,
                    eta,
                } => match (percent, bytes_total) {
                    (Some(pct), Some(total)) => {
                        let eta_text = eta
                            .map(|e| format!(" | ETA: {}m {}s", e.as_secs() / 60, e.as_secs() % 60))
                            .unwrap_or_default();
                        println!(
                            "Downloading: {:.1}% ({}/{} bytes) | Speed: {:.1} MB/s{}",
                            pct,
                            bytes_done,
                            total,
                            speed_bps / 1_048_576.0,
                            eta_text
                        );
                    }
                    _ => println!("Downloading: {} bytes", bytes_done),
                },
                ProgressEvent::Postprocessing => {
                    println!("Download complete! Processing...");
                }
                ProgressEvent::Finished { location } => {
                    println!("Saved to: {}", location.display());
                    if !args.no_reveal {
                        let _ = open::that(&location);
                    }
                    let _ = cmd_tx.send(BackendCommand::Shutdown).await;
                }
                ProgressEvent::Failed { kind, detail } => {
                    eprintln!("Download failed: {}", detail);
                    eprintln!("What to try: {}", kind.remediation());
                    failed = true;
                    let _ = cmd_tx.send(BackendCommand::Shutdown).await;
                }
            },
            BackendEvent::UpdateAvailable(release) => {
                if args.update {
                    let _ = cmd_tx.send(BackendCommand::ApplyUpdate(release)).await;
                } else {
                    println!(
                        "Version {} is available. Re-run with --update to install it.",
                        release.version()
                    );
                }
            }
            BackendEvent::UpdateStaged { version } => {
                println!("Update {} staged; restarting.", version);
                break;
            }
        }
    }

    actor_handle.await.ok();
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
