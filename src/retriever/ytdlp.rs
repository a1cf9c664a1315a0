//! yt-dlp driven retrieval
//!
//! Drives an external yt-dlp binary: metadata probes via `--dump-json
//! --no-download`, retrieval with a postprocessing chain, and progress
//! parsed from `--newline` output. Transient network retries stay inside
//! yt-dlp via its retry flags; once that budget is exhausted the failure
//! surfaces here and is mapped onto the error taxonomy.

use crate::retriever::models::{
    MediaProbe, ProbeKind, RetrievalJob, RetrievalNotice, RetrieveOutcome,
};
use crate::retriever::traits::Retriever;
use crate::pipeline::request::MediaKind;
use crate::tool::ToolBinary;
use crate::utils::error::MediagrabError;
use crate::utils::platform::is_executable;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Browser-like UA, required by some media hosts
const MEDIA_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct YtDlpRetriever {
    ytdlp_path: PathBuf,
}

impl YtDlpRetriever {
    /// Locate yt-dlp and fail with `ToolUnavailable` if absent.
    pub fn new() -> Result<Self, MediagrabError> {
        match find_ytdlp() {
            Some(path) => {
                info!("Found yt-dlp at: {}", path.display());
                Ok(Self { ytdlp_path: path })
            }
            None => Err(MediagrabError::ToolUnavailable(
                "yt-dlp not found. Please install yt-dlp".to_string(),
            )),
        }
    }

    pub fn ytdlp_path(&self) -> &PathBuf {
        &self.ytdlp_path
    }
}

#[async_trait]
impl Retriever for YtDlpRetriever {
    fn id(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, playlist: bool) -> Result<MediaProbe, MediagrabError> {
        debug!("Probing URL: {}", url);

        let output = AsyncCommand::new(&self.ytdlp_path)
            .args(build_probe_args(url, playlist))
            .output()
            .await
            .map_err(|e| MediagrabError::ToolUnavailable(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(map_tool_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries = 0u32;
        let mut title: Option<String> = None;

        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let value: serde_json::Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Skipping unparsable probe line: {}", e);
                    continue;
                }
            };
            entries += 1;
            if title.is_none() {
                title = value
                    .get("playlist_title")
                    .and_then(|v| v.as_str())
                    .or_else(|| value.get("title").and_then(|v| v.as_str()))
                    .map(String::from);
            }
        }

        if entries == 0 {
            return Err(MediagrabError::RetrievalError(
                "probe produced no metadata".to_string(),
            ));
        }

        Ok(MediaProbe {
            title: title.unwrap_or_else(|| "Untitled".to_string()),
            kind: if playlist {
                ProbeKind::Collection { entries }
            } else {
                ProbeKind::Single
            },
        })
    }

    async fn retrieve(
        &self,
        job: &RetrievalJob,
        tool: &ToolBinary,
        notices: mpsc::UnboundedSender<RetrievalNotice>,
    ) -> Result<RetrieveOutcome, MediagrabError> {
        let args = build_retrieve_args(job, tool);
        debug!("Invoking yt-dlp with {} args", args.len());

        let mut child = AsyncCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MediagrabError::ToolUnavailable(format!("failed to run yt-dlp: {}", e)))?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut postprocessing_reported = false;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(progress) = parse_progress_line(&line) {
                let _ = notices.send(RetrievalNotice::Percent {
                    percent: progress.percent,
                    bytes_total: progress.bytes_total,
                    speed_bps: progress.speed_bps,
                });
            } else if !postprocessing_reported && is_postprocessing_marker(&line) {
                postprocessing_reported = true;
                let _ = notices.send(RetrievalNotice::PostprocessingStarted);
            }
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(RetrieveOutcome {
                location: job.dest_dir.clone(),
            })
        } else {
            Err(map_tool_failure(&stderr_text))
        }
    }
}

fn build_probe_args(url: &str, playlist: bool) -> Vec<String> {
    let mut args = vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-warnings".to_string(),
    ];
    if playlist {
        args.push("--flat-playlist".to_string());
    } else {
        args.push("--no-playlist".to_string());
    }
    args.push(url.to_string());
    args
}

fn build_retrieve_args(job: &RetrievalJob, tool: &ToolBinary) -> Vec<String> {
    let output_arg = job.dest_dir.join(&job.output_template);
    let ffmpeg_location = tool
        .ffmpeg
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| tool.ffmpeg.clone());

    let mut args = vec![
        "-f".to_string(),
        job.format_selector.clone(),
        "-o".to_string(),
        output_arg.to_string_lossy().into_owned(),
        "--newline".to_string(),
        "--no-warnings".to_string(),
        "--restrict-filenames".to_string(),
        "--windows-filenames".to_string(),
        "--no-overwrites".to_string(),
        "--continue".to_string(),
        "--socket-timeout".to_string(),
        job.socket_timeout_secs.to_string(),
        "--retries".to_string(),
        job.retry_budget.to_string(),
        "--extractor-retries".to_string(),
        job.retry_budget.to_string(),
        "--ffmpeg-location".to_string(),
        ffmpeg_location.to_string_lossy().into_owned(),
        "--user-agent".to_string(),
        MEDIA_USER_AGENT.to_string(),
    ];

    if job.request.playlist {
        if let Some(cap) = job.item_cap {
            args.push("--playlist-end".to_string());
            args.push(cap.to_string());
        }
    } else {
        args.push("--no-playlist".to_string());
    }

    let audio_quality = format!("{}K", job.request.audio_quality.kbps());
    match job.request.kind {
        MediaKind::Audio => {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                audio_quality,
            ]);
        }
        MediaKind::Video => {
            // Remux into the requested container and additionally keep an
            // mp3 derivative of the audio track.
            args.extend([
                "--remux-video".to_string(),
                job.request.container.ext().to_string(),
                "-x".to_string(),
                "--keep-video".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                audio_quality,
            ]);
        }
    }

    args.push(job.request.url.clone());
    args
}

#[derive(Debug, PartialEq)]
struct ProgressLine {
    percent: f64,
    bytes_total: Option<u64>,
    speed_bps: f64,
}

/// Parse a `--newline` progress line, e.g.
/// `[download]  42.5% of ~ 150.00MiB at  5.20MiB/s ETA 00:15`.
fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    if !line.starts_with("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut bytes_total = None;
    let mut speed_bps = 0.0;
    let mut expect_total = false;

    for token in line.split_whitespace() {
        if let Some(stripped) = token.strip_suffix('%') {
            percent = stripped.parse::<f64>().ok();
        } else if token == "of" {
            expect_total = true;
        } else if expect_total {
            if token != "~" {
                expect_total = false;
                bytes_total = parse_size(token.trim_start_matches('~')).map(|b| b as u64);
            }
        } else if let Some(stripped) = token.strip_suffix("/s") {
            if let Some(speed) = parse_size(stripped) {
                speed_bps = speed;
            }
        }
    }

    percent.map(|percent| ProgressLine {
        percent,
        bytes_total,
        speed_bps,
    })
}

/// Parse a humanized size token like `150.00MiB` into bytes.
fn parse_size(token: &str) -> Option<f64> {
    let split = token
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(token.len());
    let number = token[..split].parse::<f64>().ok()?;
    let factor = match &token[split..] {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "B" | "" => 1.0,
        _ => return None,
    };
    Some(number * factor)
}

/// Lines marking the hand-off from raw retrieval to the postprocessing
/// chain.
fn is_postprocessing_marker(line: &str) -> bool {
    ["[ExtractAudio]", "[Merger]", "[VideoRemuxer]", "[Fixup"]
        .iter()
        .any(|marker| line.starts_with(marker))
}

/// Map a failed tool invocation onto the error taxonomy via its stderr.
fn map_tool_failure(stderr: &str) -> MediagrabError {
    let lower = stderr.to_lowercase();
    let summary = stderr.lines().last().unwrap_or("yt-dlp failed").to_string();

    if lower.contains("certificate") || lower.contains("ssl") {
        MediagrabError::CertificateError(summary)
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("unable to download")
    {
        MediagrabError::NetworkError(summary)
    } else {
        MediagrabError::RetrievalError(summary)
    }
}

// ============================================================
// yt-dlp Detection
// ============================================================

/// Find yt-dlp with priority: system PATH, then common install locations,
/// then next to our own executable.
pub fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(path) = which::which("yt-dlp") {
        if path.exists() {
            return Some(path);
        }
    }

    let common_paths = [
        "/opt/homebrew/bin/yt-dlp",
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
        "~/.local/bin/yt-dlp",
    ];
    for path_str in common_paths {
        let expanded = if let Some(rest) = path_str.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            }
        } else {
            PathBuf::from(path_str)
        };
        if expanded.exists() && is_executable(&expanded) {
            return Some(expanded);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(crate::utils::platform::exe_name("yt-dlp"));
            if sibling.exists() && is_executable(&sibling) {
                return Some(sibling);
            }
        }
    }

    None
}
