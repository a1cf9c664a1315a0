//! Media toolchain provisioning
//!
//! Guarantees a working ffmpeg/ffprobe pair under a stable install
//! directory, downloading and repairing on demand. Verification runs the
//! binaries rather than trusting their presence: a zero-byte or truncated
//! executable fails and triggers a re-install.

use crate::backend::bridge::ProgressBridge;
use crate::backend::messages::ToolStatus;
use crate::fetch::{expect_file, extract_archive, locate_nested_dir, ArtifactFetcher};
use crate::utils::error::MediagrabError;
use crate::utils::platform;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The provisioned toolchain. Path values may be borrowed by a pipeline run
/// for its duration; they are re-verified on every `ensure_ready` call
/// rather than cached, since an update may replace the binaries.
#[derive(Debug, Clone)]
pub struct ToolBinary {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub verified: bool,
}

pub struct ToolProvisioner {
    install_dir: PathBuf,
    archive_url: String,
    fetcher: ArtifactFetcher,
    // Serializes the verify-or-install sequence so near-simultaneous
    // callers cannot race writes to the install directory.
    guard: Mutex<()>,
}

impl ToolProvisioner {
    pub fn new(install_dir: impl Into<PathBuf>, archive_url: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            archive_url: archive_url.into(),
            fetcher: ArtifactFetcher::new(),
            guard: Mutex::new(()),
        }
    }

    fn installed_paths(&self) -> (PathBuf, PathBuf) {
        (
            self.install_dir.join(platform::exe_name("ffmpeg")),
            self.install_dir.join(platform::exe_name("ffprobe")),
        )
    }

    /// Verify-or-install. The fast path runs the installed binaries and
    /// returns without any network traffic.
    pub async fn ensure_ready(&self, bridge: &ProgressBridge) -> Result<ToolBinary, MediagrabError> {
        let _guard = self.guard.lock().await;

        let (ffmpeg, ffprobe) = self.installed_paths();
        if verify_pair(&ffmpeg, &ffprobe).await {
            bridge.tool_status(ToolStatus::Ready);
            return Ok(ToolBinary {
                ffmpeg,
                ffprobe,
                verified: true,
            });
        }

        bridge.tool_status(ToolStatus::Installing);
        bridge.log("Media toolchain missing or broken, downloading...");
        info!("Provisioning toolchain into {}", self.install_dir.display());

        match self.install(bridge).await {
            Ok(()) => {}
            Err(e) => {
                bridge.tool_status(ToolStatus::Failed);
                return Err(e);
            }
        }

        let (ffmpeg, ffprobe) = self.installed_paths();
        if verify_pair(&ffmpeg, &ffprobe).await {
            bridge.tool_status(ToolStatus::Ready);
            bridge.log("Media toolchain installed and verified");
            Ok(ToolBinary {
                ffmpeg,
                ffprobe,
                verified: true,
            })
        } else {
            bridge.tool_status(ToolStatus::Failed);
            Err(MediagrabError::VerificationFailed)
        }
    }

    async fn install(&self, bridge: &ProgressBridge) -> Result<(), MediagrabError> {
        tokio::fs::create_dir_all(&self.install_dir).await?;

        let archive_path = self.install_dir.join("toolchain.zip");
        let mut last_pct: i64 = -1;
        let bridge_for_progress = bridge.clone();
        self.fetcher
            .fetch(&self.archive_url, &archive_path, move |done, total| {
                if let Some(total) = total {
                    if total > 0 {
                        let pct = (done * 100 / total) as i64;
                        if pct != last_pct {
                            last_pct = pct;
                            bridge_for_progress
                                .log(format!("Downloading toolchain... {}% ({}/{} bytes)", pct, done, total));
                        }
                    }
                }
            })
            .await?;

        bridge.log("Extracting toolchain archive...");
        let scratch = self.install_dir.join("scratch");
        let archive_for_extract = archive_path.clone();
        let scratch_for_extract = scratch.clone();
        tokio::task::spawn_blocking(move || {
            extract_archive(&archive_for_extract, &scratch_for_extract)
        })
        .await
        .map_err(|e| MediagrabError::UnknownError(format!("extraction task failed: {}", e)))??;

        // Archive layout is not contractually stable; find the bin directory
        // rather than assuming a path.
        let bin_dir = locate_nested_dir(&scratch, "bin")?;
        let ffmpeg_src = expect_file(&bin_dir, &platform::exe_name("ffmpeg"))?;
        let ffprobe_src = expect_file(&bin_dir, &platform::exe_name("ffprobe"))?;

        let (ffmpeg_dest, ffprobe_dest) = self.installed_paths();
        install_binary(&ffmpeg_src, &ffmpeg_dest).await?;
        install_binary(&ffprobe_src, &ffprobe_dest).await?;

        // Clean up the archive and extraction scratch space.
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            warn!("Failed to remove toolchain archive: {}", e);
        }
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!("Failed to remove extraction scratch: {}", e);
        }

        Ok(())
    }
}

/// Move a freshly extracted binary into its stable location.
///
/// The binary lands under a temporary sibling name first and is renamed
/// into place, so a concurrently running old binary keeps its (unlinked)
/// file and no half-written executable is ever at the final path.
async fn install_binary(src: &Path, dest: &Path) -> Result<(), MediagrabError> {
    let staged = dest.with_extension("tmp");
    tokio::fs::copy(src, &staged).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755)).await?;
    }

    tokio::fs::rename(&staged, dest).await?;
    Ok(())
}

/// Invoke both binaries with a version argument and require zero exits.
/// Any spawn failure counts as "not verified", never an error.
pub async fn verify_pair(ffmpeg: &Path, ffprobe: &Path) -> bool {
    probe_version(ffmpeg).await && probe_version(ffprobe).await
}

async fn probe_version(binary: &Path) -> bool {
    if !binary.is_file() {
        return false;
    }

    match Command::new(binary).arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(e) => {
            warn!("Tool verification spawn failed for {}: {}", binary.display(), e);
            false
        }
    }
}
