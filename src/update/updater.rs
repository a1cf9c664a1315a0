//! Two-phase application self-update
//!
//! A running executable cannot overwrite itself, so the new binary is
//! downloaded to an isolated staging directory and a short script performs
//! the swap after this process has exited and released its file handle.

use crate::fetch::ArtifactFetcher;
use crate::update::checker::{ReleaseAsset, ReleaseInfo};
use crate::utils::error::MediagrabError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

/// Handle to a staged update: the swap script has been launched and the
/// host process is expected to exit promptly.
#[derive(Debug)]
pub struct StagedUpdate {
    pub version: String,
    pub script: PathBuf,
}

pub struct SelfUpdater {
    fetcher: ArtifactFetcher,
}

impl SelfUpdater {
    pub fn new() -> Self {
        Self {
            fetcher: ArtifactFetcher::new(),
        }
    }

    /// Pick the platform-appropriate asset from a release.
    pub fn select_asset(release: &ReleaseInfo) -> Result<&ReleaseAsset, MediagrabError> {
        release
            .assets
            .iter()
            .find(|asset| asset_matches_platform(&asset.name))
            .ok_or(MediagrabError::NoMatchingAsset)
    }

    /// Download the release binary, stage the swap script and launch it
    /// detached. On success the caller must exit the process.
    pub async fn apply<F>(
        &self,
        release: &ReleaseInfo,
        on_progress: F,
    ) -> Result<StagedUpdate, MediagrabError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let asset = Self::select_asset(release)?;

        // into_path keeps the directory alive past this call; the swap
        // script runs after we exit.
        let staging_dir = tempfile::Builder::new()
            .prefix("mediagrab-update-")
            .tempdir()?
            .into_path();

        let new_exe = staging_dir.join(&asset.name);
        info!("Downloading update {} from {}", release.version(), asset.browser_download_url);
        self.fetcher
            .fetch(&asset.browser_download_url, &new_exe, on_progress)
            .await?;

        let current_exe = std::env::current_exe()?;
        let script = write_staging_script(&staging_dir, &new_exe, &current_exe)?;
        spawn_detached(&script)?;

        info!("Update {} staged, exiting for swap", release.version());
        Ok(StagedUpdate {
            version: release.version().to_string(),
            script,
        })
    }
}

impl Default for SelfUpdater {
    fn default() -> Self {
        Self::new()
    }
}

fn asset_matches_platform(name: &str) -> bool {
    let lower = name.to_lowercase();
    if cfg!(target_os = "windows") {
        lower.ends_with(".exe")
    } else if cfg!(target_os = "macos") {
        lower.contains("macos") || lower.contains("darwin")
    } else {
        lower.contains("linux")
    }
}

/// Write the swap script into the staging directory.
///
/// The delay gives the exiting process time to release its executable.
fn write_staging_script(
    staging_dir: &Path,
    new_exe: &Path,
    current_exe: &Path,
) -> Result<PathBuf, MediagrabError> {
    #[cfg(target_os = "windows")]
    {
        let script = staging_dir.join("update.bat");
        let body = format!(
            "@echo off\r\n\
             timeout /t 2 /nobreak\r\n\
             del \"{current}\"\r\n\
             move \"{new}\" \"{current}\"\r\n\
             start \"\" \"{current}\"\r\n",
            current = current_exe.display(),
            new = new_exe.display(),
        );
        std::fs::write(&script, body)?;
        Ok(script)
    }

    #[cfg(not(target_os = "windows"))]
    {
        use std::os::unix::fs::PermissionsExt;

        let script = staging_dir.join("update.sh");
        let body = format!(
            "#!/bin/sh\n\
             sleep 2\n\
             rm -f \"{current}\"\n\
             mv \"{new}\" \"{current}\"\n\
             chmod +x \"{current}\"\n\
             \"{current}\" &\n",
            current = current_exe.display(),
            new = new_exe.display(),
        );
        std::fs::write(&script, body)?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
        Ok(script)
    }
}

fn spawn_detached(script: &Path) -> Result<(), MediagrabError> {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;

        const DETACHED_PROCESS: u32 = 0x0000_0008;
        Command::new("cmd")
            .arg("/C")
            .arg(script)
            .creation_flags(DETACHED_PROCESS)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
    }

    #[cfg(not(target_os = "windows"))]
    {
        Command::new("sh")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn release_with_assets(names: &[&str]) -> ReleaseInfo {
        ReleaseInfo {
            tag_name: "v2.0.0".to_string(),
            assets: names
                .iter()
                .map(|n| ReleaseAsset {
                    name: n.to_string(),
                    browser_download_url: format!("https://example.com/{}", n),
                })
                .collect(),
        }
    }

    #[test]
    fn test_select_asset_none_matching() {
        let release = release_with_assets(&["README.md", "checksums.txt"]);
        let err = SelfUpdater::select_asset(&release).unwrap_err();
        assert!(matches!(err, MediagrabError::NoMatchingAsset));
    }

    #[test]
    fn test_select_asset_platform_match() {
        let release = release_with_assets(&[
            "mediagrab-setup.exe",
            "mediagrab-linux-x86_64",
            "mediagrab-macos-arm64",
        ]);
        let asset = SelfUpdater::select_asset(&release).expect("asset");
        if cfg!(target_os = "windows") {
            assert!(asset.name.ends_with(".exe"));
        } else if cfg!(target_os = "macos") {
            assert!(asset.name.contains("macos"));
        } else {
            assert!(asset.name.contains("linux"));
        }
    }

    #[test]
    fn test_staging_script_references_both_paths() {
        let temp = TempDir::new().unwrap();
        let new_exe = temp.path().join("mediagrab-new");
        let current = temp.path().join("mediagrab");
        std::fs::write(&new_exe, b"binary").unwrap();

        let script = write_staging_script(temp.path(), &new_exe, &current).expect("script");
        let body = std::fs::read_to_string(&script).unwrap();
        assert!(body.contains(&new_exe.display().to_string()));
        assert!(body.contains(&current.display().to_string()));
    }
}
