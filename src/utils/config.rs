//! Application configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::platform;

/// Fixed "latest" archive for the provisioned ffmpeg/ffprobe toolchain
pub const TOOL_ARCHIVE_URL: &str =
    "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip";

/// Release feed for application self-updates
pub const RELEASE_FEED_URL: &str =
    "https://api.github.com/repos/needyamin/video-audio-downloader/releases/latest";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Root of the download output layout
    pub download_root: PathBuf,

    /// Directory the toolchain is installed into
    pub tool_dir: PathBuf,

    /// File persisting the last release-check timestamp
    pub update_state_file: PathBuf,

    /// Tool archive URL ("latest" release zip)
    pub tool_archive_url: String,

    /// Release feed URL for self-updates
    pub release_feed_url: String,

    /// Retry budget handed to the retrieval layer
    pub retry_budget: u32,

    /// Socket timeout handed to the retrieval layer (seconds)
    pub socket_timeout_secs: u32,

    /// Minimum interval between release-feed checks (seconds)
    pub update_check_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_root: platform::default_download_dir(),
            tool_dir: platform::tool_install_dir(),
            update_state_file: platform::update_check_file(),
            tool_archive_url: TOOL_ARCHIVE_URL.to_string(),
            release_feed_url: RELEASE_FEED_URL.to_string(),
            retry_budget: 10,
            socket_timeout_secs: 30,
            update_check_interval_secs: 24 * 60 * 60,
        }
    }
}

/// Per-process session state, passed explicitly into every component.
///
/// Replaces what would otherwise be ambient globals: the settings, the
/// running version, and the resolved output layout.
#[derive(Debug, Clone)]
pub struct Session {
    pub settings: AppSettings,
    pub current_version: String,
}

impl Session {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings,
            current_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Output directory for plain video downloads
    pub fn video_dir(&self) -> PathBuf {
        self.settings.download_root.join("video")
    }

    /// Output directory for plain audio downloads
    pub fn audio_dir(&self) -> PathBuf {
        self.settings.download_root.join("audio")
    }

    /// Create the full output layout up front
    pub async fn ensure_output_layout(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.video_dir()).await?;
        tokio::fs::create_dir_all(self.audio_dir()).await?;
        tokio::fs::create_dir_all(self.settings.download_root.join("playlists")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert!(settings.retry_budget > 0);
        assert!(settings.socket_timeout_secs > 0);
        assert_eq!(settings.update_check_interval_secs, 86_400);
    }

    #[test]
    fn test_session_layout_under_root() {
        let mut settings = AppSettings::default();
        settings.download_root = PathBuf::from("/tmp/mediagrab-test");
        let session = Session::new(settings);
        assert_eq!(session.video_dir(), PathBuf::from("/tmp/mediagrab-test/video"));
        assert_eq!(session.audio_dir(), PathBuf::from("/tmp/mediagrab-test/audio"));
    }

    #[test]
    fn test_session_version_from_manifest() {
        let session = Session::new(AppSettings::default());
        assert!(!session.current_version.is_empty());
    }
}
