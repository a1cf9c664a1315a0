//! Download request model
//!
//! A request is immutable once submitted; the pipeline consumes it for a
//! single run and discards it after the terminal event.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Items processed from a collection when the requested cap is unparsable
pub const DEFAULT_MAX_ITEMS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum VideoQuality {
    Best,
    #[value(name = "1080p")]
    P1080,
    #[value(name = "720p")]
    P720,
    #[value(name = "480p")]
    P480,
    #[value(name = "360p")]
    P360,
}

impl VideoQuality {
    /// Vertical resolution cap, `None` for best-available
    pub fn height_cap(&self) -> Option<u32> {
        match self {
            VideoQuality::Best => None,
            VideoQuality::P1080 => Some(1080),
            VideoQuality::P720 => Some(720),
            VideoQuality::P480 => Some(480),
            VideoQuality::P360 => Some(360),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AudioQuality {
    #[value(name = "320")]
    Kbps320,
    #[value(name = "256")]
    Kbps256,
    #[value(name = "192")]
    Kbps192,
    #[value(name = "128")]
    Kbps128,
    #[value(name = "96")]
    Kbps96,
}

impl AudioQuality {
    pub fn kbps(&self) -> u32 {
        match self {
            AudioQuality::Kbps320 => 320,
            AudioQuality::Kbps256 => 256,
            AudioQuality::Kbps192 => 192,
            AudioQuality::Kbps128 => 128,
            AudioQuality::Kbps96 => 96,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ContainerFormat {
    Mp4,
    #[value(name = "webm")]
    WebM,
    Mkv,
}

impl ContainerFormat {
    pub fn ext(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::WebM => "webm",
            ContainerFormat::Mkv => "mkv",
        }
    }
}

/// One user-submitted acquisition request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub kind: MediaKind,
    pub playlist: bool,
    pub max_items: u32,
    pub video_quality: VideoQuality,
    pub audio_quality: AudioQuality,
    pub container: ContainerFormat,
}

impl DownloadRequest {
    /// Parse a user-supplied item cap, clamping unparsable input to the
    /// default.
    pub fn parse_max_items(raw: &str) -> u32 {
        raw.trim().parse::<u32>().unwrap_or(DEFAULT_MAX_ITEMS)
    }

    /// Stream-selection expression for the retrieval tool.
    ///
    /// Audio requests take the best audio stream; video requests merge the
    /// best (optionally height-capped) video stream with the best audio.
    pub fn format_selector(&self) -> String {
        match self.kind {
            MediaKind::Audio => "bestaudio/best".to_string(),
            MediaKind::Video => match self.video_quality.height_cap() {
                None => "bestvideo+bestaudio/best".to_string(),
                Some(height) => {
                    format!("bestvideo[height<={}]+bestaudio/best", height)
                }
            },
        }
    }
}
