//! Streaming artifact downloads
//!
//! One primitive backs both the toolchain bootstrap and the application
//! self-update: stream a remote binary to disk in chunks, reporting byte
//! counts after every chunk, and only expose the file at its final path
//! once the stream completed.

use crate::utils::error::MediagrabError;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A fully downloaded artifact on local disk
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Streaming downloader for release binaries and tool archives
pub struct ArtifactFetcher {
    client: Client,
}

impl ArtifactFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("mediagrab/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Download `url` to `dest`, invoking `on_progress(bytes_done, bytes_total)`
    /// after each chunk.
    ///
    /// The body is streamed through a `<dest>.part` sibling and renamed into
    /// place at the end, so a failed transfer never leaves a partial file at
    /// the destination path.
    pub async fn fetch<F>(
        &self,
        url: &str,
        dest: &Path,
        mut on_progress: F,
    ) -> Result<LocalFile, MediagrabError>
    where
        F: FnMut(u64, Option<u64>),
    {
        debug!("Fetching artifact from {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediagrabError::HttpStatusError(status.as_u16()));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part_path = part_path_for(dest);
        let mut file = File::create(&part_path).await?;
        let total = response.content_length();
        let mut written: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    // Drop the partial before surfacing the transport error.
                    drop(file);
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_progress(written, total);
        }

        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part_path, dest).await?;

        info!("Fetched {} bytes to {}", written, dest.display());
        Ok(LocalFile {
            path: dest.to_path_buf(),
            bytes: written,
        })
    }
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn part_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    name.push_str(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_sibling() {
        let dest = Path::new("/tmp/tool/ffmpeg.zip");
        assert_eq!(part_path_for(dest), PathBuf::from("/tmp/tool/ffmpeg.zip.part"));
    }
}
