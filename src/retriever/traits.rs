use crate::retriever::models::{MediaProbe, RetrievalJob, RetrievalNotice, RetrieveOutcome};
use crate::tool::ToolBinary;
use crate::utils::error::MediagrabError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Core trait for the media retrieval layer.
///
/// This isolates the pipeline state machine from the concrete retrieval
/// mechanism, so runs can be exercised against a stub without spawning the
/// external tool.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Unique identifier for this retriever (e.g. "yt-dlp")
    fn id(&self) -> &'static str;

    /// Metadata-only resolution of a URL: single item or collection, and a
    /// display title. Must not fetch media bytes.
    async fn probe(&self, url: &str, playlist: bool) -> Result<MediaProbe, MediagrabError>;

    /// Execute one retrieval run, streaming notifications into `notices`.
    ///
    /// Transient network failures are retried internally within the job's
    /// retry budget; an error return means that budget is exhausted.
    /// The sender is dropped on return, which closes the notice stream.
    async fn retrieve(
        &self,
        job: &RetrievalJob,
        tool: &ToolBinary,
        notices: mpsc::UnboundedSender<RetrievalNotice>,
    ) -> Result<RetrieveOutcome, MediagrabError>;
}
