//! Mediagrab library

pub mod backend;
pub mod fetch;
pub mod pipeline;
pub mod retriever;
pub mod tool;
pub mod update;
pub mod utils;

// Re-export main types for easier use
pub use backend::{BackendActor, BackendCommand, BackendEvent, ProgressBridge, ToolStatus};
pub use fetch::ArtifactFetcher;
pub use pipeline::{DownloadPipeline, DownloadRequest, FailureKind, MediaKind, ProgressEvent};
pub use retriever::{Retriever, YtDlpRetriever};
pub use tool::{ToolBinary, ToolProvisioner};
pub use update::{ReleaseChecker, ReleaseInfo, SelfUpdater};
pub use utils::{AppSettings, MediagrabError, Session};
