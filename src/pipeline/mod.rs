//! Download orchestration pipeline

pub mod progress;
pub mod request;
pub mod runner;

pub use progress::{DownloadMeter, FailureKind, ProgressEvent};
pub use request::{
    AudioQuality, ContainerFormat, DownloadRequest, MediaKind, VideoQuality, DEFAULT_MAX_ITEMS,
};
pub use runner::{classify_failure, DownloadPipeline, PipelinePhase};
