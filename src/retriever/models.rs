//! Data structures for media resolution and retrieval

use crate::pipeline::request::DownloadRequest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a metadata-only URL resolution — no media bytes fetched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProbe {
    pub title: String,
    pub kind: ProbeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeKind {
    Single,
    Collection { entries: u32 },
}

/// Everything the retrieval layer needs for one run.
///
/// The pipeline resolves stream selection and output layout up front; the
/// retriever only executes.
#[derive(Debug, Clone)]
pub struct RetrievalJob {
    pub request: DownloadRequest,
    pub format_selector: String,
    pub dest_dir: PathBuf,
    pub output_template: String,
    /// Cap on collection items, set when the probe reported a collection
    pub item_cap: Option<u32>,
    pub retry_budget: u32,
    pub socket_timeout_secs: u32,
}

/// Raw notifications flowing out of a retrieval in progress
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalNotice {
    /// Absolute byte counts (stub backends, direct transfers)
    Chunk {
        bytes_done: u64,
        bytes_total: Option<u64>,
        speed_bps: f64,
    },
    /// Percentage as reported by tool output lines
    Percent {
        percent: f64,
        bytes_total: Option<u64>,
        speed_bps: f64,
    },
    /// The raw transfer finished and postprocessing began
    PostprocessingStarted,
}

/// Terminal result of a successful retrieval
#[derive(Debug, Clone)]
pub struct RetrieveOutcome {
    pub location: PathBuf,
}
