//! Media retrieval layer

pub mod models;
pub mod traits;
pub mod ytdlp;

pub use models::{MediaProbe, ProbeKind, RetrievalJob, RetrievalNotice, RetrieveOutcome};
pub use traits::Retriever;
pub use ytdlp::YtDlpRetriever;
