//! Error handling for Mediagrab

use thiserror::Error;

/// Main error type for Mediagrab
#[derive(Debug, Error)]
pub enum MediagrabError {
    #[error("Media tool is not available: {0}")]
    ToolUnavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server returned HTTP {0}")]
    HttpStatusError(u16),

    #[error("Release feed is malformed: {0}")]
    MalformedFeed(String),

    #[error("Archive is corrupt or unreadable: {0}")]
    CorruptArchive(String),

    #[error("Expected entry not found: {0}")]
    NotFound(String),

    #[error("Tool verification failed after install")]
    VerificationFailed,

    #[error("Certificate trust error: {0}")]
    CertificateError(String),

    #[error("No matching asset in release")]
    NoMatchingAsset,

    #[error("Retrieval failed: {0}")]
    RetrievalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    UnknownError(String),
}

impl From<reqwest::Error> for MediagrabError {
    fn from(err: reqwest::Error) -> Self {
        // Connection-level certificate failures surface through reqwest as
        // generic transport errors carrying a trust-store message.
        let text = err.to_string();
        if text.contains("certificate") || text.contains("UnknownIssuer") {
            MediagrabError::CertificateError(text)
        } else if let Some(status) = err.status() {
            MediagrabError::HttpStatusError(status.as_u16())
        } else {
            MediagrabError::NetworkError(text)
        }
    }
}

impl From<zip::result::ZipError> for MediagrabError {
    fn from(err: zip::result::ZipError) -> Self {
        MediagrabError::CorruptArchive(err.to_string())
    }
}
