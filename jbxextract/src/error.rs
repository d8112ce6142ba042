//! Extraction error types.

use thiserror::Error;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised by the extraction pipeline
#[derive(Error, Debug)]
pub enum ExtractError {
    /// HTTP error while fetching credential material
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to spawn the extractor process or write its credential file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The extractor ran but reported a failure
    #[error("Extractor failed: {0}")]
    ExtractorFailed(String),

    /// The extractor's JSON output did not parse
    #[error("Failed to parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The worker pool shut down while the call was pending
    #[error("Extraction worker pool is gone")]
    WorkerGone,

    /// The extraction call exceeded its bounded wait
    #[error("Extraction call timed out")]
    Timeout,
}
