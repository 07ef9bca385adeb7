// components/media_downloader/src/types.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("required tool not found: {0}")]
    ToolNotFound(&'static str),

    #[error("download failed: {0}")]
    Failed(String),

    #[error("could not parse tool output: {0}")]
    BadToolOutput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the worker actually produced. The filename is the real on-disk name
/// after extension normalization, which may differ from anything the caller
/// guessed from the search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub filename: String,
    pub title: String,
}
