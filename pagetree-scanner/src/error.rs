use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to extract {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Rank lookup failed for {url}: {reason}")]
    Lookup { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ScanError {
    /// True for failures that happened before a body was available.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            ScanError::HttpError(_) | ScanError::Status { .. } | ScanError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
