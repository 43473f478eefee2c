use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

/// Failures talking to Chromium. Probe call sites usually swallow these
/// through `bounded`; navigation and launch surface them.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium launch failed: {0}")]
    Launch(String),
    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("browser configuration: {0}")]
    Configuration(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("no element matches {0}")]
    ElementNotFound(String),
    #[error("page script failed: {0}")]
    Script(String),
    #[error("browser task failed: {0}")]
    Unexpected(String),
}

impl From<tokio::task::JoinError> for BrowserError {
    fn from(err: tokio::task::JoinError) -> Self {
        BrowserError::Unexpected(err.to_string())
    }
}
