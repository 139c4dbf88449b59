//! Browser error types.

use thiserror::Error;

/// Errors raised by the browser-control surface.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser not available: {0}")]
    BrowserNotAvailable(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("JavaScript evaluation failed: {0}")]
    JsEvalFailed(String),

    #[error("screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("no tab at index {0}")]
    TabNotFound(usize),

    #[error("cannot close the only tab")]
    LastTab,

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported by this browser: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BrowserError {
    /// Whether the failure happened while loading a document.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::NavigationFailed(_) | Self::InvalidUrl(_) | Self::ConnectionClosed(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        let text = err.to_string();
        if text.contains("AlreadyClosed") || text.contains("ConnectionClosed") {
            BrowserError::ConnectionClosed(text)
        } else if text.to_lowercase().contains("timeout") {
            BrowserError::Timeout(text)
        } else {
            BrowserError::Cdp(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_carries_signature() {
        let err = BrowserError::Timeout("5000ms waiting for `.item`".into());
        assert!(err.to_string().to_lowercase().contains("timeout"));
        assert!(err.is_timeout());
        assert!(!err.is_navigation());
    }

    #[test]
    fn navigation_classification() {
        assert!(BrowserError::NavigationFailed("net::ERR".into()).is_navigation());
        assert!(BrowserError::InvalidUrl("ftp://x".into()).is_navigation());
        assert!(!BrowserError::ElementNotFound("css `a`".into()).is_navigation());
    }
}
