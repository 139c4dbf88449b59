use {
    serde::{Deserialize, Serialize},
    wayfarer_browser::BrowserError,
};

/// Failure class carried on a failed [`ActionResult`](crate::ActionResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Interaction,
    Navigation,
    Timeout,
    UnknownAction,
}

impl ErrorKind {
    /// Validation and unknown-action failures are planning defects; retrying
    /// them cannot help.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Validation | Self::UnknownAction)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Interaction(String),

    #[error("{0}")]
    Navigation(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),
}

impl ActionError {
    pub fn missing(params: &[&str]) -> Self {
        Self::Validation(format!("Missing required parameters: {}", params.join(", ")))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Interaction(_) => ErrorKind::Interaction,
            Self::Navigation(_) => ErrorKind::Navigation,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
        }
    }
}

impl From<BrowserError> for ActionError {
    fn from(err: BrowserError) -> Self {
        let text = err.to_string();
        match err {
            BrowserError::Timeout(_) => Self::Timeout(text),
            BrowserError::InvalidSelector(_) => Self::Validation(text),
            e if e.is_navigation() => Self::Navigation(text),
            _ => Self::Interaction(text),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
