use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON plan: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML plan: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("task {index}: {message}")]
    InvalidTask { index: usize, message: String },

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
