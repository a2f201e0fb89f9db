use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read record {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn {stage} thread: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} lost its downstream queue")]
    Disconnected { stage: String },

    #[error("{stage} thread panicked")]
    StagePanicked { stage: String },

    #[error("Failed to write results: {0}")]
    Write(#[source] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TallyError>;
