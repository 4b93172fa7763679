use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact {path:?}: {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact {path:?}: {source}")]
    ParseArtifact {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Session mutex poisoned: {0}")]
    SessionPoisoned(String),
    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),
    #[error("No input to run inference on")]
    EmptyInput,
    #[error("Inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
