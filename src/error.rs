use thiserror::Error;

use crate::sources::SourceError;
use crate::terraform::StateError;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to encode output: {0}")]
    EncodeYaml(#[from] serde_yaml::Error),
}
