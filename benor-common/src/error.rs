use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenOrError {
    #[error("Invalid bit: {0} (expected 0 or 1)")]
    InvalidBit(u8),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid quorum: {0}")]
    InvalidQuorum(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BenOrError>;
