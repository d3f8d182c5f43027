use benor_common::BenOrError;
use benor_consensus::{ConsensusError, NetworkError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Protocol(#[from] BenOrError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
