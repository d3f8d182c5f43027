use benor_common::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Peer not found: {0}")]
    PeerNotFound(NodeId),

    #[error("Failed to send message to {0}: receiver closed")]
    Send(NodeId),

    #[error("HTTP error: {0}")]
    Http(String),
}
