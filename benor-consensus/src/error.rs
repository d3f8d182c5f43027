use benor_common::{BenOrError, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Consensus already running on node {0}")]
    AlreadyRunning(NodeId),

    #[error("Rejected inbound message: {0}")]
    Rejected(#[from] BenOrError),
}
