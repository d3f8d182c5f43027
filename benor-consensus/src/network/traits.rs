use async_trait::async_trait;
use benor_common::{Message, NodeId};

use super::NetworkError;

/// Unreliable point-to-point transport between nodes.
///
/// `Ok` only means the message left this node; there is no delivery or
/// ordering guarantee.
#[async_trait]
pub trait Network: Send + Sync {
    async fn send_to(&self, peer: NodeId, message: Message) -> Result<(), NetworkError>;
}
