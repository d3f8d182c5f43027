use serde::{Deserialize, Serialize};

/// Index of a participant in `[0, N)`.
///
/// Peers are addressed by index: the transport turns a `NodeId` into a
/// port (`base_port + id`) or a channel, and broadcast skips the sender's
/// own id.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Every id of an `n`-node network except `self`.
    pub fn peers(self, n: usize) -> impl Iterator<Item = NodeId> {
        (0..n).filter(move |i| *i != self.0).map(NodeId)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
