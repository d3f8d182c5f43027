pub mod error;
pub mod in_memory;
pub mod traits;

pub use error::NetworkError;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use benor_common::{Message, NodeId};
use tracing::debug;

use traits::Network;

/// Fire-and-forget broadcast from `from` to every other node of an
/// `n`-node network.
///
/// One task is spawned per peer and none is awaited. Failed sends are not
/// retried; they are only counted in `failed_sends`.
pub fn broadcast(
    network: &Arc<dyn Network>,
    from: NodeId,
    n: usize,
    message: Message,
    failed_sends: &Arc<AtomicU64>,
) {
    for peer in from.peers(n) {
        let network = Arc::clone(network);
        let failed_sends = Arc::clone(failed_sends);
        let message = message.clone();
        tokio::spawn(async move {
            if let Err(e) = network.send_to(peer, message).await {
                failed_sends.fetch_add(1, Ordering::Relaxed);
                debug!(node = %from, peer = %peer, error = %e, "send failed");
            }
        });
    }
}
