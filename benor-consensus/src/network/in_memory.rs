use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use benor_common::{Message, NodeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

use crate::network::{traits::Network, NetworkError};
use crate::node::ConsensusNode;

const CHANNEL_CAPACITY: usize = 1024;

/// Channel-backed transport for running every node in one process.
///
/// Each endpoint holds a sender per peer. A non-zero drop rate discards
/// that fraction of outgoing messages silently, the way a lossy network
/// would: the sender still sees `Ok`.
#[derive(Clone)]
pub struct InMemoryNetwork {
    pub id: NodeId,
    peers: Arc<Mutex<HashMap<NodeId, Sender<Message>>>>,
    drop_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    dropped: Arc<AtomicU64>,
}

impl InMemoryNetwork {
    pub fn new(id: NodeId) -> (Self, Sender<Message>, Receiver<Message>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        (Self {
            id,
            peers: Arc::new(Mutex::new(HashMap::new())),
            drop_rate: 0.0,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(id.0 as u64))),
            dropped: Arc::new(AtomicU64::new(0)),
        }, tx, rx)
    }

    /// Drops each outgoing message with probability `rate`, drawn from a
    /// generator seeded with `seed`.
    pub fn with_drop_rate(mut self, rate: f64, seed: u64) -> Self {
        self.drop_rate = rate.clamp(0.0, 1.0);
        self.rng = Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed.wrapping_add(self.id.0 as u64))));
        self
    }

    pub fn add_peer(&self, peer_id: NodeId, sender: Sender<Message>) {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer_id, sender);
    }

    /// Builds a fully connected mesh of `n` endpoints. Endpoint `i` comes
    /// with the receiver of node `i`'s inbox.
    pub fn mesh(n: usize, drop_rate: f64, seed: u64) -> Vec<(InMemoryNetwork, Receiver<Message>)> {
        let endpoints: Vec<_> = (0..n)
            .map(|i| {
                let (net, tx, rx) = InMemoryNetwork::new(NodeId(i));
                (net.with_drop_rate(drop_rate, seed), tx, rx)
            })
            .collect();

        for (net, _, _) in &endpoints {
            for (peer, tx, _) in &endpoints {
                if peer.id != net.id {
                    net.add_peer(peer.id, tx.clone());
                }
            }
        }

        endpoints.into_iter().map(|(net, _, rx)| (net, rx)).collect()
    }

    /// Messages discarded by the drop rate so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn should_drop(&self) -> bool {
        if self.drop_rate <= 0.0 {
            return false;
        }
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.drop_rate)
    }
}

#[async_trait]
impl Network for InMemoryNetwork {
    async fn send_to(&self, peer: NodeId, message: Message) -> Result<(), NetworkError> {
        let sender = {
            let peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
            peers.get(&peer).cloned()
        };

        let Some(sender) = sender else {
            return Err(NetworkError::PeerNotFound(peer));
        };

        if self.should_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(from = %self.id, to = %peer, round = message.round, "message dropped");
            return Ok(());
        }

        sender.send(message).await.map_err(|_| NetworkError::Send(peer))
    }
}

/// Feeds a node's inbox into its inbound handler until every sender is gone.
pub async fn pump(mut rx: Receiver<Message>, node: Arc<ConsensusNode>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = node.handle_inbound(message).await {
            debug!(node = %node.id(), error = %e, "inbound message rejected");
        }
    }
}
