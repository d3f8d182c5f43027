use std::time::Duration;

use async_trait::async_trait;
use benor_common::{Message, NodeId};
use benor_consensus::{Network, NetworkError, ReadinessBarrier};
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::Result;

/// Delivers messages by POSTing them to each peer's `/message` route.
pub struct HttpNetwork {
    id: NodeId,
    client: Client,
    peers: Vec<String>,
}

impl HttpNetwork {
    /// `peers` holds the base URL of every node, indexed by id.
    pub fn new(id: NodeId, peers: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { id, client, peers })
    }

    fn url(&self, peer: NodeId) -> Option<String> {
        self.peers.get(peer.0).map(|base| format!("{base}/message"))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn send_to(&self, peer: NodeId, message: Message) -> std::result::Result<(), NetworkError> {
        let url = self.url(peer).ok_or(NetworkError::PeerNotFound(peer))?;
        trace!(from = %self.id, to = %peer, round = message.round, "posting message");

        let response = self
            .client
            .post(&url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NetworkError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NetworkError::Http(format!("{url} answered {}", response.status())));
        }
        Ok(())
    }
}

/// Readiness by probing every node's `/status`.
///
/// Any HTTP answer counts, a faulty node's 500 included: the probe only
/// asks whether the server is up.
pub struct HttpReadiness {
    client: Client,
    peers: Vec<String>,
}

impl HttpReadiness {
    pub fn new(peers: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, peers })
    }
}

#[async_trait]
impl ReadinessBarrier for HttpReadiness {
    async fn all_ready(&self) -> bool {
        for base in &self.peers {
            if let Err(e) = self.client.get(format!("{base}/status")).send().await {
                debug!(peer = %base, error = %e, "peer not reachable yet");
                return false;
            }
        }
        true
    }
}
