use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use benor_consensus::ConsensusNode;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    api::rest::{serve, AppState},
    config::NodeConfig,
    error::{NodeError, Result},
    transport::{HttpNetwork, HttpReadiness},
};

/// A node wired to the HTTP transport and bound to its port, not yet serving.
pub struct NodeRuntime {
    pub node: Arc<ConsensusNode>,
    listener: TcpListener,
}

pub async fn build_runtime(config: &NodeConfig) -> Result<NodeRuntime> {
    config.validate()?;
    let peers = config.peer_urls()?;
    let network = HttpNetwork::new(config.id, peers.clone(), config.request_timeout())?;
    let readiness = HttpReadiness::new(peers, config.request_timeout())?;

    let node = Arc::new(ConsensusNode::new(
        config.id,
        config.initial,
        config.faulty,
        config.to_consensus_config()?,
        Arc::new(network),
        Arc::new(readiness),
    ));

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr).await.map_err(|source| NodeError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    info!(
        node = %config.id,
        n = config.nodes,
        f = config.faulty_count,
        faulty = config.faulty,
        initial = ?config.initial,
        "node built"
    );
    Ok(NodeRuntime { node, listener })
}

impl NodeRuntime {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves the control surface until `shutdown` resolves.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        serve(self.listener, AppState { node: self.node }, shutdown).await
    }
}
