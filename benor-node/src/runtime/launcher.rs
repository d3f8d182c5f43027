//! Running a whole network from one process.
//!
//! [`launch_network`] gives every node a real HTTP server and drives it
//! through its control surface, the way an external test harness would.
//! [`simulate`] skips the sockets and wires the nodes over the in-memory
//! mesh, optionally losing messages.

use std::sync::Arc;
use std::time::Duration;

use benor_common::{NodeId, NodeState, Opinion};
use benor_consensus::{
    network::in_memory::pump, ConsensusConfig, ConsensusNode, Diagnostics, InMemoryNetwork, ReadyFlags,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    api::rest::{serve, AppState},
    config::{port_of, DEFAULT_BASE_PORT, DEFAULT_PEER_HOST, DEFAULT_REQUEST_TIMEOUT_MS},
    error::{NodeError, Result},
    transport::HttpNetwork,
};

/// Shape of a network to run: size, fault bound, inputs, and which nodes
/// are faulty.
#[derive(Debug, Clone)]
pub struct ClusterPlan {
    pub faulty_count: usize,
    /// One entry per node; its length is the network size.
    pub initial: Vec<Opinion>,
    pub faulty_nodes: Vec<NodeId>,
    pub base_port: u16,
    pub host: String,
    pub propagation_delay: Duration,
    pub request_timeout: Duration,
    pub retention_rounds: Option<u64>,
    pub seed: Option<u64>,
    /// Fraction of in-memory messages lost. Ignored over HTTP.
    pub drop_rate: f64,
    /// Nodes still running after this long are stopped.
    pub deadline: Option<Duration>,
}

/// Final view of one node after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub outcome: String,
    pub state: NodeState,
    pub diagnostics: Diagnostics,
}

impl ClusterPlan {
    pub fn new(faulty_count: usize, initial: Vec<Opinion>) -> Self {
        Self {
            faulty_count,
            initial,
            faulty_nodes: Vec::new(),
            base_port: DEFAULT_BASE_PORT,
            host: DEFAULT_PEER_HOST.to_string(),
            propagation_delay: benor_consensus::config::DEFAULT_PROPAGATION_DELAY,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retention_rounds: None,
            seed: None,
            drop_rate: 0.0,
            deadline: None,
        }
    }

    pub fn with_faulty_nodes(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.faulty_nodes = nodes.into_iter().collect();
        self
    }

    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_drop_rate(mut self, rate: f64) -> Self {
        self.drop_rate = rate;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn nodes(&self) -> usize {
        self.initial.len()
    }

    pub fn is_faulty(&self, id: NodeId) -> bool {
        self.faulty_nodes.contains(&id)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.nodes();
        if let Some(id) = self.faulty_nodes.iter().find(|id| id.0 >= n) {
            return Err(NodeError::Config(format!("faulty node {id} is outside a {n}-node network")));
        }
        if !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(NodeError::Config(format!("drop rate {} is not in [0, 1]", self.drop_rate)));
        }
        if self.faulty_nodes.len() > self.faulty_count {
            warn!(
                faulty = self.faulty_nodes.len(),
                f = self.faulty_count,
                "more faulty nodes than the configured fault bound"
            );
        }
        self.consensus_config()?;
        if n > 0 {
            self.listen_port(NodeId(n - 1))?;
        }
        Ok(())
    }

    /// Port node `id` binds to. A base port of 0 lets the OS pick one per
    /// node; [`HttpCluster::spawn`] then addresses peers by what was bound.
    pub fn listen_port(&self, id: NodeId) -> Result<u16> {
        if self.base_port == 0 {
            return Ok(0);
        }
        port_of(self.base_port, id)
    }

    pub fn consensus_config(&self) -> Result<ConsensusConfig> {
        let mut config = ConsensusConfig::new(self.nodes(), self.faulty_count)?
            .with_propagation_delay(self.propagation_delay);
        if let Some(rounds) = self.retention_rounds {
            config = config.with_retention_rounds(rounds);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }
}

/// N nodes, each serving its control surface on its own port.
pub struct HttpCluster {
    pub nodes: Vec<Arc<ConsensusNode>>,
    pub urls: Vec<String>,
    servers: Vec<JoinHandle<()>>,
    client: Client,
}

impl HttpCluster {
    /// Binds every port first so each node knows its peers' real addresses,
    /// then starts the servers and flips each node's ready flag.
    pub async fn spawn(plan: &ClusterPlan) -> Result<Self> {
        plan.validate()?;
        let config = plan.consensus_config()?;

        let mut listeners = Vec::with_capacity(plan.nodes());
        let mut urls = Vec::with_capacity(plan.nodes());
        for i in 0..plan.nodes() {
            let port = plan.listen_port(NodeId(i))?;
            let listener = TcpListener::bind((plan.host.as_str(), port))
                .await
                .map_err(|source| NodeError::Bind {
                    addr: format!("{}:{}", plan.host, port),
                    source,
                })?;
            urls.push(format!("http://{}", listener.local_addr()?));
            listeners.push(listener);
        }

        let readiness = Arc::new(ReadyFlags::new(plan.nodes()));
        let mut nodes = Vec::with_capacity(plan.nodes());
        let mut servers = Vec::with_capacity(plan.nodes());
        for (i, listener) in listeners.into_iter().enumerate() {
            let id = NodeId(i);
            let network = HttpNetwork::new(id, urls.clone(), plan.request_timeout)?;
            let node = Arc::new(ConsensusNode::new(
                id,
                plan.initial[i],
                plan.is_faulty(id),
                config.clone(),
                Arc::new(network),
                readiness.clone(),
            ));

            let state = AppState { node: Arc::clone(&node) };
            servers.push(tokio::spawn(async move {
                if let Err(e) = serve(listener, state, std::future::pending()).await {
                    error!(node = %id, error = %e, "control surface stopped");
                }
            }));
            readiness.set_ready(id);
            nodes.push(node);
        }

        info!(n = plan.nodes(), f = plan.faulty_count, "http cluster up");
        Ok(Self { nodes, urls, servers, client: Client::new() })
    }

    /// Hits `/start` on every node at once and waits for all of them, then
    /// collects `/getState` and `/diagnostics`.
    pub async fn run(&self, deadline: Option<Duration>) -> Result<Vec<NodeReport>> {
        let starts: Vec<JoinHandle<reqwest::Result<String>>> = self
            .urls
            .iter()
            .map(|base| {
                let client = self.client.clone();
                let url = format!("{base}/start");
                tokio::spawn(async move { client.get(url).send().await?.text().await })
            })
            .collect();

        let watchdog = deadline.map(|deadline| {
            let client = self.client.clone();
            let urls = self.urls.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(?deadline, "deadline reached, stopping every node");
                for base in urls {
                    if let Err(e) = client.get(format!("{base}/stop")).send().await {
                        debug!(url = %base, error = %e, "stop request failed");
                    }
                }
            })
        });

        let mut joined = Vec::with_capacity(starts.len());
        for start in starts {
            joined.push(start.await);
        }
        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let mut reports = Vec::with_capacity(joined.len());
        for (i, (base, start)) in self.urls.iter().zip(joined).enumerate() {
            let outcome = start??;
            let state = self.client.get(format!("{base}/getState")).send().await?.json().await?;
            let diagnostics = self.client.get(format!("{base}/diagnostics")).send().await?.json().await?;
            reports.push(NodeReport { id: NodeId(i), outcome, state, diagnostics });
        }
        Ok(reports)
    }

    pub fn shutdown(self) {
        for server in self.servers {
            server.abort();
        }
    }
}

/// Starts an HTTP cluster, runs it to completion and tears it down.
pub async fn launch_network(plan: &ClusterPlan) -> Result<Vec<NodeReport>> {
    let cluster = HttpCluster::spawn(plan).await?;
    let reports = cluster.run(plan.deadline).await;
    cluster.shutdown();
    reports
}

/// Runs the plan over the in-memory mesh.
pub async fn simulate(plan: &ClusterPlan) -> Result<Vec<NodeReport>> {
    plan.validate()?;
    let config = plan.consensus_config()?;
    let readiness = Arc::new(ReadyFlags::new(plan.nodes()));

    let mut nodes = Vec::with_capacity(plan.nodes());
    let mut networks = Vec::with_capacity(plan.nodes());
    let mut pumps = Vec::with_capacity(plan.nodes());
    let mesh = InMemoryNetwork::mesh(plan.nodes(), plan.drop_rate, plan.seed.unwrap_or_default());
    for (i, (network, inbox)) in mesh.into_iter().enumerate() {
        let id = NodeId(i);
        let node = Arc::new(ConsensusNode::new(
            id,
            plan.initial[i],
            plan.is_faulty(id),
            config.clone(),
            Arc::new(network.clone()),
            readiness.clone(),
        ));
        pumps.push(tokio::spawn(pump(inbox, Arc::clone(&node))));
        readiness.set_ready(id);
        networks.push(network);
        nodes.push(node);
    }
    info!(n = plan.nodes(), f = plan.faulty_count, drop_rate = plan.drop_rate, "simulation started");

    let runs: Vec<_> = nodes
        .iter()
        .map(|node| {
            let node = Arc::clone(node);
            tokio::spawn(async move { node.start().await })
        })
        .collect();

    let watchdog = plan.deadline.map(|deadline| {
        let nodes = nodes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            warn!(?deadline, "deadline reached, stopping every node");
            for node in nodes {
                node.stop().await;
            }
        })
    });

    let mut joined = Vec::with_capacity(runs.len());
    for run in runs {
        joined.push(run.await);
    }
    if let Some(watchdog) = watchdog {
        watchdog.abort();
    }
    for pump in pumps {
        pump.abort();
    }

    let mut reports = Vec::with_capacity(nodes.len());
    for (node, run) in nodes.iter().zip(joined) {
        let outcome = run??;
        reports.push(NodeReport {
            id: node.id(),
            outcome: outcome.to_string(),
            state: node.get_state().await,
            diagnostics: node.diagnostics().await,
        });
    }

    let dropped: u64 = networks.iter().map(InMemoryNetwork::dropped).sum();
    info!(dropped, "simulation finished");
    Ok(reports)
}
