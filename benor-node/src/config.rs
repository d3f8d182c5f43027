use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};

use benor_common::{NodeId, Opinion, Quorum};
use benor_consensus::ConsensusConfig;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

pub const DEFAULT_BASE_PORT: u16 = 3000;
pub const DEFAULT_PEER_HOST: &str = "localhost";
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_peer_host() -> String {
    DEFAULT_PEER_HOST.to_string()
}

fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

fn default_propagation_delay_ms() -> u64 {
    benor_consensus::config::DEFAULT_PROPAGATION_DELAY.as_millis() as u64
}

fn default_readiness_poll_interval_ms() -> u64 {
    benor_consensus::config::DEFAULT_READINESS_POLL_INTERVAL.as_millis() as u64
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Configuration of one node process, stored as JSON.
///
/// Node `i` listens on `base_port + i` and reaches peer `j` at
/// `http://{peer_host}:{base_port + j}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    pub nodes: usize,
    pub faulty_count: usize,
    pub initial: Opinion,
    #[serde(default)]
    pub faulty: bool,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_peer_host")]
    pub peer_host: String,
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,
    #[serde(default = "default_readiness_poll_interval_ms")]
    pub readiness_poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retention_rounds: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NodeConfig {
    pub fn new(id: NodeId, nodes: usize, faulty_count: usize, initial: Opinion) -> Self {
        Self {
            id,
            nodes,
            faulty_count,
            initial,
            faulty: false,
            base_port: default_base_port(),
            peer_host: default_peer_host(),
            listen_host: default_listen_host(),
            propagation_delay_ms: default_propagation_delay_ms(),
            readiness_poll_interval_ms: default_readiness_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retention_rounds: None,
            seed: None,
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(path, json)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Checks everything that would otherwise fail once the node is up.
    pub fn validate(&self) -> Result<()> {
        Quorum::new(self.nodes, self.faulty_count)?;
        if self.id.0 >= self.nodes {
            return Err(NodeError::Config(format!(
                "node id {} is outside a {}-node network",
                self.id, self.nodes
            )));
        }
        if self.base_port == 0 {
            return Err(NodeError::Config(
                "base port 0 leaves peers without an address; pick a fixed base port".to_string(),
            ));
        }
        port_of(self.base_port, NodeId(self.nodes - 1))?;
        Ok(())
    }

    pub fn port(&self) -> Result<u16> {
        port_of(self.base_port, self.id)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.listen_host, self.port()?).parse()?)
    }

    /// Base URLs of every node, this one included, indexed by id.
    pub fn peer_urls(&self) -> Result<Vec<String>> {
        (0..self.nodes)
            .map(|i| Ok(format!("http://{}:{}", self.peer_host, port_of(self.base_port, NodeId(i))?)))
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn to_consensus_config(&self) -> Result<ConsensusConfig> {
        let mut config = ConsensusConfig::new(self.nodes, self.faulty_count)?
            .with_propagation_delay(Duration::from_millis(self.propagation_delay_ms))
            .with_readiness_poll_interval(Duration::from_millis(self.readiness_poll_interval_ms));
        if let Some(rounds) = self.retention_rounds {
            config = config.with_retention_rounds(rounds);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        Ok(config)
    }
}

/// Port of node `id`: `base_port + id`, if it fits.
pub fn port_of(base_port: u16, id: NodeId) -> Result<u16> {
    u16::try_from(id.0)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .ok_or_else(|| NodeError::Config(format!("port {base_port} + {id} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use benor_common::Bit;

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");

        let mut config = NodeConfig::new(NodeId(2), 4, 1, Some(Bit::One));
        config.seed = Some(9);
        config.save_to_file(&path).unwrap();

        assert_eq!(NodeConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{"id": 0, "nodes": 3, "faulty_count": 0, "initial": 0}"#).unwrap();
        assert_eq!(config.base_port, 3000);
        assert_eq!(config.peer_host, "localhost");
        assert_eq!(config.propagation_delay_ms, 100);
        assert_eq!(config.readiness_poll_interval_ms, 1000);
        assert!(!config.faulty);
        assert_eq!(config.retention_rounds, None);
    }

    #[test]
    fn test_bad_json_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        fs::write(&path, r#"{"id": 0, "nodes": 3, "faulty_count": 0, "initial": 7}"#).unwrap();

        let err = NodeConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_validate() {
        assert!(NodeConfig::new(NodeId(0), 3, 1, Some(Bit::Zero)).validate().is_ok());
        assert!(NodeConfig::new(NodeId(3), 3, 1, Some(Bit::Zero)).validate().is_err());
        assert!(NodeConfig::new(NodeId(0), 3, 4, Some(Bit::Zero)).validate().is_err());

        let mut config = NodeConfig::new(NodeId(0), 10, 1, Some(Bit::Zero));
        config.base_port = u16::MAX - 3;
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));
    }

    #[test]
    fn test_zero_base_port_is_rejected() {
        // Every peer URL would point at port 0, so readiness could never pass.
        let mut config = NodeConfig::new(NodeId(0), 1, 0, Some(Bit::Zero));
        config.base_port = 0;
        assert!(matches!(config.validate(), Err(NodeError::Config(_))));
    }

    #[test]
    fn test_addressing() {
        let mut config = NodeConfig::new(NodeId(1), 3, 0, None);
        config.listen_host = "127.0.0.1".into();
        assert_eq!(config.port().unwrap(), 3001);
        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:3001".parse().unwrap());
        assert_eq!(
            config.peer_urls().unwrap(),
            vec!["http://localhost:3000", "http://localhost:3001", "http://localhost:3002"]
        );
    }

    #[test]
    fn test_consensus_config_carries_tunables() {
        let mut config = NodeConfig::new(NodeId(0), 5, 2, Some(Bit::One));
        config.propagation_delay_ms = 20;
        config.retention_rounds = Some(3);
        config.seed = Some(1);

        let consensus = config.to_consensus_config().unwrap();
        assert_eq!((consensus.n(), consensus.f()), (5, 2));
        assert_eq!(consensus.propagation_delay, Duration::from_millis(20));
        assert_eq!(consensus.retention_rounds, Some(3));
        assert_eq!(consensus.seed, Some(1));
    }
}
