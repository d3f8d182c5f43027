use std::path::PathBuf;
use std::time::Duration;

use benor_common::{Bit, NodeId};
use clap::{Args, Parser, Subcommand};

use crate::config::{NodeConfig, DEFAULT_BASE_PORT};
use crate::error::{NodeError, Result};
use crate::runtime::ClusterPlan;

#[derive(Parser)]
#[command(name = "benor-node")]
#[command(about = "Ben-Or randomized binary consensus over HTTP")]
pub struct Cli {
    /// Also write consensus events to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one node and serve its control surface until Ctrl+C
    Node(NodeArgs),
    /// Run a whole network over HTTP in this process and print the final states
    Launch(ClusterArgs),
    /// Run a whole network over an in-memory mesh, optionally losing messages
    Simulate {
        #[command(flatten)]
        cluster: ClusterArgs,

        /// Fraction of messages dropped in transit
        #[arg(long, default_value_t = 0.0)]
        drop_rate: f64,
    },
}

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// JSON config file; flags below override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub id: Option<usize>,

    /// Network size
    #[arg(long)]
    pub nodes: Option<usize>,

    /// Fault bound F
    #[arg(long)]
    pub faulty_count: Option<usize>,

    /// Initial opinion, 0 or 1
    #[arg(long)]
    pub initial: Option<Bit>,

    #[arg(long)]
    pub faulty: bool,

    #[arg(long)]
    pub base_port: Option<u16>,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl NodeArgs {
    pub fn into_config(self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load_from_file(path)?,
            None => {
                let missing = |flag: &str| NodeError::Config(format!("--{flag} is required without --config"));
                NodeConfig::new(
                    NodeId(self.id.ok_or_else(|| missing("id"))?),
                    self.nodes.ok_or_else(|| missing("nodes"))?,
                    self.faulty_count.ok_or_else(|| missing("faulty-count"))?,
                    Some(self.initial.ok_or_else(|| missing("initial"))?),
                )
            }
        };

        if let Some(id) = self.id {
            config.id = NodeId(id);
        }
        if let Some(nodes) = self.nodes {
            config.nodes = nodes;
        }
        if let Some(f) = self.faulty_count {
            config.faulty_count = f;
        }
        if let Some(initial) = self.initial {
            config.initial = Some(initial);
        }
        if self.faulty {
            config.faulty = true;
        }
        if let Some(port) = self.base_port {
            config.base_port = port;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ClusterArgs {
    /// Network size
    #[arg(long)]
    pub nodes: usize,

    /// Fault bound F
    #[arg(long)]
    pub faulty_count: usize,

    /// Initial opinion of every node, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub initial: Vec<Bit>,

    /// Ids of the nodes that crash before starting, comma separated
    #[arg(long, value_delimiter = ',')]
    pub faulty_nodes: Vec<usize>,

    #[arg(long, default_value_t = DEFAULT_BASE_PORT)]
    pub base_port: u16,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Wait per round for peer messages, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub propagation_delay_ms: u64,

    /// Rounds of message history kept behind the current round
    #[arg(long)]
    pub retention_rounds: Option<u64>,

    /// Stop every node still running after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ClusterArgs {
    pub fn into_plan(self) -> Result<ClusterPlan> {
        if self.initial.len() != self.nodes {
            return Err(NodeError::Config(format!(
                "{} initial values given for {} nodes",
                self.initial.len(),
                self.nodes
            )));
        }

        let mut plan = ClusterPlan::new(self.faulty_count, self.initial.into_iter().map(Some).collect())
            .with_faulty_nodes(self.faulty_nodes.into_iter().map(NodeId))
            .with_base_port(self.base_port)
            .with_propagation_delay(Duration::from_millis(self.propagation_delay_ms))
            .with_deadline(Duration::from_secs(self.timeout_secs));
        plan.retention_rounds = self.retention_rounds;
        if let Some(seed) = self.seed {
            plan = plan.with_seed(seed);
        }
        plan.validate()?;
        Ok(plan)
    }
}
