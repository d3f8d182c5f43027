pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod runtime;
pub mod transport;

pub use config::NodeConfig;
pub use error::NodeError;
pub use runtime::{build_runtime, launch_network, simulate, ClusterPlan};
