pub mod builder;
pub mod launcher;

pub use builder::{build_runtime, NodeRuntime};
pub use launcher::{launch_network, simulate, ClusterPlan, HttpCluster, NodeReport};
