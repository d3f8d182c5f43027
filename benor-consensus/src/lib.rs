//! Ben-Or randomized binary consensus.
//!
//! A [`ConsensusNode`] runs the round loop: broadcast its opinion, wait for
//! peers, tally the round in its [`MessageLog`], then decide, adopt, or toss
//! a coin via the [`RoundCoordinator`]. Transport and readiness are
//! collaborators behind the [`Network`] and [`ReadinessBarrier`] traits.

pub mod config;
pub mod error;
pub mod log;
pub mod network;
pub mod node;
pub mod readiness;
pub mod round;

pub use config::ConsensusConfig;
pub use error::ConsensusError;
pub use log::MessageLog;
pub use network::{in_memory::InMemoryNetwork, traits::Network, NetworkError};
pub use node::{ConsensusNode, Diagnostics, Outcome};
pub use readiness::{AlwaysReady, ReadinessBarrier, ReadyFlags};
pub use round::{RoundCoordinator, RoundOutcome, Tally};
