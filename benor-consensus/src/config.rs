//! Tunables for a single consensus node.

use std::time::Duration;

use benor_common::{Quorum, Result};
use tracing::warn;

/// Blanket wait per round for peer messages to arrive.
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_millis(100);

/// Poll period of a readiness barrier that has no change notification.
pub const DEFAULT_READINESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Network size and fault bound.
    pub quorum: Quorum,

    /// How long a round waits after broadcasting before it tallies.
    pub propagation_delay: Duration,

    /// Poll period used while waiting for every peer to become reachable.
    pub readiness_poll_interval: Duration,

    /// Rounds of history kept behind the current round. `None` keeps the
    /// whole log for the lifetime of the node.
    pub retention_rounds: Option<u64>,

    /// Seed for the coin. Each node offsets it by its own id so coins stay
    /// independent across nodes. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl ConsensusConfig {
    pub fn new(n: usize, f: usize) -> Result<Self> {
        let quorum = Quorum::new(n, f)?;
        if !quorum.tolerates_faults() {
            warn!(n, f, "fault bound is not below n/2, agreement is not guaranteed");
        }
        Ok(Self {
            quorum,
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
            readiness_poll_interval: DEFAULT_READINESS_POLL_INTERVAL,
            retention_rounds: None,
            seed: None,
        })
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    pub fn with_readiness_poll_interval(mut self, interval: Duration) -> Self {
        self.readiness_poll_interval = interval;
        self
    }

    pub fn with_retention_rounds(mut self, rounds: u64) -> Self {
        self.retention_rounds = Some(rounds);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn n(&self) -> usize {
        self.quorum.n
    }

    pub fn f(&self) -> usize {
        self.quorum.f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timings() {
        let config = ConsensusConfig::new(4, 1).unwrap();
        assert_eq!(config.propagation_delay, Duration::from_millis(100));
        assert_eq!(config.readiness_poll_interval, Duration::from_secs(1));
        assert_eq!(config.retention_rounds, None);
    }

    #[test]
    fn test_builder() {
        let config = ConsensusConfig::new(3, 0)
            .unwrap()
            .with_propagation_delay(Duration::ZERO)
            .with_retention_rounds(2)
            .with_seed(9);
        assert_eq!(config.n(), 3);
        assert_eq!(config.f(), 0);
        assert_eq!(config.propagation_delay, Duration::ZERO);
        assert_eq!(config.retention_rounds, Some(2));
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_rejects_bad_quorum() {
        assert!(ConsensusConfig::new(0, 0).is_err());
        assert!(ConsensusConfig::new(2, 5).is_err());
    }
}
