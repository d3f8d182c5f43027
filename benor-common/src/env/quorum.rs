use serde::{Deserialize, Serialize};

use crate::error::{BenOrError, Result};

/// Network size and fault bound, with the two thresholds derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    pub n: usize,
    pub f: usize,
}

impl Quorum {
    pub fn new(n: usize, f: usize) -> Result<Self> {
        if n == 0 {
            return Err(BenOrError::InvalidQuorum("network needs at least one node".into()));
        }
        if f > n {
            return Err(BenOrError::InvalidQuorum(format!(
                "fault bound {f} exceeds network size {n}"
            )));
        }
        Ok(Self { n, f })
    }

    /// Strict majority: `floor(n/2) + 1`.
    pub fn majority(&self) -> usize {
        self.n / 2 + 1
    }

    /// Reports needed to adopt a value without deciding: `n - f`.
    pub fn safe_adopt(&self) -> usize {
        self.n - self.f
    }

    /// `count > n/2`.
    pub fn is_majority(&self, count: usize) -> bool {
        count >= self.majority()
    }

    pub fn is_safe_adopt(&self, count: usize) -> bool {
        count >= self.safe_adopt()
    }

    /// Whether agreement is guaranteed for this fault bound (`f < n/2`).
    pub fn tolerates_faults(&self) -> bool {
        2 * self.f < self.n
    }
}
