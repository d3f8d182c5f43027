use serde::{Deserialize, Serialize};

use crate::{
    env::value::{Bit, Opinion},
    error::{BenOrError, Result},
};

/// A round message exchanged between nodes.
///
/// `decision = true` marks a decision announcement: its value is final and
/// is adopted by any recipient regardless of the `round` it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub round: u64,
    pub value: Opinion,
    #[serde(default)]
    pub decision: bool,
}

impl Message {
    /// The opinion a node reports for `round`.
    pub fn vote(round: u64, value: impl Into<Opinion>) -> Self {
        Self { round, value: value.into(), decision: false }
    }

    /// A decision announcement for `value`, stamped with the deciding round.
    pub fn announce(round: u64, value: Bit) -> Self {
        Self { round, value: Some(value), decision: true }
    }

    pub fn is_decision(&self) -> bool {
        self.decision
    }

    /// Rejects records that would corrupt a tally or an adoption.
    ///
    /// A plain vote may carry an undefined value (it then counts for
    /// neither bit), but an announcement without a value is meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.decision && self.value.is_none() {
            return Err(BenOrError::MalformedMessage(format!(
                "decision announcement for round {} carries no value",
                self.round
            )));
        }
        Ok(())
    }
}
