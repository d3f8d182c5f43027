use std::fmt;

use serde::{Deserialize, Serialize};

use crate::env::value::Opinion;

/// Snapshot served by the state query.
///
/// Field names on the wire are the short ones the control surface serves:
/// `x` is the opinion and `k` the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub killed: bool,
    #[serde(rename = "x")]
    pub opinion: Opinion,
    pub decided: Option<bool>,
    #[serde(rename = "k")]
    pub round: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Live,
    Faulty,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Live => write!(f, "live"),
            NodeStatus::Faulty => write!(f, "faulty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bit;

    #[test]
    fn test_state_uses_short_field_names() {
        let state = NodeState { killed: false, opinion: Some(Bit::One), decided: Some(true), round: Some(2) };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "killed": false, "x": 1, "decided": true, "k": 2 }));
    }

    #[test]
    fn test_faulty_state_is_all_null() {
        let state = NodeState { killed: false, opinion: None, decided: None, round: None };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({ "killed": false, "x": null, "decided": null, "k": null }));
    }
}
