//! utils
//!
//! Small helper types shared across the workspace.

pub mod node_id;
pub use node_id::NodeId;
