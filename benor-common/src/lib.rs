//! Shared data model for the Ben-Or consensus workspace.
//!
//! Everything that crosses a crate or process boundary lives here: the
//! binary opinion type, the wire message, quorum arithmetic, the state
//! snapshot served by the control surface, and the common error type.

pub mod env;
pub mod error;
pub mod utils;

pub use env::message::Message;
pub use env::quorum::Quorum;
pub use env::state::{NodeState, NodeStatus};
pub use env::value::{Bit, Opinion};
pub use error::{BenOrError, Result};
pub use utils::NodeId;
