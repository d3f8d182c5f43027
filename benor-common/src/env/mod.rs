pub mod message;
pub mod quorum;
pub mod state;
pub mod value;
