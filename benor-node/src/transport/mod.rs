pub mod http;

pub use http::{HttpNetwork, HttpReadiness};
