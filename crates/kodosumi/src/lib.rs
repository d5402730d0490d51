//! Execution Engine Client for Kodosumi.
//!
//! [`ExecutionEngine`] is the seam the flow registry and the coordinator
//! use; [`KodosumiApi`] implements it over the Kodosumi HTTP API.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;

pub use api::KodosumiApi;
pub use config::KodosumiConfig;
pub use engine::{DiscoveredFlow, ExecutionEngine, RunState, RunStatus};
pub use error::EngineError;
