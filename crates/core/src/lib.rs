//! Shared domain types for the flowgate job broker.
//!
//! Everything here is free of I/O: identifiers, timestamps, the job
//! lifecycle graph, flow-key derivation and hashing helpers used by the
//! store, the clients and the coordinator.

pub mod error;
pub mod hashing;
pub mod naming;
pub mod status;
pub mod types;
