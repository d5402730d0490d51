//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod flow_config_repo;
pub mod job_repo;

pub use flow_config_repo::FlowConfigRepo;
pub use job_repo::JobRepo;
