//! Row models and DTOs.

pub mod flow_config;
pub mod job;
