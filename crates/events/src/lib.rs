//! Job lifecycle events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: one committed status transition.
//! - [`TransitionLog`]: background subscriber that writes every transition
//!   to the structured log.

pub mod bus;
pub mod log;

pub use bus::{EventBus, JobEvent};
pub use log::TransitionLog;
