//! Job lifecycle coordination.
//!
//! - [`coordinator::Coordinator`]: the payment loop and the execution loop,
//!   each runnable as a single deterministic cycle.
//! - [`registry::FlowRegistry`]: snapshot cache of discovered flows merged
//!   with local overrides.
//! - [`service::JobService`]: job submission, status lookup and the payment
//!   confirmation webhook path.
//! - [`tasks::BackgroundTasks`]: supervisor for the recurring tasks.

pub mod config;
pub mod coordinator;
pub mod registry;
pub mod service;
pub mod tasks;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CycleReport, JobError};
pub use registry::{FlowDescriptor, FlowRegistry, RegistryError};
pub use service::{JobService, ServiceError, SubmitJob};
pub use tasks::BackgroundTasks;
