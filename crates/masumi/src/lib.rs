//! Payment Gateway Client for the Masumi payment service.
//!
//! - [`PaymentGateway`]: the seam the coordinator and job service use.
//! - [`MasumiApi`]: live HTTP client against a Masumi payment service node.
//! - [`SimulatedPaymentGateway`]: confirms every request after a fixed delay.
//!
//! Both implementations are interchangeable; [`build_gateway`] picks one
//! from [`MasumiConfig`].

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod simulated;

pub use api::MasumiApi;
pub use config::{MasumiConfig, PaymentMode};
pub use error::PaymentError;
pub use gateway::{PaymentGateway, PaymentRequest, PaymentStatus, PaymentTerms};
pub use simulated::SimulatedPaymentGateway;

/// Construct the gateway selected by `config.mode`.
pub fn build_gateway(config: &MasumiConfig) -> Arc<dyn PaymentGateway> {
    let gateway: Arc<dyn PaymentGateway> = match config.mode {
        PaymentMode::Live => Arc::new(MasumiApi::new(config)),
        PaymentMode::Simulated => {
            tracing::warn!("Payment gateway running in simulated mode; no real payments are checked");
            Arc::new(SimulatedPaymentGateway::new(config.simulated_confirm_delay))
        }
    };
    gateway
}
