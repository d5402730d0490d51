use std::time::Duration;

use flowgate_core::types::Amount;

/// Which [`PaymentGateway`](crate::PaymentGateway) implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Live,
    Simulated,
}

/// Payment configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MasumiConfig {
    pub mode: PaymentMode,
    /// Base URL of the payment service, e.g. `http://localhost:3001/api/v1`.
    pub service_url: String,
    pub api_key: String,
    /// `Preprod` or `Mainnet`.
    pub network: String,
    /// Default price per job.
    pub amount: Amount,
    pub unit: String,
    pub seller_vkey: Option<String>,
    pub simulated_confirm_delay: Duration,
}

impl MasumiConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default     |
    /// |----------------------------------|-------------|
    /// | `PAYMENT_MODE`                   | `live`      |
    /// | `MASUMI_PAYMENT_SERVICE_URL`     | required in live mode |
    /// | `MASUMI_API_KEY`                 | required in live mode |
    /// | `MASUMI_NETWORK`                 | `Preprod`   |
    /// | `PAYMENT_AMOUNT`                 | `10000000`  |
    /// | `PAYMENT_UNIT`                   | `lovelace`  |
    /// | `SELLER_VKEY`                    | unset       |
    /// | `SIMULATED_CONFIRM_DELAY_SECS`   | `5`         |
    pub fn from_env() -> Self {
        let mode = match std::env::var("PAYMENT_MODE")
            .unwrap_or_else(|_| "live".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "live" => PaymentMode::Live,
            "simulated" | "test" => PaymentMode::Simulated,
            other => panic!("PAYMENT_MODE must be `live` or `simulated`, got `{other}`"),
        };

        let service_url = std::env::var("MASUMI_PAYMENT_SERVICE_URL").unwrap_or_default();
        let api_key = std::env::var("MASUMI_API_KEY").unwrap_or_default();
        if mode == PaymentMode::Live {
            assert!(
                !service_url.is_empty(),
                "MASUMI_PAYMENT_SERVICE_URL must be set when PAYMENT_MODE=live"
            );
            assert!(
                !api_key.is_empty(),
                "MASUMI_API_KEY must be set when PAYMENT_MODE=live"
            );
        }

        let network = normalize_network(
            &std::env::var("MASUMI_NETWORK").unwrap_or_else(|_| "Preprod".into()),
        );

        let amount: Amount = std::env::var("PAYMENT_AMOUNT")
            .unwrap_or_else(|_| "10000000".into())
            .parse()
            .expect("PAYMENT_AMOUNT must be a valid i64");

        let unit = std::env::var("PAYMENT_UNIT").unwrap_or_else(|_| "lovelace".into());
        let seller_vkey = std::env::var("SELLER_VKEY").ok().filter(|s| !s.is_empty());

        let delay_secs: u64 = std::env::var("SIMULATED_CONFIRM_DELAY_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("SIMULATED_CONFIRM_DELAY_SECS must be a valid u64");

        Self {
            mode,
            service_url: service_url.trim_end_matches('/').to_string(),
            api_key,
            network,
            amount,
            unit,
            seller_vkey,
            simulated_confirm_delay: Duration::from_secs(delay_secs),
        }
    }

    /// Configuration for the simulated gateway with no delay.
    pub fn simulated() -> Self {
        Self {
            mode: PaymentMode::Simulated,
            service_url: String::new(),
            api_key: String::new(),
            network: "Preprod".into(),
            amount: 10_000_000,
            unit: "lovelace".into(),
            seller_vkey: None,
            simulated_confirm_delay: Duration::ZERO,
        }
    }
}

/// The payment service expects `Preprod` / `Mainnet` capitalised.
fn normalize_network(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "mainnet" => "Mainnet".into(),
        _ => "Preprod".into(),
    }
}
