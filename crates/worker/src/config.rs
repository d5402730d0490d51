use std::time::Duration;

/// Coordinator configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub payment_poll_interval: Duration,
    pub execution_poll_interval: Duration,
    pub flow_refresh_interval: Duration,
    /// Jobs processed concurrently within one cycle.
    pub max_concurrent_checks: usize,
    /// Upper bound on every payment gateway / engine call.
    pub call_timeout: Duration,
    /// How long a record may sit in `payment_confirmed` before it is
    /// treated as orphaned.
    pub launch_grace: Duration,
    /// Submit-by window for jobs created without payment.
    pub unpaid_submit_window: Duration,
    pub allow_unpaid_jobs: bool,
    /// Per-task wait on shutdown.
    pub shutdown_grace: Duration,
    /// Rows read per store query when a cycle selects its records. Every
    /// matching record is still examined each cycle.
    pub page_size: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            payment_poll_interval: Duration::from_secs(30),
            execution_poll_interval: Duration::from_secs(10),
            flow_refresh_interval: Duration::from_secs(300),
            max_concurrent_checks: 10,
            call_timeout: Duration::from_secs(30),
            launch_grace: Duration::from_secs(300),
            unpaid_submit_window: Duration::from_secs(86_400),
            allow_unpaid_jobs: false,
            shutdown_grace: Duration::from_secs(30),
            page_size: 500,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default  |
    /// |--------------------------------|----------|
    /// | `PAYMENT_POLL_INTERVAL_SECS`   | `30`     |
    /// | `EXECUTION_POLL_INTERVAL_SECS` | `10`     |
    /// | `FLOW_REFRESH_INTERVAL_SECS`   | `300`    |
    /// | `MAX_CONCURRENT_CHECKS`        | `10`     |
    /// | `CALL_TIMEOUT_SECS`            | `30`     |
    /// | `LAUNCH_GRACE_SECS`            | `300`    |
    /// | `UNPAID_SUBMIT_WINDOW_SECS`    | `86400`  |
    /// | `ALLOW_UNPAID_JOBS`            | `false`  |
    /// | `SHUTDOWN_GRACE_SECS`          | `30`     |
    ///
    /// Poll intervals, `CALL_TIMEOUT_SECS` and `LAUNCH_GRACE_SECS` must be
    /// greater than zero.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_concurrent_checks: usize = std::env::var("MAX_CONCURRENT_CHECKS")
            .unwrap_or_else(|_| defaults.max_concurrent_checks.to_string())
            .parse()
            .expect("MAX_CONCURRENT_CHECKS must be a valid usize");

        let allow_unpaid_jobs = std::env::var("ALLOW_UNPAID_JOBS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.allow_unpaid_jobs);

        Self {
            payment_poll_interval: nonzero_secs_var(
                "PAYMENT_POLL_INTERVAL_SECS",
                defaults.payment_poll_interval,
            ),
            execution_poll_interval: nonzero_secs_var(
                "EXECUTION_POLL_INTERVAL_SECS",
                defaults.execution_poll_interval,
            ),
            flow_refresh_interval: nonzero_secs_var(
                "FLOW_REFRESH_INTERVAL_SECS",
                defaults.flow_refresh_interval,
            ),
            max_concurrent_checks: max_concurrent_checks.max(1),
            call_timeout: nonzero_secs_var("CALL_TIMEOUT_SECS", defaults.call_timeout),
            launch_grace: nonzero_secs_var("LAUNCH_GRACE_SECS", defaults.launch_grace),
            unpaid_submit_window: secs_var(
                "UNPAID_SUBMIT_WINDOW_SECS",
                defaults.unpaid_submit_window,
            ),
            allow_unpaid_jobs,
            shutdown_grace: secs_var("SHUTDOWN_GRACE_SECS", defaults.shutdown_grace),
            page_size: defaults.page_size,
        }
    }
}

fn secs_var(name: &str, default: Duration) -> Duration {
    parse_secs(name, std::env::var(name).ok().as_deref(), default)
}

/// Like [`secs_var`], but zero fails at startup.
fn nonzero_secs_var(name: &str, default: Duration) -> Duration {
    require_nonzero(name, secs_var(name, default))
}

fn parse_secs(name: &str, raw: Option<&str>, default: Duration) -> Duration {
    match raw {
        Some(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .unwrap_or_else(|_| panic!("{name} must be a valid u64"));
            Duration::from_secs(secs)
        }
        None => default,
    }
}

fn require_nonzero(name: &str, value: Duration) -> Duration {
    assert!(!value.is_zero(), "{name} must be greater than zero");
    value
}
