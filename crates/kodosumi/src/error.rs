/// Errors from the execution engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("Engine rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A 2xx response whose body could not be interpreted.
    #[error("Malformed engine response: {0}")]
    Malformed(String),

    /// The result was requested before the run finished.
    #[error("Result for run {run_id} is not available yet (status `{status}`)")]
    ResultUnavailable { run_id: String, status: String },
}
