/// Errors from the payment gateway layer.
///
/// Returned from `request_payment` any variant is fatal for that
/// submission. Returned from `check_payment_status` every variant is
/// retryable on the next cycle.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Payment service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The payment service returned a non-2xx status code.
    #[error("Payment service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A 2xx response whose body could not be interpreted.
    #[error("Malformed payment service response: {0}")]
    Malformed(String),
}
