//! SHA-256 digests for payment integrity checks.
//!
//! The payment processor expects the input hash when a payment request is
//! created and a result hash when the result is submitted.

use sha2::{Digest, Sha256};

use crate::types::Payload;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Hash of a job's input document.
///
/// Object keys serialize in sorted order, so two documents with the same
/// content always hash the same regardless of how they were built.
pub fn input_hash(input: &Payload) -> String {
    sha256_hex(input.to_string().as_bytes())
}

/// Hash reported to the payment processor once a job has a result.
///
/// Computed over the textual output followed by the purchaser identifier.
pub fn result_hash(output: &str, identifier_from_purchaser: &str) -> String {
    sha256_hex(format!("{output}{identifier_from_purchaser}").as_bytes())
}

/// Extract the textual output of a result document.
///
/// Flows conventionally place their answer under `output`, `result` or
/// `content`; anything else is rendered as compact JSON.
pub fn result_text(result: &Payload) -> String {
    for field in ["output", "result", "content"] {
        match result.get(field) {
            Some(Payload::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    match result {
        Payload::String(s) => s.clone(),
        other => other.to_string(),
    }
}
