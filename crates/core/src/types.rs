/// Jobs are keyed by a random UUID so that ids handed to purchasers are not guessable.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque structured document for flow inputs and results.
///
/// `serde_json` is built without `preserve_order`, so object keys are kept
/// in sorted order and serialization is canonical.
pub type Payload = serde_json::Value;

/// Payment amounts are integer quantities of the smallest unit (e.g. lovelace).
pub type Amount = i64;
