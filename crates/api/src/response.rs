//! Shared response envelope for the non-MIP-003 routes.
//!
//! Admin, flow and job routes answer with `{ "data": ... }`. The MIP-003
//! routes return their documents unwrapped.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
