//! Flow key derivation.
//!
//! The execution engine addresses flows by URL path (e.g. `/-/agents/research`);
//! routes and configuration refer to them by a path-safe key.

/// Derive a flow key from a remote flow path.
///
/// Strips the leading `/` and replaces the remaining `/` with `_`.
/// Returns `None` when nothing is left.
///
/// # Examples
///
/// ```
/// use flowgate_core::naming::flow_key_from_path;
///
/// assert_eq!(flow_key_from_path("/-/agents/research").as_deref(), Some("-_agents_research"));
/// assert_eq!(flow_key_from_path("summarize").as_deref(), Some("summarize"));
/// assert_eq!(flow_key_from_path("/"), None);
/// ```
pub fn flow_key_from_path(path: &str) -> Option<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace('/', "_"))
}
