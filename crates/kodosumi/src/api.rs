//! REST client for the Kodosumi HTTP API.
//!
//! Wraps flow listing (`GET /flow`), form retrieval (`GET {flow path}`),
//! launch (`POST {flow path}`) and run status (`GET /outputs/status/{fid}`)
//! using [`reqwest`]. Every call sends the API key as a bearer token.

use async_trait::async_trait;
use flowgate_core::naming::flow_key_from_path;
use flowgate_core::types::Payload;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::KodosumiConfig;
use crate::engine::{DiscoveredFlow, ExecutionEngine, RunState, RunStatus};
use crate::error::EngineError;

/// HTTP client for a single Kodosumi instance.
pub struct KodosumiApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// One page of `GET /flow`.
#[derive(Debug, Deserialize)]
struct FlowPage {
    #[serde(default)]
    items: Vec<FlowItem>,
    /// Cursor for the next page; absent on the last one.
    offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FlowItem {
    url: String,
    summary: Option<String>,
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl KodosumiApi {
    pub fn new(config: &KodosumiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: &KodosumiConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, EngineError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch every page of the flow listing.
    async fn list_flow_items(&self) -> Result<Vec<FlowItem>, EngineError> {
        let mut items = Vec::new();
        let mut query: Vec<(&str, String)> = Vec::new();

        loop {
            let body = self.get_json("/flow", &query).await?;
            let page: FlowPage = serde_json::from_value(body)
                .map_err(|e| EngineError::Malformed(format!("flow listing: {e}")))?;
            let done = page.items.is_empty();
            items.extend(page.items);

            match page.offset {
                Some(Value::String(next)) if !done && !next.is_empty() => {
                    query = vec![("offset", next)];
                }
                Some(Value::Number(next)) if !done => {
                    query = vec![("offset", next.to_string())];
                }
                _ => break,
            }
        }
        Ok(items)
    }

    /// Fetch a flow's input form; `None` on any failure.
    async fn fetch_schema(&self, path: &str) -> Option<Payload> {
        match self.get_json(path, &[]).await {
            Ok(schema) => Some(schema),
            Err(e) => {
                tracing::warn!(flow_path = %path, error = %e, "Failed to fetch flow input schema");
                None
            }
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, or [`EngineError::Rejected`]
    /// with the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value, EngineError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ExecutionEngine for KodosumiApi {
    async fn discover_flows(&self) -> Result<Vec<DiscoveredFlow>, EngineError> {
        let items = self.list_flow_items().await?;
        let schemas = join_all(items.iter().map(|item| self.fetch_schema(&item.url))).await;

        let flows: Vec<DiscoveredFlow> = items
            .into_iter()
            .zip(schemas)
            .filter_map(|(item, schema)| describe_flow(item, schema))
            .collect();

        tracing::debug!(flow_count = flows.len(), "Discovered flows");
        Ok(flows)
    }

    async fn launch(&self, flow_path: &str, input: &Payload) -> Result<String, EngineError> {
        let response = self
            .client
            .post(self.url(flow_path))
            .bearer_auth(&self.api_key)
            .json(input)
            .send()
            .await?;

        let body = Self::parse_response(response).await?;
        run_id_from_launch(&body)
    }

    async fn get_status(&self, run_id: &str) -> Result<RunStatus, EngineError> {
        let body = self
            .get_json(&format!("/outputs/status/{run_id}"), &[])
            .await?;
        parse_run_status(&body)
    }

    async fn get_result(&self, run_id: &str) -> Result<Payload, EngineError> {
        let body = self
            .get_json(&format!("/outputs/status/{run_id}"), &[])
            .await?;
        result_from_status(run_id, &body)
    }
}

fn describe_flow(item: FlowItem, input_schema: Option<Payload>) -> Option<DiscoveredFlow> {
    let key = flow_key_from_path(&item.url)?;
    Some(DiscoveredFlow {
        name: item.summary.unwrap_or_else(|| key.clone()),
        description: item.description.unwrap_or_default(),
        version: item.version.unwrap_or_else(|| "1.0.0".into()),
        author: item.author.unwrap_or_default(),
        tags: item.tags,
        path: item.url,
        key,
        input_schema,
    })
}

/// The launch response carries the run id under `result` (or `fid`).
fn run_id_from_launch(body: &Value) -> Result<String, EngineError> {
    ["result", "fid"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_owned)
        .ok_or_else(|| EngineError::Malformed(format!("launch response without run id: {body}")))
}

fn run_state(status: &str, error: Option<&str>) -> Result<RunState, EngineError> {
    match status.to_ascii_lowercase().as_str() {
        "starting" | "pending" | "queued" => Ok(RunState::Starting),
        "running" | "awaiting" => Ok(RunState::Running),
        "finished" | "completed" => Ok(RunState::Finished),
        "error" | "failed" | "cancelled" | "killed" => Ok(RunState::Failed {
            reason: error
                .filter(|e| !e.is_empty())
                .map(str::to_owned)
                .unwrap_or_else(|| format!("remote run ended with status `{status}`")),
        }),
        other => Err(EngineError::Malformed(format!("unknown run status `{other}`"))),
    }
}

fn parse_run_status(body: &Value) -> Result<RunStatus, EngineError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Malformed(format!("status response without status: {body}")))?;
    let error = body.get("error").and_then(|e| match e {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    });

    Ok(RunStatus {
        state: run_state(status, error)?,
        remote_status: status.to_string(),
        progress: body.get("progress").filter(|p| !p.is_null()).cloned(),
    })
}

/// Extract the final result from a status document.
///
/// `final` may be a JSON document or a JSON-encoded string; plain text is
/// wrapped as `{"output": text}`.
fn result_from_status(run_id: &str, body: &Value) -> Result<Payload, EngineError> {
    let status = parse_run_status(body)?;
    if status.state != RunState::Finished {
        return Err(EngineError::ResultUnavailable {
            run_id: run_id.to_string(),
            status: status.remote_status,
        });
    }

    match body.get("final") {
        None | Some(Value::Null) => Err(EngineError::Malformed(format!(
            "finished run {run_id} has no final result"
        ))),
        Some(Value::String(text)) => Ok(serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({ "output": text }))),
        Some(other) => Ok(other.clone()),
    }
}
