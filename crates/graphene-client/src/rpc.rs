//! JSON-RPC 2.0 transport for the condenser API

use crate::error::ClientError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

const API_NAMESPACE: &str = "condenser_api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Call `condenser_api.<method>` with positional `params`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = format!("{API_NAMESPACE}.{method}");
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(url = %self.url, method = %method, id, "RPC request");

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Transport(format!("{method}: HTTP {status}")));
        }

        let envelope: RpcResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("{method}: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = envelope
            .result
            .ok_or_else(|| ClientError::Decode(format!("{method}: response has no result")))?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(format!("{method}: {e}")))
    }
}
