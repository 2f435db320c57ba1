//! RPC Client Module - JSON-RPC plumbing shared by the chain analyzers
//!
//! 1. One gzip-enabled `reqwest::Client` per analyzer with our User-Agent
//! 2. Single-attempt calls; retries and timeouts belong to `utils::retry`
//! 3. JSON-RPC error objects surface as typed `RpcError` inside `eyre::Report`
//!    so analyzers can tell "not found" from a broken provider
//! 4. URLs are masked before logging

use eyre::{eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::utils::constants::{DEFAULT_PROVIDER_TIMEOUT_MS, USER_AGENT as USER_AGENT_CONST};

/// Build HTTP client with custom headers (gzip on, hard ceiling on request time)
pub fn build_http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

    reqwest::Client::builder()
        .default_headers(headers)
        // The retry wrapper bounds each attempt; this only catches runaway bodies
        .timeout(Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS * 4))
        .gzip(true)
        .build()
        .map_err(|e| eyre!("Failed to build HTTP client: {}", e))
}

/// Hide credentials embedded in a provider URL
pub fn mask_url(url: &str) -> String {
    let base = match url.split_once('?') {
        Some((base, _)) => format!("{}?***", base),
        None => url.to_string(),
    };
    match base.split_once("/v2/") {
        Some((head, _)) => format!("{}/v2/***HIDDEN***", head),
        None => base,
    }
}

/// JSON-RPC 2.0 client bound to one endpoint
#[derive(Clone)]
pub struct JsonRpcClient {
    url: String,
    client: reqwest::Client,
    /// Network label for logging
    network: &'static str,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, network: &'static str, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            network,
        }
    }

    /// Execute a single JSON-RPC call.
    ///
    /// `Ok(None)` means the node answered with a `null` result.
    pub async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!(network = self.network, method, url = %self.masked_url(), "📡 JSON-RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| eyre!("Request failed: {}", e))?;

        let status = response.status();
        if status == 429 {
            return Err(eyre!("Rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(eyre!("HTTP error: {}", status));
        }

        let json: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to parse response: {}", e))?;

        if let Some(error) = json.error {
            return Err(eyre::Report::new(error));
        }

        Ok(json.result)
    }

    /// RPC URL (masked for logging)
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }

    pub fn network(&self) -> &'static str {
        self.network
    }
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Rate limit (HTTP 429 equivalent or code -32005)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }

    /// Method not found (code -32601)
    pub fn is_method_not_found(&self) -> bool {
        self.code == -32601
    }

    /// Invalid params (code -32602); nodes use it for unknown objects
    pub fn is_invalid_params(&self) -> bool {
        self.code == -32602
    }

    /// Answer meaning "the object does not exist" rather than "the node is broken"
    pub fn is_not_found(&self) -> bool {
        let message = self.message.to_lowercase();
        self.is_invalid_params()
            || message.contains("does not exist")
            || message.contains("not found")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error: {} (code: {})", self.message, self.code)
    }
}

impl std::error::Error for RpcError {}

/// True when `err` wraps an `RpcError` that only says the object is missing
pub fn is_not_found(err: &eyre::Report) -> bool {
    err.downcast_ref::<RpcError>()
        .map(RpcError::is_not_found)
        .unwrap_or(false)
}
