//! Shared HTTP plumbing for the REST and JSON-RPC clients

use crate::error::{EvalError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Build a client sending `Accept: application/json` on every request
pub fn build_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled for this client");
    }

    let client = Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?;

    Ok(client)
}

/// Statuses the orchestrator uses for success
pub fn is_accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 202)
}

/// Parse a base URL, making sure relative joins keep its path
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| EvalError::invalid_config(format!("invalid URL '{}': {}", raw, e)))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Join path segments onto a base URL ending in `/`
pub fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| EvalError::invalid_config(format!("invalid path '{}': {}", path, e)))
}

/// Decode a JSON body, reporting malformed data as a provisioning error
pub fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| EvalError::provisioning(format!("malformed {} response: {}", what, e)))
}
