//! Upstream HTTP Client
//!
//! Thin wrapper over `reqwest` used by the read-through and warm-up
//! endpoints. Every failure becomes [`ShapingError::Upstream`] so callers
//! see a 502 rather than a 500.

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ShapingError};

/// Builds the shared client. Proxies from the environment are ignored.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| ShapingError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Sends one request and decodes a JSON response body.
///
/// Takes owned arguments so the returned future is `'static` and can be
/// shared between coalesced callers.
pub async fn fetch_json(
    client: Client,
    method: Method,
    url: String,
    body: Option<Value>,
) -> Result<Value> {
    debug!("Upstream {} {}", method, url);

    let mut request = client.request(method, url.as_str());
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ShapingError::Upstream(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ShapingError::Upstream(format!("{} returned {}", url, status)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ShapingError::Upstream(format!("{}: invalid JSON body: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_upstream_is_upstream_error() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        // Port 9 on loopback has no listener in the test environment
        let result = fetch_json(client, Method::GET, "http://127.0.0.1:9/x".into(), None).await;
        assert!(matches!(result, Err(ShapingError::Upstream(msg)) if msg.contains("127.0.0.1:9")));
    }

    #[tokio::test]
    async fn test_invalid_url_is_upstream_error() {
        let client = build_client(Duration::from_millis(500)).unwrap();
        let result = fetch_json(client, Method::GET, "not a url".into(), None).await;
        assert!(matches!(result, Err(ShapingError::Upstream(_))));
    }
}
