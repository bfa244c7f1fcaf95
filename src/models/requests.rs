//! Request DTOs for the shaping API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;

/// Validates a cache key taken from a URL path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Body for `PUT /cache/:key` and `PUT /layers/:id/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct PutValueRequest {
    /// The value to store
    pub value: Value,
    /// Optional TTL in milliseconds, only honoured by `PUT /cache/:key`
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

/// Body for `PUT /strategies/:id/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct PutResultRequest {
    pub value: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Body for `POST /fetch`
#[derive(Debug, Clone, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// JSON body forwarded upstream; part of the coalescing key
    #[serde(default)]
    pub body: Option<Value>,
    /// Result-cache strategy whose TTL applies to the response
    pub strategy_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Body for `POST /warm`
#[derive(Debug, Clone, Deserialize)]
pub struct WarmRequest {
    /// Each key is fetched from `{base_url}/{key}`
    pub base_url: String,
    pub keys: Vec<String>,
}

/// Body for `POST /results/invalidate`. Every criterion given is applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl InvalidateRequest {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.pattern.is_none() && self.namespace.is_none()
    }
}

/// Body for `PUT /settings/cache-limit`
#[derive(Debug, Clone, Deserialize)]
pub struct SetLimitRequest {
    pub limit: usize,
}

/// Body for `POST /layers`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLayerRequest {
    pub name: String,
    #[serde(default)]
    pub level: i32,
    pub ttl_ms: u64,
}

/// Body for `POST /strategies`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStrategyRequest {
    pub name: String,
    pub ttl_ms: u64,
    #[serde(default = "default_eviction_policy")]
    pub eviction_policy: String,
}

fn default_eviction_policy() -> String {
    "lru".to_string()
}

/// Body for `POST /batches`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBatchRequest {
    pub name: String,
    pub max_size: usize,
    #[serde(default)]
    pub timeout_ms: u64,
}

/// Body for `POST /batches/:id/requests`
#[derive(Debug, Clone, Deserialize)]
pub struct AddBatchRequest {
    pub request: Value,
}

/// Body for `POST /priority`
///
/// `priority` stays a string so an unknown level surfaces as a 400 with the
/// accepted values rather than a generic decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct PrioritizeRequest {
    pub request_id: String,
    pub priority: String,
}

/// Body for `PUT /limits/:identifier`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRateLimitRequest {
    pub max_requests: usize,
    pub window_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_value_deserialize() {
        let json = r#"{"value": {"user": "alice"}}"#;
        let req: PutValueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value["user"], "alice");
        assert!(req.ttl_ms.is_none());
    }

    #[test]
    fn test_fetch_request_defaults() {
        let json = r#"{"url": "http://origin/items", "strategy_id": "s"}"#;
        let req: FetchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, "GET");
        assert!(req.body.is_none());
        assert!(req.tags.is_empty());
    }

    #[test]
    fn test_invalidate_request_empty() {
        let req: InvalidateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.is_empty());

        let req: InvalidateRequest = serde_json::from_str(r#"{"tags": ["a"]}"#).unwrap();
        assert!(!req.is_empty());
    }

    #[test]
    fn test_create_strategy_default_policy() {
        let json = r#"{"name": "model", "ttl_ms": 100}"#;
        let req: CreateStrategyRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.eviction_policy, "lru");
    }

    #[test]
    fn test_create_layer_default_level() {
        let json = r#"{"name": "hot", "ttl_ms": 1000}"#;
        let req: CreateLayerRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.level, 0);
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("").is_some());
        assert!(validate_key(&"x".repeat(MAX_KEY_LENGTH + 1)).is_some());
        assert!(validate_key("valid_key").is_none());
    }
}
