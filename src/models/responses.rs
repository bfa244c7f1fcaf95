//! Response DTOs for the shaping API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::request::{Priority, PriorityItem};

/// Response body for value lookups
#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    pub key: String,
    pub value: Value,
}

impl ValueResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Generic acknowledgement for writes and deletes
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifier handed back by create operations
#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

impl CreatedResponse {
    pub fn new(id: impl ToString) -> Self {
        Self { id: id.to_string() }
    }
}

/// Requests drained from a batch
#[derive(Debug, Clone, Serialize)]
pub struct FlushResponse {
    pub requests: Vec<Value>,
}

/// A dequeued priority item
#[derive(Debug, Clone, Serialize)]
pub struct PriorityItemResponse {
    pub request_id: String,
    pub priority: Priority,
    pub waited_ms: u64,
}

impl From<PriorityItem> for PriorityItemResponse {
    fn from(item: PriorityItem) -> Self {
        Self {
            waited_ms: item.enqueued_at.elapsed().as_millis() as u64,
            request_id: item.request_id,
            priority: item.priority,
        }
    }
}

/// Response body for `POST /priority/next`; `item` is null on an empty queue
#[derive(Debug, Clone, Serialize)]
pub struct NextRequestResponse {
    pub item: Option<PriorityItemResponse>,
    pub remaining: usize,
}

/// Cache counters plus hit rate
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStatsResponse,
    pub layers: CacheStatsResponse,
    pub results: CacheStatsResponse,
    pub queued_requests: usize,
    pub blocked_identifiers: usize,
    /// Upstream fetches currently shared by `POST /fetch` callers
    pub in_flight_requests: usize,
}

/// Response body for `POST /results/invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidatedResponse {
    pub removed: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
