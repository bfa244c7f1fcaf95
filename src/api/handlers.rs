//! API Handlers
//!
//! HTTP request handlers exposing each shaping component.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::upstream;
use crate::cache::{
    try_warm, BoundedCache, LayerId, LayeredCache, ResultCache, ResultLabels, StrategyId,
    WarmReport,
};
use crate::config::Config;
use crate::error::{ResourceKind, Result, ShapingError};
use crate::events::SharedSink;
use crate::models::{
    validate_key, AddBatchRequest, CreateBatchRequest, CreateLayerRequest, CreateStrategyRequest,
    CreatedResponse, FetchRequest, FlushResponse, HealthResponse, InvalidateRequest,
    InvalidatedResponse, MessageResponse, NextRequestResponse, PrioritizeRequest,
    PutResultRequest, PutValueRequest, SetLimitRequest, SetRateLimitRequest, StatsResponse,
    ValueResponse, WarmRequest,
};
use crate::request::{
    BatchId, BatchStatus, Priority, PriorityQueue, RateDecision, RateLimiter, ReadThrough,
    RequestBatcher, RequestDeduplicator, RequestKey,
};

/// Application state shared across all handlers and background tasks.
///
/// Each component is constructed once here and handed out by reference;
/// nothing is stored in process-wide globals.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RwLock<BoundedCache<Value>>>,
    pub layers: Arc<RwLock<LayeredCache<Value>>>,
    pub results: Arc<RwLock<ResultCache<Value>>>,
    pub batcher: Arc<RwLock<RequestBatcher<Value>>>,
    pub priority: Arc<RwLock<PriorityQueue>>,
    pub limiter: Arc<RwLock<RateLimiter>>,
    /// Read-through over `results`, coalescing identical upstream fetches
    pub fetcher: ReadThrough<Value, ShapingError>,
    pub http: Client,
    /// TTL applied by `PUT /cache/:key` when the body has none
    pub default_ttl: Duration,
}

impl AppState {
    /// Creates a new AppState from configuration, routing events to `sink`.
    ///
    /// Fails only if the upstream HTTP client cannot be built.
    pub fn from_config(config: &Config, sink: SharedSink) -> Result<Self> {
        let results = Arc::new(RwLock::new(ResultCache::new()));
        let fetcher = ReadThrough::new(
            results.clone(),
            RequestDeduplicator::with_events(sink.clone()),
        );

        Ok(Self {
            cache: Arc::new(RwLock::new(
                BoundedCache::new(config.cache_limit).with_events(sink.clone()),
            )),
            layers: Arc::new(RwLock::new(
                LayeredCache::new(config.layer_capacity).with_events(sink.clone()),
            )),
            results,
            batcher: Arc::new(RwLock::new(
                RequestBatcher::new().with_events(sink.clone()),
            )),
            priority: Arc::new(RwLock::new(PriorityQueue::new())),
            limiter: Arc::new(RwLock::new(
                RateLimiter::new(config.rate_limit_allow_by_default).with_events(sink),
            )),
            fetcher,
            http: upstream::build_client(config.upstream_timeout())?,
            default_ttl: config.default_ttl(),
        })
    }
}

fn check_key(key: &str) -> Result<()> {
    match validate_key(key) {
        Some(msg) => Err(ShapingError::InvalidArgument(msg)),
        None => Ok(()),
    }
}

// == Bounded Cache ==

/// Handler for PUT /cache/:key
pub async fn cache_put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutValueRequest>,
) -> Result<Json<MessageResponse>> {
    check_key(&key)?;
    let ttl = req
        .ttl_ms
        .map(Duration::from_millis)
        .unwrap_or(state.default_ttl);

    let mut cache = state.cache.write().await;
    cache.put_with_ttl(key.clone(), req.value, ttl);

    Ok(Json(MessageResponse::new(format!(
        "Key '{}' set successfully",
        key
    ))))
}

/// Handler for GET /cache/:key
pub async fn cache_get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>> {
    // Write lock: hits update recency and stats
    let mut cache = state.cache.write().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| ShapingError::not_found(ResourceKind::Key, key.as_str()))?;

    Ok(Json(ValueResponse::new(key, value)))
}

/// Handler for DELETE /cache/:key
pub async fn cache_delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.delete(&key) {
        return Err(ShapingError::not_found(ResourceKind::Key, key));
    }

    Ok(Json(MessageResponse::new(format!(
        "Key '{}' deleted successfully",
        key
    ))))
}

/// Handler for POST /warm
///
/// Fetches `{base_url}/{key}` for every key not already in the bounded
/// cache. Stops at the first failing fetch.
pub async fn warm_handler(
    State(state): State<AppState>,
    Json(req): Json<WarmRequest>,
) -> Result<Json<WarmReport>> {
    for key in &req.keys {
        check_key(key)?;
    }
    let base = req.base_url.trim_end_matches('/').to_string();
    let client = state.http.clone();

    let mut cache = state.cache.write().await;
    let report = try_warm(&mut *cache, req.keys, |key| {
        upstream::fetch_json(client.clone(), Method::GET, format!("{}/{}", base, key), None)
    })
    .await?;

    Ok(Json(report))
}

/// Handler for PUT /settings/cache-limit
pub async fn cache_limit_handler(
    State(state): State<AppState>,
    Json(req): Json<SetLimitRequest>,
) -> Json<MessageResponse> {
    let mut cache = state.cache.write().await;
    cache.set_limit(req.limit);

    Json(MessageResponse::new(format!(
        "Cache limit set to {}",
        cache.limit()
    )))
}

// == Layer Router ==

/// Handler for POST /layers
pub async fn create_layer_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateLayerRequest>,
) -> Json<CreatedResponse> {
    let mut layers = state.layers.write().await;
    let id = layers.add_layer(req.name, req.level, Duration::from_millis(req.ttl_ms));
    Json(CreatedResponse::new(id))
}

/// Handler for GET /layers
pub async fn list_layers_handler(State(state): State<AppState>) -> Json<Value> {
    let layers = state.layers.read().await;
    Json(serde_json::json!({ "layers": layers.layers() }))
}

/// Handler for PUT /layers/:id/:key
pub async fn layer_put_handler(
    State(state): State<AppState>,
    Path((layer_id, key)): Path<(String, String)>,
    Json(req): Json<PutValueRequest>,
) -> Result<Json<MessageResponse>> {
    check_key(&key)?;
    let layer_id = LayerId::from(layer_id);

    let mut layers = state.layers.write().await;
    layers.set(key.clone(), req.value, &layer_id)?;

    Ok(Json(MessageResponse::new(format!(
        "Key '{}' set in layer {}",
        key, layer_id
    ))))
}

/// Handler for GET /layers/:id/:key
pub async fn layer_get_handler(
    State(state): State<AppState>,
    Path((layer_id, key)): Path<(String, String)>,
) -> Result<Json<ValueResponse>> {
    let layer_id = LayerId::from(layer_id);

    let mut layers = state.layers.write().await;
    let value = layers
        .get(&key, &layer_id)?
        .ok_or_else(|| ShapingError::not_found(ResourceKind::Key, key.as_str()))?;

    Ok(Json(ValueResponse::new(key, value)))
}

// == Result Cache ==

/// Handler for POST /strategies
pub async fn create_strategy_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateStrategyRequest>,
) -> Json<CreatedResponse> {
    let mut results = state.results.write().await;
    let id = results.define_strategy(
        req.name,
        Duration::from_millis(req.ttl_ms),
        req.eviction_policy,
    );
    Json(CreatedResponse::new(id))
}

/// Handler for PUT /strategies/:id/:key
pub async fn strategy_put_handler(
    State(state): State<AppState>,
    Path((strategy_id, key)): Path<(String, String)>,
    Json(req): Json<PutResultRequest>,
) -> Result<Json<MessageResponse>> {
    check_key(&key)?;
    let strategy_id = StrategyId::from(strategy_id);
    let labels = labels_from(req.tags, req.namespace);

    let mut results = state.results.write().await;
    results.cache_labeled(&strategy_id, key.clone(), req.value, labels)?;

    Ok(Json(MessageResponse::new(format!(
        "Result '{}' cached under {}",
        key, strategy_id
    ))))
}

/// Handler for GET /strategies/:id/:key
pub async fn strategy_get_handler(
    State(state): State<AppState>,
    Path((strategy_id, key)): Path<(String, String)>,
) -> Result<Json<ValueResponse>> {
    let strategy_id = StrategyId::from(strategy_id);

    let mut results = state.results.write().await;
    let value = results
        .get(&strategy_id, &key)?
        .ok_or_else(|| ShapingError::not_found(ResourceKind::Key, key.as_str()))?;

    Ok(Json(ValueResponse::new(key, value)))
}

fn labels_from(tags: Vec<String>, namespace: Option<String>) -> ResultLabels {
    let mut labels = tags
        .into_iter()
        .fold(ResultLabels::new(), |labels, tag| labels.tag(tag));
    if let Some(namespace) = namespace {
        labels = labels.namespace(namespace);
    }
    labels
}

/// Handler for POST /results/invalidate
///
/// Applies every criterion in the body and reports the total removed.
pub async fn invalidate_results_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidatedResponse>> {
    if req.is_empty() {
        return Err(ShapingError::InvalidArgument(
            "expected at least one of tags, pattern or namespace".to_string(),
        ));
    }

    let mut results = state.results.write().await;
    let mut removed = 0;
    if let Some(pattern) = &req.pattern {
        removed += results.invalidate_by_pattern(pattern)?;
    }
    if !req.tags.is_empty() {
        removed += results.invalidate_by_tags(req.tags.as_slice());
    }
    if let Some(namespace) = &req.namespace {
        removed += results.invalidate_namespace(namespace);
    }

    Ok(Json(InvalidatedResponse { removed }))
}

/// Handler for POST /fetch
///
/// Read-through: answers from the result cache, otherwise calls the upstream
/// once for all identical concurrent requests and caches the JSON response.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<ValueResponse>> {
    let method = Method::from_bytes(req.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ShapingError::InvalidArgument(format!("invalid method: {}", req.method)))?;
    let strategy_id = StrategyId::from(req.strategy_id);
    let body_text = req.body.as_ref().map(Value::to_string);
    let key = RequestKey::new(&req.url, method.as_str(), body_text.as_deref());
    let labels = labels_from(req.tags, req.namespace).url(req.url.clone());

    let client = state.http.clone();
    let url = req.url.clone();
    let body = req.body;
    let value = state
        .fetcher
        .cached_fetch(&strategy_id, key, labels, move || {
            upstream::fetch_json(client, method, url, body)
        })
        .await?;

    Ok(Json(ValueResponse::new(req.url, value)))
}

// == Batching ==

/// Handler for POST /batches
pub async fn create_batch_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<Json<CreatedResponse>> {
    let mut batcher = state.batcher.write().await;
    let id = batcher.create_batch(req.name, req.max_size, Duration::from_millis(req.timeout_ms))?;
    Ok(Json(CreatedResponse::new(id)))
}

/// Handler for POST /batches/:id/requests
pub async fn add_batch_request_handler(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    Json(req): Json<AddBatchRequest>,
) -> Result<Json<BatchStatus<Value>>> {
    let batch_id = BatchId::from(batch_id);
    let mut batcher = state.batcher.write().await;
    Ok(Json(batcher.add_request(&batch_id, req.request)?))
}

/// Handler for POST /batches/:id/flush
pub async fn flush_batch_handler(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<FlushResponse>> {
    let batch_id = BatchId::from(batch_id);
    let mut batcher = state.batcher.write().await;
    let requests = batcher.flush(&batch_id)?;
    Ok(Json(FlushResponse { requests }))
}

// == Prioritization ==

/// Handler for POST /priority
pub async fn prioritize_handler(
    State(state): State<AppState>,
    Json(req): Json<PrioritizeRequest>,
) -> Result<Json<MessageResponse>> {
    let priority: Priority = req.priority.parse()?;

    let mut queue = state.priority.write().await;
    queue.prioritize_request(req.request_id.clone(), priority);

    Ok(Json(MessageResponse::new(format!(
        "Request '{}' queued with priority {}",
        req.request_id, priority
    ))))
}

/// Handler for POST /priority/next
pub async fn next_request_handler(State(state): State<AppState>) -> Json<NextRequestResponse> {
    let mut queue = state.priority.write().await;
    let item = queue.get_next_request().map(Into::into);

    Json(NextRequestResponse {
        item,
        remaining: queue.len(),
    })
}

// == Rate Limiting ==

/// Handler for PUT /limits/:identifier
pub async fn set_rate_limit_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<SetRateLimitRequest>,
) -> Json<MessageResponse> {
    let mut limiter = state.limiter.write().await;
    limiter.set_rate_limit(
        identifier.clone(),
        req.max_requests,
        Duration::from_millis(req.window_ms),
    );

    Json(MessageResponse::new(format!(
        "Rate limit set for '{}'",
        identifier
    )))
}

/// Handler for POST /limits/:identifier/check
///
/// Denials map to 429 Too Many Requests.
pub async fn check_rate_limit_handler(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<RateDecision>> {
    let mut limiter = state.limiter.write().await;
    let decision = limiter.check_rate_limit(&identifier);

    if decision.allowed {
        Ok(Json(decision))
    } else {
        Err(ShapingError::RateLimited(format!(
            "{}: {}",
            identifier,
            decision.reason.unwrap_or_default()
        )))
    }
}

// == Stats & Health ==

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await.stats();
    let layers = state.layers.read().await.stats();
    let results = state.results.read().await.stats();
    let queued_requests = state.priority.read().await.len();
    let blocked_identifiers = state.limiter.read().await.blocked_count();
    let in_flight_requests = state.fetcher.deduplicator().in_flight();

    Json(StatsResponse {
        cache: cache.into(),
        layers: layers.into(),
        results: results.into(),
        queued_requests,
        blocked_identifiers,
        in_flight_requests,
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
