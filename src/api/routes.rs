//! API Routes
//!
//! Configures the Axum router with all shaping endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    add_batch_request_handler, cache_delete_handler, cache_get_handler, cache_limit_handler,
    cache_put_handler, check_rate_limit_handler, create_batch_handler, create_layer_handler,
    create_strategy_handler, fetch_handler, flush_batch_handler, health_handler,
    invalidate_results_handler, layer_get_handler, layer_put_handler, list_layers_handler,
    next_request_handler, prioritize_handler, set_rate_limit_handler, stats_handler,
    strategy_get_handler, strategy_put_handler, warm_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache/:key",
            put(cache_put_handler)
                .get(cache_get_handler)
                .delete(cache_delete_handler),
        )
        .route("/settings/cache-limit", put(cache_limit_handler))
        .route("/warm", post(warm_handler))
        .route("/layers", post(create_layer_handler).get(list_layers_handler))
        .route(
            "/layers/:id/:key",
            put(layer_put_handler).get(layer_get_handler),
        )
        .route("/strategies", post(create_strategy_handler))
        .route(
            "/strategies/:id/:key",
            put(strategy_put_handler).get(strategy_get_handler),
        )
        .route("/results/invalidate", post(invalidate_results_handler))
        .route("/fetch", post(fetch_handler))
        .route("/batches", post(create_batch_handler))
        .route("/batches/:id/requests", post(add_batch_request_handler))
        .route("/batches/:id/flush", post(flush_batch_handler))
        .route("/priority", post(prioritize_handler))
        .route("/priority/next", post(next_request_handler))
        .route("/limits/:identifier", put(set_rate_limit_handler))
        .route("/limits/:identifier/check", post(check_rate_limit_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::noop_sink;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_router(AppState::from_config(&Config::default(), noop_sink()).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cache_get_not_found() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .uri("/cache/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_priority_is_bad_request() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/priority")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"request_id":"r","priority":"urgent"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
