//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from the
//! bounded cache, the layer router and the result cache.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::AppState;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Each cache is locked on its own, one after the other, so a sweep never
/// holds more than one write lock at a time.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {}ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache_removed = state.cache.write().await.sweep_expired();
            let layer_removed = state.layers.write().await.sweep_expired();
            let result_removed = state.results.write().await.sweep_expired();

            let removed = cache_removed + layer_removed + result_removed;
            if removed > 0 {
                info!(
                    "Expiry sweep: removed {} entries (cache={}, layers={}, results={})",
                    removed, cache_removed, layer_removed, result_removed
                );
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::noop_sink;
    use serde_json::json;

    fn test_state() -> AppState {
        AppState::from_config(&Config::default(), noop_sink()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let state = test_state();

        state
            .cache
            .write()
            .await
            .put_with_ttl("expire_soon", json!("value"), Duration::from_millis(100));
        let layer = state
            .layers
            .write()
            .await
            .add_layer("hot", 1, Duration::from_millis(100));
        state
            .layers
            .write()
            .await
            .set("k", json!(1), &layer)
            .unwrap();
        let strategy = state
            .results
            .write()
            .await
            .define_strategy("s", Duration::from_secs(3600), "lru");
        state
            .results
            .write()
            .await
            .cache_result(&strategy, "keep", json!(2))
            .unwrap();

        let handle = spawn_cleanup_task(state.clone(), Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(state.cache.read().await.is_empty());
        assert_eq!(state.layers.read().await.stats().total_entries, 0);
        assert_eq!(state.results.read().await.stats().total_entries, 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let state = test_state();
        state
            .cache
            .write()
            .await
            .put_with_ttl("long_lived", json!("value"), Duration::from_secs(3600));

        let handle = spawn_cleanup_task(state.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(
            state.cache.write().await.get("long_lived"),
            Some(json!("value"))
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(test_state(), Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
