//! Read-Through Fetch
//!
//! Serves results from a [`ResultCache`] and, on a miss, issues the request
//! through a [`RequestDeduplicator`] so concurrent misses for the same
//! request reach the source once. Only successful results are cached.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{ResultCache, ResultLabels, StrategyId};
use crate::error::ShapingError;
use crate::request::{RequestDeduplicator, RequestKey};

// == Read Through ==
/// Cloning yields another handle to the same cache and in-flight registry.
pub struct ReadThrough<V, E> {
    results: Arc<RwLock<ResultCache<V>>>,
    dedup: RequestDeduplicator<V, E>,
}

impl<V, E> Clone for ReadThrough<V, E> {
    fn clone(&self) -> Self {
        Self {
            results: Arc::clone(&self.results),
            dedup: self.dedup.clone(),
        }
    }
}

impl<V, E> fmt::Debug for ReadThrough<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThrough")
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

impl<V, E> ReadThrough<V, E> {
    pub fn new(results: Arc<RwLock<ResultCache<V>>>, dedup: RequestDeduplicator<V, E>) -> Self {
        Self { results, dedup }
    }

    pub fn results(&self) -> &Arc<RwLock<ResultCache<V>>> {
        &self.results
    }

    pub fn deduplicator(&self) -> &RequestDeduplicator<V, E> {
        &self.dedup
    }
}

impl<V, E> ReadThrough<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static + From<ShapingError>,
{
    // == Cached Fetch ==
    /// Returns the result cached for `key` under `strategy_id`, or runs
    /// `fetch` (coalesced with any identical fetch in flight) and caches its
    /// success with `labels`.
    ///
    /// The cache lock is never held while `fetch` runs. An unknown strategy
    /// fails before `fetch` is called.
    pub async fn cached_fetch<F, Fut>(
        &self,
        strategy_id: &StrategyId,
        key: RequestKey,
        labels: ResultLabels,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let cached = self.results.write().await.get(strategy_id, key.as_str())?;
        if let Some(hit) = cached {
            debug!("Read-through hit: {}", key);
            return Ok(hit);
        }

        let value = self.dedup.dedupe(key.clone(), fetch).await?;

        self.results
            .write()
            .await
            .cache_labeled(strategy_id, key.as_str(), value.clone(), labels)?;
        Ok(value)
    }
}
