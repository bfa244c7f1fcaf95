//! Cache Warm-Up Driver
//!
//! Populates a bounded cache from a source of truth ahead of traffic. Keys
//! are fetched one at a time, in input order, so the source never sees more
//! than one warm-up request at once.

use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{BoundedCache, RecencyOrder};

/// Outcome of a [`try_warm`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    /// Keys fetched and stored
    pub fetched: usize,
    /// Keys skipped because they were already cached
    pub skipped: usize,
}

// == Warm ==
/// Fetches and stores every key not already cached. Always returns `true`.
///
/// A key counts as cached when a normal lookup finds it, and that lookup
/// marks it most recently used, so later insertions from the same run evict
/// other entries first. The cache is borrowed mutably for the whole run, so
/// two warm-ups can never interleave on the same cache.
pub async fn warm<V, O, I, K, F, Fut>(
    cache: &mut BoundedCache<V, O>,
    keys: I,
    mut fetcher: F,
) -> bool
where
    O: RecencyOrder,
    I: IntoIterator<Item = K>,
    K: Into<String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = V>,
{
    let mut fetched = 0usize;
    for key in keys {
        let key = key.into();
        if cache.get_ref(&key).is_some() {
            continue;
        }
        let value = fetcher(key.clone()).await;
        cache.put(key, value);
        fetched += 1;
    }
    info!("Cache warm-up complete: fetched {} keys", fetched);
    true
}

// == Try Warm ==
/// Like [`warm`] but with a fallible fetcher. Stops at the first failure and
/// returns it; keys stored before the failure stay cached.
pub async fn try_warm<V, O, I, K, F, Fut, E>(
    cache: &mut BoundedCache<V, O>,
    keys: I,
    mut fetcher: F,
) -> Result<WarmReport, E>
where
    O: RecencyOrder,
    I: IntoIterator<Item = K>,
    K: Into<String>,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<V, E>>,
    E: std::fmt::Display,
{
    let mut report = WarmReport::default();
    for key in keys {
        let key = key.into();
        if cache.get_ref(&key).is_some() {
            report.skipped += 1;
            continue;
        }
        match fetcher(key.clone()).await {
            Ok(value) => {
                cache.put(key, value);
                report.fetched += 1;
            }
            Err(err) => {
                warn!("Cache warm-up failed at key {}: {}", key, err);
                return Err(err);
            }
        }
    }
    debug!(
        "Cache warm-up: fetched={}, skipped={}",
        report.fetched, report.skipped
    );
    Ok(report)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_warm_skips_cached_keys() {
        let mut cache: BoundedCache<String> = BoundedCache::new(10);
        cache.put("b", "cached".to_string());

        let calls = RefCell::new(Vec::new());
        let done = warm(&mut cache, ["a", "b", "c"], |key| {
            calls.borrow_mut().push(key.clone());
            async move { format!("fetched-{}", key) }
        })
        .await;

        assert!(done);
        assert_eq!(*calls.borrow(), vec!["a", "c"]);
        assert_eq!(cache.get("a"), Some("fetched-a".to_string()));
        assert_eq!(cache.get("b"), Some("cached".to_string()));
        assert_eq!(cache.get("c"), Some("fetched-c".to_string()));
    }

    #[tokio::test]
    async fn test_warm_keeps_requested_keys_in_full_cache() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);

        warm(&mut cache, ["a", "c"], |_| async { 3 }).await;

        assert_eq!(cache.keys(), vec!["a", "c"]);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_try_warm_keeps_requested_keys_in_full_cache() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);

        let report = try_warm(&mut cache, ["a", "c"], |_| async { Ok::<_, String>(3) })
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(cache.keys(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_warm_sequential_order() {
        let mut cache: BoundedCache<usize> = BoundedCache::new(10);
        let order = RefCell::new(Vec::new());

        warm(&mut cache, vec!["x", "y", "z"], |key| {
            order.borrow_mut().push(key);
            let n = order.borrow().len();
            async move {
                tokio::task::yield_now().await;
                n
            }
        })
        .await;

        assert_eq!(*order.borrow(), vec!["x", "y", "z"]);
        assert_eq!(cache.keys(), vec!["x", "y", "z"]);
        assert_eq!(cache.get("z"), Some(3));
    }

    #[tokio::test]
    async fn test_warm_duplicate_keys_fetched_once() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(10);
        let calls = RefCell::new(0);

        warm(&mut cache, ["k", "k", "k"], |_| {
            *calls.borrow_mut() += 1;
            async { 7 }
        })
        .await;

        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_try_warm_reports_counts() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(10);
        cache.put("a", 1);

        let report = try_warm(&mut cache, ["a", "b", "c"], |_| async { Ok::<_, String>(2) })
            .await
            .unwrap();

        assert_eq!(
            report,
            WarmReport {
                fetched: 2,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_try_warm_stops_on_failure() {
        let mut cache: BoundedCache<i32> = BoundedCache::new(10);

        let result = try_warm(&mut cache, ["a", "bad", "c"], |key| async move {
            if key == "bad" {
                Err(format!("source unavailable for {}", key))
            } else {
                Ok(1)
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "source unavailable for bad");
        assert!(cache.contains("a"));
        assert!(!cache.contains("c"));
    }
}
