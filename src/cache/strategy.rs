//! TTL-Keyed Result Cache
//!
//! Caches computed results under named strategies. Each strategy carries a
//! TTL and an eviction policy name; only the TTL is enforced, the policy
//! name is kept as metadata for callers.
//!
//! Results may be labelled with tags, a namespace and a source URL, which
//! allows invalidating groups of results across every strategy at once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheStats};
use crate::error::{ResourceKind, Result, ShapingError};

// == Strategy Id ==
/// Opaque identifier returned by [`ResultCache::define_strategy`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    fn generate() -> Self {
        Self(format!("strategy_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StrategyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for StrategyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyInfo {
    pub id: StrategyId,
    pub name: String,
    pub ttl_ms: u64,
    pub eviction_policy: String,
}

/// Namespace used when a result is cached without one.
pub const DEFAULT_NAMESPACE: &str = "default";

// == Result Labels ==
/// Grouping labels attached to a cached result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultLabels {
    pub tags: Vec<String>,
    pub namespace: Option<String>,
    /// Source URL matched by [`ResultCache::invalidate_by_pattern`]; the
    /// cache key is matched when absent
    pub url: Option<String>,
}

impl ResultLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug)]
struct StoredResult<V> {
    entry: CacheEntry<V>,
    /// Includes the implicit `ns:<namespace>` tag
    tags: HashSet<String>,
    namespace: String,
    url: Option<String>,
}

impl<V> StoredResult<V> {
    fn new(value: V, ttl: Duration, labels: ResultLabels) -> Self {
        let namespace = labels
            .namespace
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let mut tags: HashSet<String> = labels.tags.into_iter().collect();
        tags.insert(format!("ns:{}", namespace));

        Self {
            entry: CacheEntry::new(value, Some(ttl)),
            tags,
            namespace,
            url: labels.url,
        }
    }
}

#[derive(Debug)]
struct Strategy<V> {
    name: String,
    ttl: Duration,
    eviction_policy: String,
    entries: HashMap<String, StoredResult<V>>,
    stats: CacheStats,
}

impl<V> Strategy<V> {
    /// Drops entries matching `doomed`. Returns how many were dropped.
    fn drop_where<F>(&mut self, mut doomed: F) -> usize
    where
        F: FnMut(&str, &StoredResult<V>) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, stored| !doomed(key, stored));
        self.stats.set_total_entries(self.entries.len());
        before - self.entries.len()
    }

    fn info(&self, id: &StrategyId) -> StrategyInfo {
        StrategyInfo {
            id: id.clone(),
            name: self.name.clone(),
            ttl_ms: self.ttl.as_millis() as u64,
            eviction_policy: self.eviction_policy.clone(),
        }
    }
}

// == Result Cache ==
#[derive(Debug)]
pub struct ResultCache<V> {
    strategies: HashMap<StrategyId, Strategy<V>>,
}

impl<V> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ResultCache<V> {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    // == Define Strategy ==
    pub fn define_strategy(
        &mut self,
        name: impl Into<String>,
        ttl: Duration,
        eviction_policy: impl Into<String>,
    ) -> StrategyId {
        let id = StrategyId::generate();
        let strategy = Strategy {
            name: name.into(),
            ttl,
            eviction_policy: eviction_policy.into(),
            entries: HashMap::new(),
            stats: CacheStats::new(),
        };
        info!(
            "Caching strategy defined: id={}, name={}, ttl={}ms, policy={}",
            id,
            strategy.name,
            ttl.as_millis(),
            strategy.eviction_policy
        );
        self.strategies.insert(id.clone(), strategy);
        id
    }

    fn strategy_mut(&mut self, id: &StrategyId) -> Result<&mut Strategy<V>> {
        self.strategies
            .get_mut(id)
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Strategy, id.as_str()))
    }

    pub fn strategy(&self, id: &StrategyId) -> Result<StrategyInfo> {
        self.strategies
            .get(id)
            .map(|strategy| strategy.info(id))
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Strategy, id.as_str()))
    }

    // == Cache Result ==
    /// Stores `result` under `key`, expiring after the strategy's TTL.
    pub fn cache_result(
        &mut self,
        strategy_id: &StrategyId,
        key: impl Into<String>,
        result: V,
    ) -> Result<()> {
        self.cache_labeled(strategy_id, key, result, ResultLabels::default())
    }

    /// Same as [`cache_result`](Self::cache_result) with grouping labels.
    /// Overwriting a key replaces its labels.
    pub fn cache_labeled(
        &mut self,
        strategy_id: &StrategyId,
        key: impl Into<String>,
        result: V,
        labels: ResultLabels,
    ) -> Result<()> {
        let strategy = self.strategy_mut(strategy_id)?;
        let stored = StoredResult::new(result, strategy.ttl, labels);
        strategy.entries.insert(key.into(), stored);
        strategy.stats.set_total_entries(strategy.entries.len());
        Ok(())
    }

    // == Invalidate ==
    /// Removes one cached result. Returns false if it was not cached.
    pub fn invalidate(&mut self, strategy_id: &StrategyId, key: &str) -> Result<bool> {
        let strategy = self.strategy_mut(strategy_id)?;
        let removed = strategy.entries.remove(key).is_some();
        strategy.stats.set_total_entries(strategy.entries.len());
        Ok(removed)
    }

    /// Removes every result cached under a strategy. Returns the count.
    pub fn invalidate_strategy(&mut self, strategy_id: &StrategyId) -> Result<usize> {
        let strategy = self.strategy_mut(strategy_id)?;
        Ok(strategy.drop_where(|_, _| true))
    }

    /// Removes results carrying any of `tags`, across all strategies.
    pub fn invalidate_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> usize {
        let removed = self.drop_everywhere(|_, stored| {
            tags.iter()
                .any(|tag| stored.tags.contains(AsRef::<str>::as_ref(tag)))
        });
        debug!("Invalidated {} results by tag", removed);
        removed
    }

    /// Removes results whose URL (or key, when no URL was given) matches the
    /// regular expression `pattern`, across all strategies.
    pub fn invalidate_by_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern).map_err(|e| {
            ShapingError::InvalidArgument(format!("invalid pattern '{}': {}", pattern, e))
        })?;
        Ok(self.invalidate_matching(&regex))
    }

    pub fn invalidate_matching(&mut self, regex: &Regex) -> usize {
        let removed = self.drop_everywhere(|key, stored| {
            regex.is_match(stored.url.as_deref().unwrap_or(key))
        });
        debug!("Invalidated {} results matching {}", removed, regex);
        removed
    }

    /// Removes every result cached in `namespace`. An empty name matches
    /// nothing.
    pub fn invalidate_namespace(&mut self, namespace: &str) -> usize {
        if namespace.is_empty() {
            return 0;
        }
        let removed = self.drop_everywhere(|_, stored| stored.namespace == namespace);
        debug!("Invalidated {} results in namespace {}", removed, namespace);
        removed
    }

    fn drop_everywhere<F>(&mut self, mut doomed: F) -> usize
    where
        F: FnMut(&str, &StoredResult<V>) -> bool,
    {
        self.strategies
            .values_mut()
            .map(|strategy| strategy.drop_where(&mut doomed))
            .sum()
    }

    // == Cleanup Expired ==
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for strategy in self.strategies.values_mut() {
            let dropped = strategy.drop_where(|_, stored| stored.entry.is_expired_at(now));
            strategy.stats.record_expirations(dropped);
            removed += dropped;
        }
        if removed > 0 {
            debug!("Result cache sweep removed {} expired entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for strategy in self.strategies.values() {
            total.merge(&strategy.stats);
        }
        total
    }
}

impl<V: Clone> ResultCache<V> {
    // == Get ==
    /// Returns the cached result, or None once `now >= expires_at`. Expired
    /// entries are evicted on lookup.
    pub fn get(&mut self, strategy_id: &StrategyId, key: &str) -> Result<Option<V>> {
        let strategy = self.strategy_mut(strategy_id)?;
        let now = Instant::now();

        let Some(stored) = strategy.entries.get(key) else {
            strategy.stats.record_miss();
            return Ok(None);
        };

        if stored.entry.is_expired_at(now) {
            strategy.entries.remove(key);
            strategy.stats.record_expiration();
            strategy.stats.record_miss();
            strategy.stats.set_total_entries(strategy.entries.len());
            return Ok(None);
        }

        let value = stored.entry.value.clone();
        strategy.stats.record_hit();
        Ok(Some(value))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_boundary() {
        let mut cache: ResultCache<&str> = ResultCache::new();
        let id = cache.define_strategy("model", Duration::from_millis(100), "lru");

        cache.cache_result(&id, "k", "v").unwrap();

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&id, "k").unwrap(), Some("v"));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&id, "k").unwrap(), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_exactly_at_ttl() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let id = cache.define_strategy("s", Duration::from_millis(100), "ttl");
        cache.cache_result(&id, "k", 1).unwrap();

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&id, "k").unwrap(), None);
    }

    #[test]
    fn test_unknown_strategy() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let missing = StrategyId::from("strategy_missing");

        assert!(matches!(
            cache.cache_result(&missing, "k", 1),
            Err(ShapingError::NotFound {
                kind: ResourceKind::Strategy,
                ..
            })
        ));
        assert!(cache.get(&missing, "k").is_err());
        assert!(cache.strategy(&missing).is_err());
    }

    #[test]
    fn test_policy_name_is_metadata() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let id = cache.define_strategy("embeddings", Duration::from_secs(5), "lfu");

        let info = cache.strategy(&id).unwrap();
        assert_eq!(info.name, "embeddings");
        assert_eq!(info.ttl_ms, 5000);
        assert_eq!(info.eviction_policy, "lfu");

        // No capacity bound applies
        for i in 0..500 {
            cache.cache_result(&id, format!("k{}", i), i).unwrap();
        }
        assert_eq!(cache.stats().total_entries, 500);
    }

    #[test]
    fn test_strategies_isolated_and_invalidation() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let a = cache.define_strategy("a", Duration::from_secs(60), "lru");
        let b = cache.define_strategy("b", Duration::from_secs(60), "lru");

        cache.cache_result(&a, "k", 1).unwrap();
        cache.cache_result(&b, "k", 2).unwrap();
        cache.cache_result(&b, "j", 3).unwrap();

        assert!(cache.invalidate(&a, "k").unwrap());
        assert!(!cache.invalidate(&a, "k").unwrap());
        assert_eq!(cache.get(&a, "k").unwrap(), None);
        assert_eq!(cache.get(&b, "k").unwrap(), Some(2));

        assert_eq!(cache.invalidate_strategy(&b).unwrap(), 2);
        assert_eq!(cache.get(&b, "j").unwrap(), None);
    }

    #[test]
    fn test_invalidate_by_tags_spans_strategies() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let a = cache.define_strategy("a", Duration::from_secs(60), "lru");
        let b = cache.define_strategy("b", Duration::from_secs(60), "lru");

        cache
            .cache_labeled(&a, "u1", 1, ResultLabels::new().tag("users"))
            .unwrap();
        cache
            .cache_labeled(&b, "u2", 2, ResultLabels::new().tag("users").tag("admins"))
            .unwrap();
        cache
            .cache_labeled(&b, "p1", 3, ResultLabels::new().tag("posts"))
            .unwrap();
        cache.cache_result(&a, "plain", 4).unwrap();

        assert_eq!(cache.invalidate_by_tags(&["users", "missing"]), 2);
        assert_eq!(cache.get(&a, "u1").unwrap(), None);
        assert_eq!(cache.get(&b, "u2").unwrap(), None);
        assert_eq!(cache.get(&b, "p1").unwrap(), Some(3));
        assert_eq!(cache.get(&a, "plain").unwrap(), Some(4));
        assert_eq!(cache.stats().total_entries, 2);
    }

    #[test]
    fn test_invalidate_by_pattern_matches_url_then_key() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let id = cache.define_strategy("http", Duration::from_secs(60), "lru");

        cache
            .cache_labeled(&id, "k1", 1, ResultLabels::new().url("/api/users/1"))
            .unwrap();
        cache
            .cache_labeled(&id, "k2", 2, ResultLabels::new().url("/api/posts/1"))
            .unwrap();
        cache.cache_result(&id, "/api/users/2", 3).unwrap();

        assert_eq!(cache.invalidate_by_pattern(r"^/api/users/").unwrap(), 2);
        assert_eq!(cache.get(&id, "k2").unwrap(), Some(2));
        assert_eq!(cache.stats().total_entries, 1);
    }

    #[test]
    fn test_invalidate_by_pattern_rejects_bad_regex() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let result = cache.invalidate_by_pattern("(unclosed");
        assert!(matches!(result, Err(ShapingError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalidate_namespace() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let id = cache.define_strategy("s", Duration::from_secs(60), "lru");

        cache
            .cache_labeled(&id, "a", 1, ResultLabels::new().namespace("tenant-1"))
            .unwrap();
        cache
            .cache_labeled(&id, "b", 2, ResultLabels::new().namespace("tenant-2"))
            .unwrap();
        cache.cache_result(&id, "c", 3).unwrap();

        assert_eq!(cache.invalidate_namespace(""), 0);
        assert_eq!(cache.invalidate_namespace("tenant-1"), 1);
        assert_eq!(cache.get(&id, "b").unwrap(), Some(2));

        // Unlabelled results land in the default namespace and carry its tag
        assert_eq!(cache.invalidate_by_tags(&["ns:default"]), 1);
        assert_eq!(cache.get(&id, "c").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_labels() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let id = cache.define_strategy("s", Duration::from_secs(60), "lru");

        cache
            .cache_labeled(&id, "k", 1, ResultLabels::new().tag("old"))
            .unwrap();
        cache
            .cache_labeled(&id, "k", 2, ResultLabels::new().tag("new"))
            .unwrap();

        assert_eq!(cache.invalidate_by_tags(&["old"]), 0);
        assert_eq!(cache.invalidate_by_tags(&["new"]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expired() {
        let mut cache: ResultCache<i32> = ResultCache::new();
        let short = cache.define_strategy("short", Duration::from_millis(10), "ttl");
        let long = cache.define_strategy("long", Duration::from_secs(10), "ttl");

        cache.cache_result(&short, "a", 1).unwrap();
        cache.cache_result(&short, "b", 2).unwrap();
        cache.cache_result(&long, "c", 3).unwrap();

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.get(&long, "c").unwrap(), Some(3));
    }
}
