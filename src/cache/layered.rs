//! Multi-Layer Cache Router
//!
//! Named cache layers (e.g. "hot" and "warm"), each with its own TTL and its
//! own bounded backing cache. Reads and writes address a layer explicitly by
//! id; [`LayeredCache::find`] additionally walks layers by level.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{BoundedCache, CacheStats};
use crate::error::{ResourceKind, Result, ShapingError};
use crate::events::{noop_sink, SharedSink};

// == Layer Id ==
/// Opaque identifier returned by [`LayeredCache::add_layer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    fn generate() -> Self {
        Self(format!("layer_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Cache Layer ==
#[derive(Debug)]
struct CacheLayer<V> {
    name: String,
    level: i32,
    /// Creation order; breaks ties between layers on the same level
    seq: u64,
    ttl: Duration,
    cache: BoundedCache<V>,
}

/// Read-only description of a layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub level: i32,
    pub ttl_ms: u64,
    pub entries: usize,
}

// == Layered Cache ==
#[derive(Debug)]
pub struct LayeredCache<V> {
    layers: HashMap<LayerId, CacheLayer<V>>,
    next_seq: u64,
    layer_capacity: usize,
    events: SharedSink,
}

impl<V> LayeredCache<V> {
    /// Creates a router whose layers each hold up to `layer_capacity` entries.
    pub fn new(layer_capacity: usize) -> Self {
        Self {
            layers: HashMap::new(),
            next_seq: 0,
            layer_capacity,
            events: noop_sink(),
        }
    }

    /// Routes events from every layer created afterwards to `sink`.
    pub fn with_events(mut self, sink: SharedSink) -> Self {
        self.events = sink;
        self
    }

    // == Add Layer ==
    /// Registers a new layer. Levels are not validated against each other;
    /// layers sharing a level are ordered by creation.
    pub fn add_layer(&mut self, name: impl Into<String>, level: i32, ttl: Duration) -> LayerId {
        let id = LayerId::generate();
        let name = name.into();
        info!(
            "Cache layer added: id={}, name={}, level={}, ttl={}ms",
            id,
            name,
            level,
            ttl.as_millis()
        );

        let cache = BoundedCache::new(self.layer_capacity).with_events(self.events.clone());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.layers.insert(
            id.clone(),
            CacheLayer {
                name,
                level,
                seq,
                ttl,
                cache,
            },
        );
        id
    }

    /// Drops a layer and everything it holds.
    pub fn remove_layer(&mut self, layer_id: &LayerId) -> Result<()> {
        self.layers
            .remove(layer_id)
            .map(|_| ())
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Layer, layer_id.as_str()))
    }

    fn layer_mut(&mut self, layer_id: &LayerId) -> Result<&mut CacheLayer<V>> {
        self.layers
            .get_mut(layer_id)
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Layer, layer_id.as_str()))
    }

    // == Set ==
    /// Stores `value` in the given layer, expiring after the layer's TTL.
    pub fn set(&mut self, key: impl Into<String>, value: V, layer_id: &LayerId) -> Result<()> {
        let layer = self.layer_mut(layer_id)?;
        let ttl = layer.ttl;
        layer.cache.put_with_ttl(key, value, ttl);
        Ok(())
    }

    /// Layers sorted by level, then creation order.
    fn ordered(&self) -> Vec<(&LayerId, &CacheLayer<V>)> {
        let mut ordered: Vec<_> = self.layers.iter().collect();
        ordered.sort_by_key(|(_, layer)| (layer.level, layer.seq));
        ordered
    }

    /// Describes every layer, ordered by level then creation.
    pub fn layers(&self) -> Vec<LayerInfo> {
        self.ordered()
            .into_iter()
            .map(|(id, layer)| LayerInfo {
                id: id.clone(),
                name: layer.name.clone(),
                level: layer.level,
                ttl_ms: layer.ttl.as_millis() as u64,
                entries: layer.cache.len(),
            })
            .collect()
    }

    /// Removes expired entries from every layer. Returns the number removed.
    pub fn sweep_expired(&mut self) -> usize {
        let removed: usize = self
            .layers
            .values_mut()
            .map(|layer| layer.cache.sweep_expired())
            .sum();
        if removed > 0 {
            debug!("Layer sweep removed {} expired entries", removed);
        }
        removed
    }

    /// Combined statistics across all layers.
    pub fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for layer in self.layers.values() {
            total.merge(&layer.cache.stats());
        }
        total
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl<V: Clone> LayeredCache<V> {
    // == Get ==
    /// Reads `key` from one layer. Expired entries are treated as absent.
    pub fn get(&mut self, key: &str, layer_id: &LayerId) -> Result<Option<V>> {
        Ok(self.layer_mut(layer_id)?.cache.get(key))
    }

    // == Find ==
    /// Walks layers in ascending level order and returns the first live hit.
    /// Among layers on the same level the earliest created wins.
    pub fn find(&mut self, key: &str) -> Option<(LayerId, V)> {
        let id = self
            .ordered()
            .into_iter()
            .find(|(_, layer)| layer.cache.contains(key))
            .map(|(id, _)| id.clone())?;

        let value = self.layers.get_mut(&id)?.cache.get(key)?;
        Some((id, value))
    }
}
