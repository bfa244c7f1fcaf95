//! Cache Module
//!
//! Bounded LRU caches, a multi-layer TTL router, a strategy-keyed result
//! cache and the warm-up driver that fills them.

mod bounded;
mod entry;
mod layered;
mod lru;
mod stats;
mod strategy;
mod warm;


// Re-export public types
pub use bounded::BoundedCache;
pub use entry::CacheEntry;
pub use layered::{LayerId, LayerInfo, LayeredCache};
pub use lru::{LinkedOrder, RecencyOrder, ScanOrder};
pub use stats::CacheStats;
pub use strategy::{ResultCache, ResultLabels, StrategyId, StrategyInfo, DEFAULT_NAMESPACE};
pub use warm::{try_warm, warm, WarmReport};

// == Public Constants ==
/// Maximum allowed key length in bytes for keys arriving over the API
pub const MAX_KEY_LENGTH: usize = 256;
