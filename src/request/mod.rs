//! Request Shaping Module
//!
//! Deduplication, batching, prioritization and rate limiting of outbound
//! requests, plus a read-through fetch that joins deduplication with the
//! result cache.

mod batch;
mod dedupe;
mod priority;
mod rate_limit;
mod read_through;

pub use batch::{BatchId, BatchStatus, FlushedBatch, RequestBatcher};
pub use dedupe::{Flight, RequestDeduplicator, RequestKey};
pub use priority::{Priority, PriorityItem, PriorityQueue};
pub use rate_limit::{RateDecision, RateLimiter, REASON_LIMIT_EXCEEDED, REASON_NOT_CONFIGURED};
pub use read_through::ReadThrough;
