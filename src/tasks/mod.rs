//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the host is up.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at configured intervals
//! - Batch flush: drains batches that waited past their timeout

mod cleanup;
mod flush;

pub use cleanup::spawn_cleanup_task;
pub use flush::spawn_batch_flush_task;
