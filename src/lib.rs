//! Request Shaper - In-process request and cache shaping
//!
//! Bounded LRU caches, TTL layers and result caches, plus request
//! deduplication, batching, prioritization and sliding-window rate limiting.
//! The components are plain library types; the `api` module exposes them
//! over HTTP for the bundled host binary.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod request;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{ResourceKind, Result, ShapingError};
pub use tasks::{spawn_batch_flush_task, spawn_cleanup_task};
