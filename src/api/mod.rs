//! API Module
//!
//! HTTP handlers and routing exposing the shaping components as a JSON API.
//!
//! # Endpoints
//! - `PUT|GET|DELETE /cache/:key` - Bounded LRU cache
//! - `PUT /settings/cache-limit` - Resize the bounded cache
//! - `POST /warm` - Warm the bounded cache from an upstream base URL
//! - `POST|GET /layers`, `PUT|GET /layers/:id/:key` - Layer router
//! - `POST /strategies`, `PUT|GET /strategies/:id/:key` - Result cache
//! - `POST /results/invalidate` - Drop results by tag, pattern or namespace
//! - `POST /fetch` - Read-through upstream fetch with request coalescing
//! - `POST /batches`, `POST /batches/:id/requests`, `POST /batches/:id/flush` - Batching
//! - `POST /priority`, `POST /priority/next` - Priority queue
//! - `PUT /limits/:identifier`, `POST /limits/:identifier/check` - Rate limiter
//! - `GET /stats`, `GET /health`

pub mod handlers;
pub mod routes;
pub mod upstream;

pub use handlers::*;
pub use routes::create_router;
