//! Request and Response models for the shaping API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    validate_key, AddBatchRequest, CreateBatchRequest, CreateLayerRequest, CreateStrategyRequest,
    FetchRequest, InvalidateRequest, PrioritizeRequest, PutResultRequest, PutValueRequest,
    SetLimitRequest, SetRateLimitRequest, WarmRequest,
};
pub use responses::{
    CacheStatsResponse, CreatedResponse, FlushResponse, HealthResponse, InvalidatedResponse,
    MessageResponse, NextRequestResponse, PriorityItemResponse, StatsResponse, ValueResponse,
};
