//! # cord-http
//!
//! REST request layer: a per-route rate limiter with a shared global bucket,
//! and an executor that classifies responses and retries transient failures.

pub mod ratelimit;
pub mod rest;

pub use ratelimit::{
    Bucket, BucketSnapshot, LockedBucket, RateLimitHeaderError, RateLimitHeaders, RateLimiter,
};
pub use rest::{route_key, ApiErrorMessage, RestClient, RestError, RestResult, StatusError};
