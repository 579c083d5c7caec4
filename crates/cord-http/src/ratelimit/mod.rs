//! Rate limiting
//!
//! Buckets are keyed by route and created on first use. Each bucket admits
//! one request at a time: [`RateLimiter::acquire`] hands out a
//! [`LockedBucket`] that stays locked until [`RateLimiter::release`] feeds
//! the response headers back.

mod bucket;
mod headers;
mod limiter;

pub use bucket::{Bucket, BucketSnapshot, LockedBucket};
pub use headers::{RateLimitHeaders, RateLimitHeaderError};
pub use limiter::RateLimiter;
