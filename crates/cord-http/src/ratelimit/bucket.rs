//! Per-route bucket

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Counters of one bucket, guarded by the bucket lock
#[derive(Debug)]
pub(crate) struct BucketState {
    pub(crate) remaining: i64,
    pub(crate) limit: Option<i64>,
    pub(crate) reset_at: Option<Instant>,
}

impl Default for BucketState {
    fn default() -> Self {
        // a fresh bucket lets the first request through to learn the limits
        Self {
            remaining: 1,
            limit: None,
            reset_at: None,
        }
    }
}

/// Rate-limit bucket for one route key
///
/// Buckets are handed out as `Arc<Bucket>` by the limiter and never evicted.
#[derive(Debug)]
pub struct Bucket {
    key: String,
    pub(crate) state: Arc<Mutex<BucketState>>,
}

impl Bucket {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Arc::new(Mutex::new(BucketState::default())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current counters
    ///
    /// Waits for any in-flight request on this bucket to be released.
    pub async fn snapshot(&self) -> BucketSnapshot {
        let state = self.state.lock().await;
        BucketSnapshot {
            remaining: state.remaining,
            limit: state.limit,
            reset_at: state.reset_at,
        }
    }

    /// Whether a request is currently holding this bucket
    pub fn is_locked(&self) -> bool {
        self.state.try_lock().is_err()
    }
}

/// Point-in-time view of a bucket's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub remaining: i64,
    pub limit: Option<i64>,
    pub reset_at: Option<Instant>,
}

/// A bucket acquired for one request
///
/// Holds the bucket lock until passed back to
/// [`RateLimiter::release`](super::RateLimiter::release). Dropping it
/// releases the bucket without touching the counters.
#[derive(Debug)]
pub struct LockedBucket {
    pub(crate) bucket: Arc<Bucket>,
    pub(crate) guard: OwnedMutexGuard<BucketState>,
}

impl LockedBucket {
    pub fn bucket(&self) -> &Arc<Bucket> {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        self.bucket.key()
    }

    /// Remaining count after this request's unit was taken
    pub fn remaining(&self) -> i64 {
        self.guard.remaining
    }
}
