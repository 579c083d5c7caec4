//! Route-keyed rate limiter with a shared global cooldown

use cord_common::TaskSupervisor;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::bucket::{Bucket, LockedBucket};
use super::headers::{RateLimitHeaderError, RateLimitHeaders};

/// Hands out per-route buckets and tracks the global cooldown
#[derive(Debug)]
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
    /// Held for the duration of a global cooldown
    global: Arc<Mutex<()>>,
    clock_skew_margin: Duration,
    supervisor: Arc<TaskSupervisor>,
}

impl RateLimiter {
    pub fn new(clock_skew_margin: Duration, supervisor: Arc<TaskSupervisor>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            global: Arc::new(Mutex::new(())),
            clock_skew_margin,
            supervisor,
        }
    }

    /// Bucket for `key`, created on first use
    pub fn bucket(&self, key: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return bucket.clone();
        }

        self.buckets
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Bucket::new(key)))
            .clone()
    }

    /// Number of buckets created so far
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }

    /// Wait until `key` may send a request and take one unit from it
    pub async fn acquire(&self, key: &str) -> LockedBucket {
        self.acquire_bucket(self.bucket(key)).await
    }

    /// Same as [`acquire`](Self::acquire) for a bucket already in hand
    ///
    /// Retries use this so they stay on the bucket of the original request.
    pub async fn acquire_bucket(&self, bucket: Arc<Bucket>) -> LockedBucket {
        let mut guard = bucket.state.clone().lock_owned().await;

        if guard.remaining < 1 {
            if let Some(reset_at) = guard.reset_at {
                if reset_at > Instant::now() {
                    debug!(
                        bucket = bucket.key(),
                        wait_ms = (reset_at - Instant::now()).as_millis() as u64,
                        "bucket exhausted, waiting for reset"
                    );
                    sleep_until(reset_at).await;
                }
            }
        }

        // blocks only while a global cooldown holds the lock
        drop(self.global.lock().await);

        guard.remaining -= 1;
        LockedBucket { bucket, guard }
    }

    /// Feed a response's headers back into the bucket and unlock it
    ///
    /// `None` means the request never got a response; the counters are left
    /// alone. A malformed header is returned as an error after the bucket
    /// has been unlocked.
    pub fn release(
        &self,
        locked: LockedBucket,
        headers: Option<&HeaderMap>,
    ) -> Result<(), RateLimitHeaderError> {
        let LockedBucket { bucket, mut guard } = locked;

        let Some(headers) = headers else {
            return Ok(());
        };

        let parsed = match RateLimitHeaders::parse(headers) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(bucket = bucket.key(), error = %err, "unreadable rate-limit headers");
                return Err(err);
            }
        };

        match parsed.retry_after {
            Some(cooldown) if parsed.global => self.hold_global(cooldown),
            Some(wait) => guard.reset_at = Some(Instant::now() + wait),
            None => {
                if let Some(delay) = parsed.reset_delay(self.clock_skew_margin) {
                    guard.reset_at = Some(Instant::now() + delay);
                }
            }
        }

        if let Some(remaining) = parsed.remaining {
            guard.remaining = remaining;
        }
        if parsed.limit.is_some() {
            guard.limit = parsed.limit;
        }

        Ok(())
    }

    /// Whether a global cooldown is in effect
    pub fn is_globally_limited(&self) -> bool {
        self.global.try_lock().is_err()
    }

    /// Lock every route for `cooldown` from a background task
    fn hold_global(&self, cooldown: Duration) {
        warn!(
            cooldown_ms = cooldown.as_millis() as u64,
            "global rate limit hit"
        );

        match self.global.clone().try_lock_owned() {
            Ok(guard) => {
                self.supervisor.spawn(async move {
                    sleep(cooldown).await;
                    drop(guard);
                });
            }
            Err(_) => {
                // a cooldown is already running; queue another one behind it
                let global = self.global.clone();
                self.supervisor.spawn(async move {
                    let _guard = global.lock_owned().await;
                    sleep(cooldown).await;
                });
            }
        }
    }
}
