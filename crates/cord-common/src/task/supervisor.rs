//! Supervised background tasks
//!
//! Every task a client spawns (read loop, heartbeat, handler invocations,
//! rate-limit cooldowns) goes through one [`TaskSupervisor`], so closing the
//! client can abort and join all of them.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, error};

/// Owns the background tasks of one client
#[derive(Debug, Default)]
pub struct TaskSupervisor {
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task on the current runtime
    ///
    /// Returns `None` once the supervisor has been shut down. Finished tasks
    /// are reaped here, so the set only holds live ones.
    pub fn spawn<F>(&self, future: F) -> Option<AbortHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            debug!("supervisor closed, task not spawned");
            return None;
        }

        let mut tasks = self.tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            log_outcome(result);
        }
        Some(tasks.spawn(future))
    }

    /// Number of tasks not yet reaped
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Refuse new tasks, abort the running ones, and wait for them to end
    ///
    /// Must not be awaited from inside a supervised task.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        tasks.abort_all();
        while let Some(result) = tasks.join_next().await {
            log_outcome(result);
        }
        debug!("supervisor shut down");
    }

    /// Refuse new tasks, give running ones `grace` to finish, then abort the rest
    ///
    /// Must not be awaited from inside a supervised task.
    pub async fn shutdown_with_grace(&self, grace: Duration) {
        self.closed.store(true, Ordering::Release);

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = tasks.join_next().await {
                log_outcome(result);
            }
        })
        .await;

        if drained.is_err() {
            debug!(remaining = tasks.len(), "grace period over, aborting tasks");
            tasks.abort_all();
            while let Some(result) = tasks.join_next().await {
                log_outcome(result);
            }
        }
        debug!("supervisor shut down");
    }
}

fn log_outcome(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            error!(error = %err, "supervised task panicked");
        }
    }
}
