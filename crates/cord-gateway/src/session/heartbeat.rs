//! Heartbeat loop

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use super::GatewaySession;
use crate::error::GatewayResult;
use crate::protocol::GatewayPayload;

impl GatewaySession {
    /// Start heartbeating on `conn_id`, replacing any running heartbeat
    pub(super) fn start_heartbeat(self: &Arc<Self>, conn_id: u64, interval: Duration) {
        let Some(stop) = self.listening.lock().as_ref().map(watch::Sender::subscribe) else {
            debug!(conn_id, "connection already closed, heartbeat not started");
            return;
        };

        let handle = self
            .supervisor
            .spawn(Arc::clone(self).heartbeat(conn_id, interval, stop));
        if let Some(previous) = std::mem::replace(&mut *self.heartbeat.lock(), handle) {
            previous.abort();
        }
    }

    async fn heartbeat(self: Arc<Self>, conn_id: u64, interval: Duration, mut stop: watch::Receiver<()>) {
        debug!(conn_id, interval_ms = interval.as_millis() as u64, "heartbeat started");

        loop {
            if let Err(err) = self.send_heartbeat(conn_id).await {
                // The read loop notices the broken connection and reconnects
                error!(error = %err, "error sending heartbeat, stopping heartbeat");
                self.data_ready.store(false, Ordering::Release);
                return;
            }

            tokio::select! {
                biased;
                _ = stop.changed() => {
                    debug!(conn_id, "heartbeat stopped");
                    return;
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Send one heartbeat carrying the current sequence
    pub(super) async fn send_heartbeat(&self, conn_id: u64) -> GatewayResult<()> {
        let seq = self.sequence();
        trace!(seq, "sending heartbeat");
        self.send(Some(conn_id), &GatewayPayload::heartbeat(seq)).await?;
        *self.last_heartbeat_sent.write() = Some(Instant::now());
        Ok(())
    }

    /// When the last heartbeat was sent
    pub fn last_heartbeat_sent(&self) -> Option<Instant> {
        *self.last_heartbeat_sent.read()
    }

    /// When the server last acknowledged a heartbeat
    pub fn last_heartbeat_ack(&self) -> Option<Instant> {
        *self.last_heartbeat_ack.read()
    }

    /// Time between the last heartbeat and its acknowledgement
    ///
    /// `None` until a heartbeat has been acknowledged after being sent.
    pub fn heartbeat_latency(&self) -> Option<Duration> {
        let sent = self.last_heartbeat_sent()?;
        let ack = self.last_heartbeat_ack()?;
        ack.checked_duration_since(sent)
    }
}
