//! Keeps this worker's liveness key fresh so the janitor can tell a slow
//! worker from a dead one.

use std::time::Duration;

use mutt_queue::{keys, QueueClient};

pub fn spawn(queue: QueueClient, worker_id: String, mut shutdown: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let key = keys::heartbeat_key("alerter", &worker_id);
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = chrono::Utc::now().to_rfc3339();
                    if let Err(error) = queue.set_with_ttl(&key, &now, Duration::from_secs(keys::HEARTBEAT_TTL_SECS)).await {
                        tracing::warn!(%error, "failed to refresh alerter heartbeat");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
