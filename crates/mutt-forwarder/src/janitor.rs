//! Same healing policy as the Classifier's janitor, draining a dead
//! Deliverer's stranded deliveries back onto `alert_queue` instead of
//! `raw_queue`.

use std::time::Duration;

use mutt_queue::{keys, QueueClient};

pub fn spawn(queue: QueueClient, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => sweep(&queue).await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

async fn sweep(queue: &QueueClient) {
    let processing_prefix = keys::processing_prefix("forwarder");
    let processing_keys = match queue.scan_prefix(&processing_prefix).await {
        Ok(keys) => keys,
        Err(error) => {
            tracing::warn!(%error, "janitor failed to enumerate processing lists");
            return;
        }
    };

    for processing_key in processing_keys {
        let Some(worker_id) = processing_key.strip_prefix(&processing_prefix) else {
            continue;
        };
        let heartbeat_key = keys::heartbeat_key("forwarder", worker_id);
        let alive = matches!(queue.get(&heartbeat_key).await, Ok(Some(_)));
        if alive {
            continue;
        }

        let stranded = match queue.list_all(&processing_key).await {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(%error, processing_key, "janitor failed to read stranded processing list");
                continue;
            }
        };
        if stranded.is_empty() {
            let _ = queue.delete(&processing_key).await;
            continue;
        }

        tracing::warn!(worker_id, count = stranded.len(), "draining stranded deliveries back to alert_queue");
        for item in &stranded {
            if let Err(error) = queue.enqueue(keys::ALERT_QUEUE, item).await {
                tracing::error!(%error, worker_id, "janitor failed to requeue a stranded delivery, leaving processing list intact");
                return;
            }
        }
        let _ = queue.delete(&processing_key).await;
    }
}
