//! Walks a dead-letter list in batches, replaying each entry once its
//! spacing window has elapsed and quarantining what still fails after
//! `max_retries`.

use chrono::Utc;
use mutt_queue::{keys, QueueClient};
use mutt_retry::remediation_spacing;
use mutt_types::DlqEntry;

pub struct DlqSource {
    pub name: &'static str,
    pub dlq_key: &'static str,
    pub replay_target: &'static str,
}

pub const ALERTER_DLQ: DlqSource = DlqSource {
    name: "alerter",
    dlq_key: keys::DLQ_ALERTER,
    replay_target: keys::RAW_QUEUE,
};

pub const MOOG_DLQ: DlqSource = DlqSource {
    name: "moog",
    dlq_key: keys::DLQ_MOOG,
    replay_target: keys::ALERT_QUEUE,
};

/// Replay up to `batch_size` due entries from `source`. `gate` is
/// evaluated once per call and, when it returns `false`, the whole
/// batch is skipped without consuming spacing budget — used to hold
/// back Moog replays while the downstream endpoint looks unhealthy.
pub async fn replay_batch(queue: &QueueClient, source: &DlqSource, batch_size: u32, max_retries: u32, gate: bool) {
    if !gate {
        tracing::debug!(source = source.name, "replay gate closed, skipping batch");
        return;
    }

    let entries = match queue.list_all(source.dlq_key).await {
        Ok(items) => items,
        Err(error) => {
            tracing::warn!(%error, source = source.name, "failed to read dlq for replay");
            return;
        }
    };

    let mut replayed = 0u32;
    let mut quarantined = 0u32;

    for raw in entries.iter().take(batch_size as usize) {
        let Ok(entry) = serde_json::from_slice::<DlqEntry>(raw) else {
            tracing::warn!(source = source.name, "dropping unparseable dlq entry, quarantining verbatim");
            let _ = queue.ack(source.dlq_key, raw).await;
            let _ = queue.enqueue(keys::QUARANTINE, raw).await;
            quarantined += 1;
            continue;
        };

        let due_at = entry.poison.timestamp + chrono::Duration::from_std(remediation_spacing(entry.poison.retry_count)).unwrap_or_default();
        if due_at > Utc::now() {
            continue;
        }

        if entry.poison.retry_count >= max_retries {
            tracing::warn!(source = source.name, retry_count = entry.poison.retry_count, "dlq entry exhausted remediation retries, quarantining");
            let _ = queue.ack(source.dlq_key, raw).await;
            if let Ok(bytes) = serde_json::to_vec(&entry) {
                let _ = queue.enqueue(keys::QUARANTINE, &bytes).await;
            }
            quarantined += 1;
            mutt_observability::record_remediation_replay(source.dlq_key, "quarantined");
            continue;
        }

        match serde_json::to_vec(&entry.payload) {
            Ok(payload) => {
                if queue.enqueue(source.replay_target, &payload).await.is_ok() {
                    let _ = queue.ack(source.dlq_key, raw).await;
                    replayed += 1;
                    mutt_observability::record_remediation_replay(source.dlq_key, "replayed");
                } else {
                    mutt_observability::record_remediation_replay(source.dlq_key, "error");
                }
            }
            Err(error) => {
                tracing::warn!(%error, source = source.name, "failed to re-serialize dlq payload for replay");
                mutt_observability::record_remediation_replay(source.dlq_key, "error");
            }
        }
    }

    if replayed > 0 || quarantined > 0 {
        tracing::info!(source = source.name, replayed, quarantined, "remediation pass complete");
    }

    if let Ok(depth) = queue.depth(source.dlq_key).await {
        mutt_observability::set_queue_depth(source.dlq_key, depth as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_point_at_the_expected_queues() {
        assert_eq!(ALERTER_DLQ.replay_target, keys::RAW_QUEUE);
        assert_eq!(MOOG_DLQ.replay_target, keys::ALERT_QUEUE);
    }
}
