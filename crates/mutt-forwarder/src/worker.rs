//! The Deliverer's stage loop: stage from `alert_queue`, check breaker
//! and rate limit, POST to Moog, classify the outcome, retry or DLQ.

use std::sync::Arc;
use std::time::Duration;

use mutt_breaker::CircuitBreaker;
use mutt_queue::{keys, QueueClient};
use mutt_ratelimit::RateLimiter;
use mutt_retry::deliverer_backoff;
use mutt_types::{DlqEntry, EnrichedEvent};
use mutt_webhook::{DeliveryOutcome, MoogAlert, WebhookClient};
use tokio::sync::Semaphore;

pub struct WorkerConfig {
    pub worker_id: String,
    pub max_retries: u32,
}

pub struct Worker {
    pub queue: QueueClient,
    pub breaker: Arc<CircuitBreaker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub webhook: Arc<WebhookClient>,
    pub bearer_token: Arc<dyn Fn() -> String + Send + Sync>,
    pub inflight: Arc<Semaphore>,
    pub config: WorkerConfig,
}

impl Worker {
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let processing_list = keys::processing_list("forwarder", &self.config.worker_id);
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                staged = self.queue.atomic_stage(keys::ALERT_QUEUE, &processing_list, Duration::from_secs(5)) => {
                    match staged {
                        Ok(Some(payload)) => self.handle_one(&processing_list, payload).await,
                        Ok(None) => {}
                        Err(error) => {
                            tracing::error!(%error, "failed to stage from alert_queue");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn handle_one(&self, processing_list: &str, payload: Vec<u8>) {
        let mut enriched: EnrichedEvent = match serde_json::from_slice(&payload) {
            Ok(e) => e,
            Err(error) => {
                tracing::warn!(%error, "dropping unparseable message from alert_queue");
                self.dlq(serde_json::Value::Null, "parse_error", &error.to_string(), 0).await;
                let _ = self.queue.ack(processing_list, &payload).await;
                return;
            }
        };

        if !matches!(self.breaker.allow().await, Ok(true)) {
            tracing::warn!("breaker open, requeuing delivery to head");
            mutt_observability::set_breaker_state("moog", mutt_breaker::BreakerState::Open.as_gauge_value());
            let _ = self.queue.requeue_head(keys::ALERT_QUEUE, &payload).await;
            let _ = self.queue.ack(processing_list, &payload).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            return;
        }

        if !matches!(self.rate_limiter.try_acquire().await, Ok(true)) {
            let _ = self.queue.requeue_head(keys::ALERT_QUEUE, &payload).await;
            let _ = self.queue.ack(processing_list, &payload).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            return;
        }

        let _permit = self.inflight.clone().acquire_owned().await.ok();

        let correlation_id = enriched.event.correlation_id.clone().unwrap_or_default();
        let class = enriched.annotations.team_assignment.clone().unwrap_or_else(|| "unassigned".to_string());
        let r#type = enriched.event.trap_oid.clone().unwrap_or_else(|| "syslog".to_string());
        let alert = MoogAlert::new(
            enriched.event.hostname.clone(),
            enriched.event.message.clone(),
            severity_for(&enriched),
            class,
            r#type,
            enriched.event.timestamp,
            correlation_id,
        );

        let outcome = self.webhook.send(&alert, Some(&(self.bearer_token)())).await;
        self.record_outcome(&mut enriched, &payload, processing_list, outcome).await;
    }

    async fn record_outcome(&self, enriched: &mut EnrichedEvent, raw_payload: &[u8], processing_list: &str, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => {
                let _ = self.breaker.record_success().await;
                mutt_observability::record_request("forwarder", "delivered", "ok");
            }
            DeliveryOutcome::ClientError(status) => {
                // Left untouched: a 4xx is a permanently-rejected payload,
                // not a signal about Moog's health, so the breaker's
                // failure count must not move either way.
                mutt_observability::record_request("forwarder", "rejected", "client_error");
                tracing::error!(status, "moog rejected alert permanently, sending to dlq");
                self.dlq(serde_json::to_value(&*enriched).unwrap_or(serde_json::Value::Null), "client_error", &format!("status {status}"), enriched.annotations.retry_count).await;
            }
            DeliveryOutcome::ServerError(status) => {
                let _ = self.breaker.record_failure().await;
                mutt_observability::record_request("forwarder", "error", "server_error");
                self.retry_or_dlq(enriched, &format!("moog server error {status}")).await;
            }
            DeliveryOutcome::Timeout => {
                let _ = self.breaker.record_failure().await;
                mutt_observability::record_request("forwarder", "error", "timeout");
                self.retry_or_dlq(enriched, "moog request timed out").await;
            }
            DeliveryOutcome::ConnectionFailed => {
                let _ = self.breaker.record_failure().await;
                mutt_observability::record_request("forwarder", "error", "connection_failed");
                self.retry_or_dlq(enriched, "moog connection failed").await;
            }
        }
        let _ = self.queue.ack(processing_list, raw_payload).await;
    }

    async fn retry_or_dlq(&self, enriched: &mut EnrichedEvent, error: &str) {
        enriched.annotations.retry_count += 1;
        enriched.annotations.last_error = Some(error.to_string());
        let retry_count = enriched.annotations.retry_count;

        if retry_count >= self.config.max_retries {
            tracing::error!(retry_count, error, "delivery exhausted retries, sending to dlq");
            self.dlq(serde_json::to_value(&*enriched).unwrap_or(serde_json::Value::Null), "max_retries", error, retry_count).await;
            return;
        }

        let delay = deliverer_backoff(retry_count);
        tracing::warn!(retry_count, error, delay_ms = delay.as_millis() as u64, "requeuing delivery after backoff");
        tokio::time::sleep(delay).await;
        if let Ok(bytes) = serde_json::to_vec(enriched) {
            let _ = self.queue.requeue_head(keys::ALERT_QUEUE, &bytes).await;
        }
    }

    async fn dlq(&self, payload: serde_json::Value, error_type: &str, error_message: &str, retry_count: u32) {
        let entry = DlqEntry::new(payload, error_type, error_message, retry_count);
        if let Ok(bytes) = serde_json::to_vec(&entry) {
            let _ = self.queue.enqueue(keys::DLQ_MOOG, &bytes).await;
        }
    }
}

/// Moog's severity key is the event's own `syslog_severity`, not a
/// label derived from handling; events with no syslog severity (e.g.
/// SNMP traps) fall back to 5.
fn severity_for(enriched: &EnrichedEvent) -> u8 {
    enriched.event.syslog_severity.unwrap_or(5)
}
