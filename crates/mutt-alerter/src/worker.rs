//! The Classifier's stage loop: one `BLMOVE` away from raw events, one
//! matched rule and one audit row away from a decision, at most one DLQ
//! push away from never blocking the queue on a single bad message.

use std::time::Duration;

use mutt_queue::{keys, QueueClient};
use mutt_retry::BackoffConfig;
use mutt_types::{DlqEntry, EnrichedEvent, EventAuditRow, Rule};
use sqlx::PgPool;

use crate::cache::CacheHandle;
use crate::unhandled;

pub struct WorkerConfig {
    pub worker_id: String,
    pub max_retries: u32,
    pub warn_threshold: u64,
    pub shed_threshold: u64,
    pub defer_sleep: Duration,
}

pub struct Worker {
    pub queue: QueueClient,
    pub db: PgPool,
    pub cache: CacheHandle,
    pub config: WorkerConfig,
}

impl Worker {
    /// Run until `shutdown` resolves. Every exit path from one loop
    /// iteration removes the message from the processing list — the
    /// janitor only needs to worry about a crashed worker, never a
    /// worker that finished an iteration uncleanly.
    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let processing_list = keys::processing_list("alerter", &self.config.worker_id);
        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(mode) = self.check_backpressure().await {
                match mode {
                    BackpressureMode::Defer => {
                        tokio::time::sleep(self.config.defer_sleep).await;
                    }
                    BackpressureMode::Shed => {
                        self.shed_oldest().await;
                    }
                }
                continue;
            }

            tokio::select! {
                staged = self.queue.atomic_stage(keys::RAW_QUEUE, &processing_list, Duration::from_secs(5)) => {
                    match staged {
                        Ok(Some(payload)) => self.handle_one(&processing_list, payload).await,
                        Ok(None) => {}
                        Err(error) => {
                            tracing::error!(%error, "failed to stage from raw_queue");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn check_backpressure(&self) -> Result<(), BackpressureMode> {
        let depth = self.queue.depth(keys::RAW_QUEUE).await.unwrap_or(0);
        if depth >= self.config.shed_threshold {
            mutt_observability::record_shed("alerter");
            tracing::warn!(depth, mode = "dlq", "raw_queue over shed_threshold");
            return Err(BackpressureMode::Shed);
        }
        if depth >= self.config.warn_threshold {
            tracing::warn!(depth, mode = "defer", "raw_queue over warn_threshold");
            return Err(BackpressureMode::Defer);
        }
        Ok(())
    }

    async fn shed_oldest(&self) {
        if let Ok(Some(payload)) = self.queue.atomic_stage(keys::RAW_QUEUE, keys::DLQ_ALERTER, Duration::from_millis(10)).await {
            let value: serde_json::Value = serde_json::from_slice(&payload).unwrap_or(serde_json::Value::Null);
            let entry = DlqEntry::new(value, "shed", "rejected under backpressure", 0);
            if let Ok(bytes) = serde_json::to_vec(&entry) {
                let _ = self.queue.ack(keys::DLQ_ALERTER, &payload).await;
                let _ = self.queue.enqueue(keys::DLQ_ALERTER, &bytes).await;
            }
        }
    }

    async fn handle_one(&self, processing_list: &str, payload: Vec<u8>) {
        let correlation_id_for_log;
        let mut enriched: EnrichedEvent = match serde_json::from_slice(&payload) {
            Ok(e) => e,
            Err(error) => {
                tracing::warn!(%error, "dropping unparseable message from raw_queue");
                self.dlq("parse_error", &error.to_string(), &payload, 0).await;
                let _ = self.queue.ack(processing_list, &payload).await;
                return;
            }
        };
        correlation_id_for_log = enriched.correlation_id().unwrap_or_default().to_string();

        if let Err(error) = self.classify_and_forward(&mut enriched).await {
            match error {
                ClassifyError::AuditWrite(error) => {
                    // The audit write already exhausted its own 3 attempts;
                    // re-entering classify-and-forward would re-match the
                    // rule and retry the write again, up to 3x more DB
                    // attempts per outer retry. DLQ immediately instead.
                    tracing::error!(correlation_id = %correlation_id_for_log, %error, "event audit write exhausted retries, sending to dlq");
                    enriched.annotations.last_error = Some(error.to_string());
                    let value = serde_json::to_value(&enriched).unwrap_or(serde_json::Value::Null);
                    let entry = DlqEntry::new(value, "audit_write_failed", &error.to_string(), enriched.annotations.retry_count);
                    if let Ok(bytes) = serde_json::to_vec(&entry) {
                        let _ = self.queue.enqueue(keys::DLQ_ALERTER, &bytes).await;
                    }
                }
                ClassifyError::Other(error) => {
                    enriched.annotations.retry_count += 1;
                    enriched.annotations.last_error = Some(error.to_string());
                    let retry_count = enriched.annotations.retry_count;

                    if retry_count >= self.config.max_retries {
                        tracing::error!(correlation_id = %correlation_id_for_log, %error, retry_count, "classification exhausted retries, sending to dlq");
                        let value = serde_json::to_value(&enriched).unwrap_or(serde_json::Value::Null);
                        let entry = DlqEntry::new(value, "classification_failed", &error.to_string(), retry_count);
                        if let Ok(bytes) = serde_json::to_vec(&entry) {
                            let _ = self.queue.enqueue(keys::DLQ_ALERTER, &bytes).await;
                        }
                    } else {
                        let delay = mutt_retry::calculate_delay(&BackoffConfig::default(), retry_count);
                        tracing::warn!(correlation_id = %correlation_id_for_log, %error, retry_count, delay_ms = delay.as_millis() as u64, "retrying classification after backoff");
                        tokio::time::sleep(delay).await;
                        if let Ok(bytes) = serde_json::to_vec(&enriched) {
                            let _ = self.queue.enqueue(keys::RAW_QUEUE, &bytes).await;
                        }
                    }
                }
            }
        }

        let _ = self.queue.ack(processing_list, &payload).await;
    }

    async fn dlq(&self, error_type: &str, error_message: &str, raw_payload: &[u8], retry_count: u32) {
        let value: serde_json::Value = serde_json::from_slice(raw_payload).unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(raw_payload).to_string()));
        let entry = DlqEntry::new(value, error_type, error_message, retry_count);
        if let Ok(bytes) = serde_json::to_vec(&entry) {
            let _ = self.queue.enqueue(keys::DLQ_ALERTER, &bytes).await;
        }
    }

    async fn classify_and_forward(&self, enriched: &mut EnrichedEvent) -> Result<(), ClassifyError> {
        let cache = self.cache.current();
        let event = &enriched.event;

        let matched: &Rule = cache
            .rules
            .iter()
            .find(|r| r.r#match.matches(&event.message, event.trap_oid.as_deref()))
            .unwrap_or(&cache.rules[cache.rules.len() - 1]);

        let is_dev = cache.dev_hosts.contains(&event.hostname);
        let (handling_str, forwards): (&'static str, bool) = if is_dev {
            (dev_handling_str(matched.dev_handling), matched.dev_handling.forwards())
        } else {
            (prod_handling_str(matched.prod_handling), matched.prod_handling.forwards())
        };

        let team = cache
            .host_team
            .get(&event.hostname)
            .cloned()
            .unwrap_or_else(|| matched.team_assignment.clone());

        enriched.annotations.matched_rule_id = Some(matched.id);
        enriched.annotations.team_assignment = Some(team.clone());
        enriched.annotations.handling = Some(handling_str.to_string());
        enriched.annotations.is_dev = is_dev;

        let audit_row = EventAuditRow {
            event_time: event.timestamp,
            hostname: event.hostname.clone(),
            matched_rule_id: Some(matched.id),
            handling: handling_str.to_string(),
            forwarded: forwards,
            correlation_id: event.correlation_id.clone(),
            raw_event: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        };
        self.write_audit_with_retries(&audit_row).await.map_err(ClassifyError::AuditWrite)?;

        if forwards {
            let bytes = serde_json::to_vec(enriched).map_err(|e| ClassifyError::Other(e.into()))?;
            self.queue.enqueue(keys::ALERT_QUEUE, &bytes).await.map_err(|e| ClassifyError::Other(e.into()))?;
        }

        if matched.id == mutt_types::DEFAULT_RULE_ID {
            let signature = unhandled::source_signature(&event.hostname, &event.message);
            if let Ok(first_seen) = unhandled::record_occurrence(&self.queue, &signature).await {
                if first_seen {
                    self.emit_meta_alert(&event.hostname, &event.message, &signature).await;
                }
            }
        }

        Ok(())
    }

    async fn write_audit_with_retries(&self, row: &EventAuditRow) -> anyhow::Result<()> {
        const ATTEMPTS: u32 = 3;
        let mut last_error = None;
        for attempt in 1..=ATTEMPTS {
            match mutt_db::insert_event_audit(&self.db, row).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::warn!(attempt, %error, "event audit write failed");
                    last_error = Some(error);
                    if attempt < ATTEMPTS {
                        let delay = mutt_retry::calculate_delay(&BackoffConfig::default(), attempt);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(anyhow::anyhow!("audit_write_failed: {}", last_error.map(|e| e.to_string()).unwrap_or_default()))
    }

    async fn emit_meta_alert(&self, hostname: &str, message: &str, signature: &str) {
        tracing::warn!(hostname, signature, "first occurrence of an unhandled event pattern");
        let meta_event = mutt_types::Event {
            timestamp: chrono::Utc::now(),
            hostname: "mutt-alerter".to_string(),
            message: format!("Unhandled event pattern from {hostname} (signature {signature}): {}", message.chars().take(120).collect::<String>()),
            source: None,
            syslog_severity: None,
            trap_oid: None,
            correlation_id: Some(uuid::Uuid::new_v4().to_string()),
            ingestion_timestamp: Some(chrono::Utc::now()),
            extra: Default::default(),
        };
        let mut enriched = EnrichedEvent::new(meta_event);
        enriched.annotations.handling = Some("ticket_only".to_string());
        enriched.annotations.team_assignment = Some("platform".to_string());
        if let Ok(bytes) = serde_json::to_vec(&enriched) {
            let _ = self.queue.enqueue(keys::ALERT_QUEUE, &bytes).await;
        }
    }
}

enum BackpressureMode {
    Defer,
    Shed,
}

/// Distinguishes "the audit write itself is the thing that failed" from
/// every other classify-and-forward failure, so `handle_one` can route
/// the former straight to the DLQ instead of re-entering the outer
/// classification retry loop (which would re-run the audit write too).
enum ClassifyError {
    AuditWrite(anyhow::Error),
    Other(anyhow::Error),
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyError::AuditWrite(error) | ClassifyError::Other(error) => write!(f, "{error}"),
        }
    }
}

fn prod_handling_str(h: mutt_types::Handling) -> &'static str {
    match h {
        mutt_types::Handling::PageAndTicket => "page_and_ticket",
        mutt_types::Handling::TicketOnly => "ticket_only",
        mutt_types::Handling::EmailOnly => "email_only",
        mutt_types::Handling::LogOnly => "log_only",
    }
}

fn dev_handling_str(h: mutt_types::DevHandling) -> &'static str {
    match h {
        mutt_types::DevHandling::TicketOnly => "ticket_only",
        mutt_types::DevHandling::EmailOnly => "email_only",
        mutt_types::DevHandling::LogOnly => "log_only",
        mutt_types::DevHandling::Suppress => "suppress",
    }
}
