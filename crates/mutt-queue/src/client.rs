//! Async substrate client built on a Redis-compatible store.
//!
//! Every primitive here maps directly to one from `spec.md` §4.1. The
//! crash-safety requirement ("crash between the two sides is not
//! possible") is met by using single atomic server commands (`BLMOVE`,
//! `LREM`, `EVALSHA`) rather than client-side read-then-write pairs.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, FromRedisValue, Script, ToRedisArgs};
use tokio_stream::{Stream, StreamExt};

use crate::error::{QueueError, QueueResult};

/// A connected substrate client. Cheap to clone — `ConnectionManager`
/// multiplexes every caller over one connection and reconnects
/// transparently, so a single `QueueClient` is shared across every task
/// in a worker process.
#[derive(Clone)]
pub struct QueueClient {
    client: Client,
    conn: ConnectionManager,
}

impl QueueClient {
    pub async fn connect(url: &str) -> QueueResult<Self> {
        let client = Client::open(url).map_err(QueueError::from)?;
        let conn = client.get_connection_manager().await.map_err(QueueError::from)?;
        Ok(Self { client, conn })
    }

    /// Append `payload` to the tail of `list` — new work, or a retry
    /// that should go to the back of the line.
    pub async fn enqueue(&self, list: &str, payload: &[u8]) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(list, payload).await.map_err(QueueError::from)?;
        Ok(())
    }

    /// Push to the head of `list` — a retry that should be reprocessed
    /// ahead of newer arrivals.
    pub async fn requeue_head(&self, list: &str, payload: &[u8]) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(list, payload).await.map_err(QueueError::from)?;
        Ok(())
    }

    /// Blocking pop-from-head-of-`src` and push-to-tail-of-`stage` as one
    /// atomic step. Returns `None` on timeout (no work available) rather
    /// than an error — callers should treat that as "loop again", not a
    /// substrate failure.
    pub async fn atomic_stage(
        &self,
        src: &str,
        stage: &str,
        timeout: Duration,
    ) -> QueueResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result: Option<Vec<u8>> = redis::cmd("BLMOVE")
            .arg(src)
            .arg(stage)
            .arg("LEFT")
            .arg("RIGHT")
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(QueueError::from)?;
        Ok(result)
    }

    /// Remove the first occurrence of `payload` from `stage_list` — the
    /// ack for a message successfully staged and handled.
    pub async fn ack(&self, stage_list: &str, payload: &[u8]) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(stage_list, 1, payload).await.map_err(QueueError::from)?;
        Ok(())
    }

    pub async fn depth(&self, list: &str) -> QueueResult<u64> {
        let mut conn = self.conn.clone();
        let n: u64 = conn.llen(list).await.map_err(QueueError::from)?;
        Ok(n)
    }

    /// Every element currently in `list`, head to tail — used by the
    /// janitor to drain a dead peer's processing list and by the
    /// Remediator to walk a DLQ in batches.
    pub async fn list_all(&self, list: &str) -> QueueResult<Vec<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let items: Vec<Vec<u8>> = conn.lrange(list, 0, -1).await.map_err(QueueError::from)?;
        Ok(items)
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs().max(1))
            .await
            .map_err(QueueError::from)?;
        Ok(())
    }

    /// Set with no expiry — used for dynamic config entries, which are
    /// meant to persist until explicitly overwritten rather than age out.
    pub async fn set(&self, key: &str, value: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await.map_err(QueueError::from)?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> QueueResult<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.get(key).await.map_err(QueueError::from)?;
        Ok(v)
    }

    pub async fn delete(&self, key: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await.map_err(QueueError::from)?;
        Ok(())
    }

    /// List every key under `prefix` — used by the janitor to enumerate
    /// `processing.<stage>.*`/`heartbeat.<stage>.*` peers. `SCAN` rather
    /// than `KEYS` so a large peer set doesn't block the substrate.
    pub async fn scan_prefix(&self, prefix: &str) -> QueueResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> =
            conn.scan_match(pattern).await.map_err(QueueError::from)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    pub async fn publish(&self, topic: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(topic, payload).await.map_err(QueueError::from)?;
        Ok(())
    }

    /// Subscribe to `topic`, returning a best-effort, at-least-once
    /// stream of payloads delivered while attached. A dedicated
    /// connection is opened because pub/sub connections can't share the
    /// multiplexed `ConnectionManager`.
    pub async fn subscribe(&self, topic: &str) -> QueueResult<impl Stream<Item = String>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(QueueError::from)?;
        pubsub.subscribe(topic).await.map_err(QueueError::from)?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| msg.get_payload::<String>().ok());
        Ok(stream)
    }

    /// Run a server-side atomic script (`EVALSHA`, falling back to
    /// `EVAL`), used by the shared circuit breaker and rate limiter so
    /// concurrent instances never race on a read-modify-write.
    pub async fn run_atomic_script<T: FromRedisValue>(
        &self,
        script: &Script,
        keys: &[impl ToRedisArgs],
        args: &[impl ToRedisArgs],
    ) -> QueueResult<T> {
        let mut conn = self.conn.clone();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(key);
        }
        for arg in args {
            invocation.arg(arg);
        }
        invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Script(e.to_string()))
    }
}
