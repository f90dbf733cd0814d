//! The dynamic configuration cache: values writable at runtime through the
//! Admin API (rule cache reload interval, thresholds, retry counts, …)
//! without restarting any service.
//!
//! Each instance keeps a local, TTL-bounded cache so a burst of lookups
//! doesn't turn into a burst of substrate round-trips, but also
//! subscribes to the `config.updates` topic so a write from the Admin API
//! invalidates the relevant entry everywhere within one pub/sub hop
//! rather than waiting out the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use mutt_queue::{keys, QueueClient};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

type InvalidationCallback = Box<dyn Fn(&str) + Send + Sync>;

struct CacheEntry {
    value: Value,
    fetched_at: Instant,
}

/// Shared, clonable handle onto one service's dynamic config cache.
#[derive(Clone)]
pub struct DynamicConfigClient {
    queue: QueueClient,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    callbacks: Arc<RwLock<Vec<InvalidationCallback>>>,
}

impl DynamicConfigClient {
    pub fn new(queue: QueueClient, ttl: Duration) -> Self {
        Self {
            queue,
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Read `name`, deserializing into `T`, falling back to `default` if
    /// the key has never been set. A fresh cache hit never touches the
    /// substrate.
    pub async fn get<T: DeserializeOwned>(&self, name: &str, default: T) -> T
    where
        T: serde::Serialize,
    {
        if let Some(value) = self.cached_value(name) {
            if let Ok(parsed) = serde_json::from_value(value) {
                return parsed;
            }
        }

        let fetched = match self.queue.get(&keys::config_key(name)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        };

        match fetched {
            Some(value) => {
                self.cache.write().insert(
                    name.to_string(),
                    CacheEntry { value: serde_json::to_value(&value).unwrap_or(Value::Null), fetched_at: Instant::now() },
                );
                value
            }
            None => default,
        }
    }

    fn cached_value(&self, name: &str) -> Option<Value> {
        let cache = self.cache.read();
        let entry = cache.get(name)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Register a callback invoked (with the changed key's name) whenever
    /// an invalidation arrives over `config.updates`. Used by services
    /// that hold a derived cache (rule/dev-host/team ArcSwaps) on top of
    /// a raw dynamic value.
    pub fn on_invalidate(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.callbacks.write().push(Box::new(callback));
    }

    fn invalidate(&self, name: &str) {
        self.cache.write().remove(name);
        for callback in self.callbacks.read().iter() {
            callback(name);
        }
    }

    /// Spawn the background subscriber. Held for the service's lifetime;
    /// dropping the handle does not stop the task.
    pub fn spawn_subscriber(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.queue.subscribe(keys::CONFIG_UPDATES_TOPIC).await {
                    Ok(mut stream) => {
                        while let Some(payload) = stream.next().await {
                            self.invalidate(payload.trim());
                        }
                        tracing::warn!("config.updates subscription stream ended, resubscribing");
                    }
                    Err(error) => {
                        tracing::warn!(%error, "failed to subscribe to config.updates, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_respects_ttl_elapsed_check() {
        let entry = CacheEntry { value: Value::from(42), fetched_at: Instant::now() };
        assert!(entry.fetched_at.elapsed() < Duration::from_secs(1));
    }
}
