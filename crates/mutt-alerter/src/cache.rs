//! The Classifier's read-mostly view of rules, dev hosts, and team
//! overrides. Rebuilt wholesale on every refresh and swapped in behind an
//! [`arc_swap::ArcSwap`] so a worker mid-match never observes a partially
//! rebuilt snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use mutt_types::{sort_for_matching, Rule};
use sqlx::PgPool;

pub struct ClassifierCache {
    pub rules: Vec<Rule>,
    pub dev_hosts: HashSet<String>,
    pub host_team: HashMap<String, String>,
}

impl ClassifierCache {
    async fn load(pool: &PgPool) -> anyhow::Result<Self> {
        let mut rules = mutt_db::list_active_rules(pool).await?;
        sort_for_matching(&mut rules);

        let dev_hosts = mutt_db::list_dev_hosts(pool)
            .await?
            .into_iter()
            .map(|h| h.hostname)
            .collect();

        let host_team = mutt_db::list_device_teams(pool)
            .await?
            .into_iter()
            .map(|t| (t.device_pattern, t.team))
            .collect();

        Ok(Self { rules, dev_hosts, host_team })
    }
}

/// Shared handle to the current cache snapshot, plus the machinery to
/// keep it fresh.
#[derive(Clone)]
pub struct CacheHandle {
    inner: Arc<ArcSwap<ClassifierCache>>,
    pool: PgPool,
}

impl CacheHandle {
    pub async fn load(pool: PgPool) -> anyhow::Result<Self> {
        let cache = ClassifierCache::load(&pool).await?;
        Ok(Self { inner: Arc::new(ArcSwap::from_pointee(cache)), pool })
    }

    pub fn current(&self) -> Arc<ClassifierCache> {
        self.inner.load_full()
    }

    async fn reload(&self) {
        match ClassifierCache::load(&self.pool).await {
            Ok(fresh) => {
                let rule_count = fresh.rules.len();
                self.inner.store(Arc::new(fresh));
                tracing::info!(rule_count, "classifier cache reloaded");
            }
            Err(error) => {
                tracing::error!(%error, "classifier cache reload failed, keeping previous snapshot");
            }
        }
    }

    /// Spawn the periodic reload loop. Also exposes an immediate-reload
    /// trigger via the returned `tokio::sync::mpsc::Sender`, wired up by
    /// the caller to the dynamic-config invalidation callback so a
    /// `rules`/`dev_hosts`/`device_teams` write is reflected without
    /// waiting out the interval.
    pub fn spawn_refresh(self, interval: Duration) -> (tokio::task::JoinHandle<()>, tokio::sync::mpsc::Sender<()>) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(8);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.reload().await,
                    signal = rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        self.reload().await;
                    }
                }
            }
        });
        (handle, tx)
    }
}
