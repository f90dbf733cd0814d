//! Classifier worker: stages events from `raw_queue`, matches them
//! against a cached rule set, writes the audit trail, and forwards what
//! should page or ticket onto `alert_queue`.

mod cache;
mod heartbeat;
mod janitor;
mod unhandled;
mod worker;

use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use mutt_config::load_static_config;
use mutt_queue::QueueClient;

use crate::cache::CacheHandle;
use crate::worker::{Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "MUTT Classifier (Alerter)")]
struct Args {
    #[arg(long, env = "MUTT_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
    #[arg(long, env = "MUTT_WORKER_ID", default_value = "default")]
    worker_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mutt_observability::init("mutt-alerter");
    let args = Args::parse();

    let static_config = load_static_config(&args.config_dir)?;
    let queue = QueueClient::connect(&static_config.substrate.url).await?;
    let db = mutt_db::connect(&static_config.database.url, static_config.database.max_connections).await?;
    mutt_db::run_migrations(&db).await?;

    let cache = CacheHandle::load(db.clone()).await?;
    let (_cache_task, reload_tx) = cache.clone().spawn_refresh(static_config.alerter.cache_reload_interval);

    let dynamic_config = std::sync::Arc::new(mutt_config::DynamicConfigClient::new(queue.clone(), std::time::Duration::from_secs(5)));
    {
        let reload_tx = reload_tx.clone();
        dynamic_config.on_invalidate(move |name| {
            if matches!(name, "rules" | "dev_hosts" | "device_teams") {
                let _ = reload_tx.try_send(());
            }
        });
    }
    let _config_subscriber = dynamic_config.clone().spawn_subscriber();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let warn_threshold = dynamic_config.get("warn_threshold", static_config.alerter.warn_threshold).await;
    let shed_threshold = dynamic_config.get("shed_threshold", static_config.alerter.shed_threshold).await;

    let worker = Worker {
        queue: queue.clone(),
        db: db.clone(),
        cache: cache.clone(),
        config: WorkerConfig {
            worker_id: args.worker_id.clone(),
            max_retries: static_config.alerter.max_retries,
            warn_threshold,
            shed_threshold,
            defer_sleep: static_config.alerter.defer_sleep,
        },
    };

    let heartbeat_task = heartbeat::spawn(queue.clone(), args.worker_id.clone(), shutdown_rx.clone());
    let janitor_task = janitor::spawn(queue.clone(), static_config.alerter.janitor_interval, shutdown_rx.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(mutt_observability::metrics_handler))
        .with_state(queue.clone());
    let listener = TcpListener::bind(&static_config.alerter.bind_addr).await?;
    tracing::info!(addr = %static_config.alerter.bind_addr, "mutt-alerter health/metrics listening");
    let http_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    tokio::select! {
        _ = worker.run(shutdown_rx.clone()) => {}
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    http_task.abort();
    let _ = heartbeat_task.await;
    let _ = janitor_task.await;

    Ok(())
}

async fn health(axum::extract::State(queue): axum::extract::State<QueueClient>) -> axum::http::StatusCode {
    match queue.depth(mutt_queue::keys::RAW_QUEUE).await {
        Ok(_) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
