//! Deliverer worker: forwards classified alerts to Moog behind a shared
//! circuit breaker and rate limiter, with bounded concurrent in-flight
//! HTTP calls.

mod heartbeat;
mod janitor;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use mutt_breaker::{BreakerConfig, CircuitBreaker};
use mutt_config::load_static_config;
use mutt_queue::QueueClient;
use mutt_ratelimit::{RateLimitConfig, RateLimiter};
use mutt_secrets::SecretsClient;
use mutt_webhook::WebhookClient;

use crate::worker::{Worker, WorkerConfig};

const MOOG_WEBHOOK_TOKEN_NAME: &str = "moog_webhook_bearer_token";

#[derive(Parser, Debug)]
#[command(author, version, about = "MUTT Deliverer (Forwarder)")]
struct Args {
    #[arg(long, env = "MUTT_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
    #[arg(long, env = "MUTT_WORKER_ID", default_value = "default")]
    worker_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mutt_observability::init("mutt-forwarder");
    let args = Args::parse();

    let static_config = load_static_config(&args.config_dir)?;
    let queue = QueueClient::connect(&static_config.substrate.url).await?;

    let secrets = Arc::new(SecretsClient::new([MOOG_WEBHOOK_TOKEN_NAME], None));
    let _secrets_refresh = secrets.clone().spawn_refresh(std::time::Duration::from_secs(60));
    let bearer_secrets = secrets.clone();
    let bearer_token: Arc<dyn Fn() -> String + Send + Sync> =
        Arc::new(move || bearer_secrets.get(MOOG_WEBHOOK_TOKEN_NAME).current.clone().unwrap_or_default());

    let breaker = Arc::new(CircuitBreaker::new(
        "moog",
        queue.clone(),
        BreakerConfig {
            failure_threshold: static_config.deliverer.breaker_failure_threshold,
            open_duration: static_config.deliverer.breaker_open_duration,
        },
    ));
    let rate_limiter = Arc::new(RateLimiter::new(
        mutt_queue::keys::RATE_LIMIT_MOOG,
        queue.clone(),
        RateLimitConfig {
            window: static_config.deliverer.rate_limit_window,
            max_requests: static_config.deliverer.rate_limit_max_requests,
        },
    ));
    let webhook = Arc::new(WebhookClient::new(
        static_config.deliverer.moog_webhook_url.clone(),
        static_config.deliverer.moog_webhook_timeout,
    ));
    let inflight = Arc::new(Semaphore::new(static_config.deliverer.moog_max_inflight));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker = Worker {
        queue: queue.clone(),
        breaker,
        rate_limiter,
        webhook,
        bearer_token,
        inflight,
        config: WorkerConfig {
            worker_id: args.worker_id.clone(),
            max_retries: static_config.deliverer.moog_max_retries,
        },
    };

    let heartbeat_task = heartbeat::spawn(queue.clone(), args.worker_id.clone(), shutdown_rx.clone());
    let janitor_task = janitor::spawn(queue.clone(), static_config.deliverer.janitor_interval, shutdown_rx.clone());

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(mutt_observability::metrics_handler))
        .with_state(queue.clone());
    let listener = TcpListener::bind(&static_config.deliverer.bind_addr).await?;
    tracing::info!(addr = %static_config.deliverer.bind_addr, "mutt-forwarder health/metrics listening");
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
    match queue.depth(mutt_queue::keys::ALERT_QUEUE).await {
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
