//! Remediator: on a fixed interval, replays dead-lettered events back
//! onto their originating queue once their spacing window has elapsed,
//! and quarantines what still fails after the configured retry ceiling.

mod health_probe;
mod replay;

use std::path::PathBuf;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use mutt_config::load_static_config;
use mutt_queue::QueueClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "MUTT Remediator")]
struct Args {
    #[arg(long, env = "MUTT_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mutt_observability::init("mutt-remediator");
    let args = Args::parse();

    let static_config = load_static_config(&args.config_dir)?;
    let queue = QueueClient::connect(&static_config.substrate.url).await?;
    let http = reqwest::Client::new();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let app = Router::new()
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route("/metrics", get(mutt_observability::metrics_handler));
    let listener = TcpListener::bind(&static_config.remediator.bind_addr).await?;
    tracing::info!(addr = %static_config.remediator.bind_addr, "mutt-remediator health/metrics listening");
    let http_task = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let remediator_config = static_config.remediator.clone();
    let deliverer_config = static_config.deliverer.clone();
    let scan_queue = queue.clone();
    let scan_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(remediator_config.scan_interval);
        let mut stop = shutdown_rx;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    replay::replay_batch(&scan_queue, &replay::ALERTER_DLQ, remediator_config.dlq_batch_size, remediator_config.max_retries, true).await;

                    let moog_healthy = health_probe::moog_reachable(
                        &http,
                        &deliverer_config.moog_webhook_url,
                        remediator_config.moog_health_probe_timeout,
                    ).await;
                    replay::replay_batch(&scan_queue, &replay::MOOG_DLQ, remediator_config.dlq_batch_size, remediator_config.max_retries, moog_healthy).await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    });

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    http_task.abort();
    let _ = scan_task.await;

    Ok(())
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
