//! HTTP ingest: authenticate, validate, stamp, admission-control, enqueue.
//! Never touches `mutt-db` directly — the only stateful collaborator is
//! the substrate and, at startup and on renewal, the secrets broker.

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use mutt_config::{load_static_config, DynamicConfigClient};
use mutt_queue::QueueClient;
use mutt_secrets::SecretsClient;

use crate::state::{AppState, INGEST_API_KEY_NAME};

#[derive(Parser, Debug)]
#[command(author, version, about = "MUTT Ingestor")]
struct Args {
    /// Directory containing `.mutt.toml`; defaults to the current directory.
    #[arg(long, env = "MUTT_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mutt_observability::init("mutt-ingestor");
    let args = Args::parse();

    let static_config = load_static_config(&args.config_dir)?;
    let queue = QueueClient::connect(&static_config.substrate.url).await?;

    let secrets = Arc::new(SecretsClient::new([INGEST_API_KEY_NAME], None));
    let _secrets_refresh = secrets.clone().spawn_refresh(Duration::from_secs(60));

    let dynamic_config = Arc::new(DynamicConfigClient::new(queue.clone(), Duration::from_secs(5)));
    let _config_subscriber = dynamic_config.clone().spawn_subscriber();

    let state = AppState {
        queue,
        secrets,
        dynamic_config,
        static_config: static_config.ingestor.clone(),
    };

    let app = Router::new()
        .route("/api/v2/ingest", axum::routing::post(handlers::ingest))
        .route("/health", get(handlers::health))
        .route("/metrics", get(mutt_observability::metrics_handler))
        .with_state(state);

    let listener = TcpListener::bind(&static_config.ingestor.bind_addr).await?;
    tracing::info!(addr = %static_config.ingestor.bind_addr, "mutt-ingestor listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
    tracing::info!("shutdown signal received, draining in-flight requests");
}
