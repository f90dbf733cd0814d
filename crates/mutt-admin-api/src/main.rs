//! Admin API: the authenticated write path for rules, dev-hosts, teams,
//! and dynamic config, plus two thin read contracts (audit log, SLO).

mod audit;
mod auth;
mod config;
mod error;
mod hosts;
mod rules;
mod slo;
mod state;
mod store;
mod teams;
mod util;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, put};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;

use mutt_config::load_static_config;
use mutt_queue::QueueClient;
use mutt_secrets::SecretsClient;

use crate::state::{AppState, ADMIN_API_KEY_NAME};

#[derive(Parser, Debug)]
#[command(author, version, about = "MUTT Admin API")]
struct Args {
    #[arg(long, env = "MUTT_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mutt_observability::init("mutt-admin-api");
    let args = Args::parse();

    let static_config = load_static_config(&args.config_dir)?;
    let queue = QueueClient::connect(&static_config.substrate.url).await?;
    let pool = mutt_db::connect(&static_config.database.url, static_config.database.max_connections).await?;
    mutt_db::run_migrations(&pool).await?;

    let secrets = Arc::new(SecretsClient::new([ADMIN_API_KEY_NAME], None));
    let _secrets_refresh = secrets.clone().spawn_refresh(Duration::from_secs(60));

    let state = AppState { pool, queue, secrets };

    let app = Router::new()
        .route("/api/v2/rules", get(rules::list).post(rules::create))
        .route("/api/v2/rules/:id", get(rules::get).put(rules::update).delete(rules::deactivate))
        .route("/api/v2/dev-hosts", get(hosts::list).post(hosts::add))
        .route("/api/v2/dev-hosts/:hostname", delete(hosts::remove))
        .route("/api/v2/teams", get(teams::list).post(teams::create))
        .route("/api/v2/teams/:id", put(teams::update).delete(teams::remove))
        .route("/api/v2/audit-logs", get(audit::list))
        .route("/api/v1/config/:name", get(config::get).put(config::put))
        .route("/api/v1/slo", get(slo::get))
        .route("/health", get(health))
        .route("/metrics", get(mutt_observability::metrics_handler))
        .with_state(state);

    let listener = TcpListener::bind(&static_config.admin_api.bind_addr).await?;
    tracing::info!(addr = %static_config.admin_api.bind_addr, "mutt-admin-api listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn health() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
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
