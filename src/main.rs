use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use triage_bot::config::{AppConfig, AppConfigError};
use triage_bot::engine::{Engine, EventWorker};
use triage_bot::github::OctocrabClient;
use triage_bot::rules::{ConfigError, RuleSet};
use triage_bot::scheduler::Scheduler;
use triage_bot::server::{AppState, build_router};
use triage_bot::webhooks::WebhookSecret;

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] AppConfigError),

    #[error("failed to load {}: {source}", .path.display())]
    Rules { path: PathBuf, source: ConfigError },

    #[error("failed to build GitHub client: {0}")]
    GitHub(#[from] octocrab::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "triage_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "exiting");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;

    let rules = RuleSet::load(&config.rules_path).map_err(|source| StartupError::Rules {
        path: config.rules_path.clone(),
        source,
    })?;
    info!(path = %config.rules_path.display(), "rules loaded");

    let octocrab = OctocrabClient::build_octocrab(config.github_token.clone())?;

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(shutdown.child_token());
    let engine = Engine::new(Arc::new(rules), scheduler.clone(), config.engine.executor);
    let worker = EventWorker::spawn(engine, config.engine.queue_capacity, &shutdown);

    let app_state = AppState::new(
        WebhookSecret::new(config.webhook_secret),
        octocrab,
        worker,
        scheduler.clone(),
    );
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    info!("listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            signal.cancel();
        })
        .await
        .map_err(StartupError::Serve)?;

    // Delayed actions are not persisted; anything still pending is dropped.
    let dropped = scheduler.pending_count();
    scheduler.shutdown();
    info!(dropped, "stopped");
    Ok(())
}
