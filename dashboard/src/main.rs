mod config;

use clap::Parser;
use config::{Config, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use projects::{LocalClient, ProjectsClient};
use shared::admin_service::{AdminService, Readiness};
use shared::http::run_http_service;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(version, about = "Runs the dashboard control plane")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short, default_value = "dashboard.yaml")]
    config: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum DashboardError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not set up projects: {0}")]
    ProjectsConfig(#[from] projects::ConfigError),
    #[error("could not initialize projects: {0}")]
    Projects(#[from] projects::ProjectsError),
}

fn init_sentry(config: &LoggingConfig) -> sentry::ClientInitGuard {
    sentry::init((
        config.sentry_dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ))
}

fn init_tracing(with_sentry: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let sentry_layer = with_sentry.then(|| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .init();
}

fn init_metrics(config: &MetricsConfig) -> Result<(), DashboardError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some("dashboard"))
        .map_err(|e| DashboardError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| DashboardError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(projects::metrics_defs::ALL_METRICS);
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Sending metrics to statsd"
    );
    Ok(())
}

async fn run(config: Config) -> Result<(), DashboardError> {
    let store: Arc<dyn ProjectsClient> = Arc::new(LocalClient::new());
    let projects = projects::new_client(config.projects_leader.as_ref(), store)?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {e}"),
            }
            shutdown.cancel();
        }
    });

    let readiness = Readiness::new();
    let admin = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<DashboardError>::new(readiness.clone()),
        shutdown.clone().cancelled_owned(),
    );
    tokio::pin!(admin);

    // Liveness is served while projects initialize; readiness only afterwards
    let started = tokio::select! {
        served = &mut admin => Err(served),
        initialized = projects.initialize() => Ok(initialized),
    };

    let result = match started {
        Err(served) => served,
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(())) => {
            readiness.set_ready(true);
            tracing::info!("Dashboard ready");
            admin.await
        }
    };

    readiness.set_ready(false);
    projects.shutdown().await;
    tracing::info!("Dashboard stopped");
    result
}

#[tokio::main]
async fn main() -> Result<(), DashboardError> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    let _sentry = config.logging.as_ref().map(init_sentry);
    init_tracing(config.logging.is_some());

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    run(config).await
}
