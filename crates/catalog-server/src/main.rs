use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use catalog_server::auth::RandomDelay;
use catalog_server::config::Settings;
use catalog_server::state::AppState;
use catalog_server::{routes, telemetry};
use catalog_store::CatalogStore;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const LISTEN_ADDR: &str = "0.0.0.0:9000";

#[derive(Parser)]
#[command(name = "catalog-server", about = "Instrumented record-catalog service")]
struct Args {
    /// Append JSON logs to this file instead of stdout
    #[arg(long)]
    logfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = Settings::load().context("invalid configuration")?;

    // Process-level logs; request-correlated entries go through the
    // CorrelatedLogger below.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let logger = Arc::new(
        telemetry::CorrelatedLogger::from_options(args.logfile.as_deref(), tracing::Level::INFO)
            .with_context(|| {
                format!(
                    "unable to open log file: {}",
                    args.logfile
                        .as_deref()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default()
                )
            })?,
    );

    let otel = telemetry::init_telemetry(&settings.otel_service_name)
        .context("telemetry initialization failed")?;

    let store = CatalogStore::connect(&settings.database_url(), otel.tracer.clone())
        .context("invalid database config")?;
    store
        .init()
        .await
        .context("unable to connect to database")?;

    let state = AppState {
        store,
        tracer: otel.tracer.clone(),
        logger,
        auth_attempts: otel.auth_attempts.clone(),
        delay: Arc::new(RandomDelay::new()),
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!(addr = LISTEN_ADDR, "catalog server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Bounded chance for both providers to flush; failing to flush
    // cleanly is a fatal shutdown error.
    otel.guard
        .shutdown()
        .context("telemetry shutdown failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
