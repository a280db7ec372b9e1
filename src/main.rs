//! Dinner Tonight API service
//!
//! Suggests recipes the user can cook tonight from what is already in their
//! pantry.
//!
//! # Graceful Shutdown
//!
//! The service handles SIGTERM and SIGINT signals, ensuring:
//! - In-flight requests complete
//! - Database connections are closed cleanly

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dinner_tonight::api::{self, AppState};
use dinner_tonight::config::Config;
use dinner_tonight::database::{self, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with structured logging
    init_tracing();

    info!("═══════════════════════════════════════════════════════════════");
    info!("  🍽️  Dinner Tonight v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════════════════════════");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!("✅ Configuration loaded and validated");

    #[cfg(feature = "prometheus")]
    install_metrics_exporter()?;

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Initialize database connection pool; Postgres may still be starting
    let db = Database::connect(&config.database).await?;
    info!("✅ Database connection pool established");

    // Run migrations
    info!("📦 Running database migrations...");
    database::run_migrations(db.pool()).await?;
    info!("✅ Database migrations applied");

    let state = Arc::new(AppState::new(db.clone(), config.suggestions.clone()));

    // Spawn API server
    let mut handles = vec![spawn_api_server(
        state,
        config.clone(),
        shutdown_tx.subscribe(),
    )];

    info!("═══════════════════════════════════════════════════════════════");
    info!("  ✅ Service started");
    info!("  📡 API: http://{}:{}", config.api.host, config.api.port);
    info!(
        "  🔗 Health: http://{}:{}/health",
        config.api.host, config.api.port
    );
    info!("═══════════════════════════════════════════════════════════════");

    // Wait for shutdown signal or service failure
    tokio::select! {
        _ = shutdown_signal() => {
            info!("📴 Shutdown signal received");
        }
        _ = wait_for_any_failure(&mut handles) => {
            warn!("⚠️ A service failed, initiating shutdown");
        }
    }

    info!("🛑 Initiating graceful shutdown...");
    let _ = shutdown_tx.send(());

    let shutdown_timeout = Duration::from_secs(30);
    let outcome = match tokio::time::timeout(shutdown_timeout, shutdown_services(handles)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("⚠️ Shutdown timeout exceeded, forcing exit");
            Ok(())
        }
    };

    db.close().await;

    if let Err(e) = outcome {
        error!("❌ Dinner Tonight stopped after a service failure: {:#}", e);
        return Err(e);
    }

    info!("👋 Dinner Tonight stopped gracefully");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Default log levels
        EnvFilter::new("dinner_tonight=debug,tower_http=debug,sqlx=warn,info")
    });

    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::env::var("NO_COLOR").is_err()),
            )
            .init();
    }
}

#[cfg(feature = "prometheus")]
fn install_metrics_exporter() -> anyhow::Result<()> {
    let port: u16 = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9000);

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    info!("📈 Prometheus metrics on :{}/metrics", port);
    Ok(())
}

type ServiceHandle = JoinHandle<anyhow::Result<()>>;

/// Spawn the API server
fn spawn_api_server(
    state: Arc<AppState>,
    config: Arc<Config>,
    shutdown_rx: broadcast::Receiver<()>,
) -> ServiceHandle {
    tokio::spawn(async move {
        api::start_server(state, &config.api, shutdown_rx)
            .await
            .map_err(|e| {
                error!("API server error: {:?}", e);
                e.context("API server failed")
            })
    })
}

/// Wait for any task to finish
async fn wait_for_any_failure(handles: &mut [ServiceHandle]) {
    loop {
        if handles.iter().any(|handle| handle.is_finished()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for all services to complete shutdown, returning the first failure
async fn shutdown_services(handles: Vec<ServiceHandle>) -> anyhow::Result<()> {
    let mut first_error = None;
    for handle in handles {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow::Error::new(e).context("service task aborted")),
        };
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
