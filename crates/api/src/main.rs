use std::net::SocketAddr;
use std::sync::Arc;

use microsim_api::config::ServerConfig;
use microsim_api::router::build_app_router;
use microsim_api::state::AppState;
use microsim_compute::api::ComputeApi;
use microsim_db::memory::MemoryJobStore;
use microsim_db::repositories::PgJobStore;
use microsim_db::store::JobStore;
use microsim_events::EventBus;
use microsim_pipeline::service::{JobService, ServiceSettings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "microsim_api=debug,microsim_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store = connect_store(&config).await?;

    // --- Compute ---
    let compute = ComputeApi::new(
        config.compute_url.clone(),
        config.compute_app.clone(),
        config.compute_timeout(),
    )?;
    tracing::info!(
        compute_url = %config.compute_url,
        compute_app = %config.compute_app,
        "Compute client created",
    );
    if config.callback_token.is_none() {
        tracing::warn!("CALLBACK_TOKEN is not set; job callbacks are accepted without authentication");
    }
    if config.model_versions.is_empty() {
        tracing::warn!("MODEL_VERSIONS is not set; economic impact requests will be rejected");
    }

    // --- Orchestration ---
    let event_bus = Arc::new(EventBus::default());
    let service = Arc::new(JobService::new(
        store,
        Arc::clone(&event_bus),
        Arc::new(compute),
        ServiceSettings {
            model_versions: config.model_versions.clone(),
            sweep_interval: config.sequencer_sweep_interval(),
        },
    ));

    let cancel = CancellationToken::new();
    let sequencer_handle = Arc::clone(service.sequencer()).spawn(&event_bus, cancel.clone());

    // --- App state ---
    let state = AppState {
        service,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    if tokio::time::timeout(config.shutdown_timeout(), sequencer_handle)
        .await
        .is_err()
    {
        tracing::warn!("Dependency sequencer did not stop within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise an in-memory store.
async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn JobStore>, BoxError> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL is not set; using the in-memory job store (nothing persists)");
        return Ok(Arc::new(MemoryJobStore::new()));
    };

    let pool = microsim_db::create_pool(database_url).await?;
    tracing::info!("Database connection pool created");

    microsim_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    microsim_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgJobStore::new(pool)))
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
