use admin_service::{
    build_router,
    config::{AdminConfig, Environment},
    services::{Database, Stores},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::{init_tracing, LogFormat};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::{signal, sync::watch};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AdminConfig::from_env()?;

    let format = match config.environment {
        Environment::Prod => LogFormat::Json,
        Environment::Dev => LogFormat::Pretty,
    };
    init_tracing(&config.service_name, &config.log_level, format);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting admin service"
    );

    let database = Database::connect(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(e.into()))?;

    let state = AppState::new(
        config.clone(),
        Stores::postgres(database.clone()),
        Some(database),
    )?;

    let purge = state
        .auth
        .sessions()
        .spawn_purge_task(Duration::from_secs(config.session.purge_interval_seconds));

    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e)))?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (stopping_tx, stopping_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = stopping_tx.send(true);
    })
    .into_future();

    let grace = Duration::from_secs(config.common.shutdown_grace_seconds);
    tokio::select! {
        result = server => result?,
        _ = grace_elapsed(stopping_rx, grace) => {
            tracing::warn!(grace_seconds = grace.as_secs(), "In-flight requests did not finish in time");
        }
    }

    purge.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Resolves `grace` after shutdown started.
async fn grace_elapsed(mut stopping: watch::Receiver<bool>, grace: Duration) {
    while !*stopping.borrow() {
        if stopping.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
