// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use clinic_gateway::{
    api::router,
    config::{ConfigError, GatewayConfig, ServerConfig},
    proxy::TransportError,
    state::AppState,
    telemetry,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How long in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build upstream client: {0}")]
    Client(#[from] TransportError),
    #[error("failed to load TLS certificate/key: {0}")]
    Tls(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::warn!("rustls crypto provider was already installed");
    }

    let config = GatewayConfig::from_env()?;
    let server = ServerConfig::from_env()?;

    for route in config.routes.iter() {
        tracing::info!(prefix = route.prefix(), backend = route.base_url(), "Route registered");
    }
    tracing::info!(
        whitelist = config.whitelist.len(),
        upstream_timeout_ms = config.upstream_timeout.as_millis() as u64,
        max_in_flight = config.max_in_flight,
        "Gateway configured"
    );

    let state = AppState::new(config)?;
    let app = router(state);

    let shutdown = CancellationToken::new();
    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(watch_shutdown(shutdown.clone(), handle.clone()));
    tokio::spawn(shutdown_signal(shutdown));

    match server.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(StartupError::Tls)?;
            tracing::info!(addr = %server.addr, "Clinic gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(server.addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(StartupError::Serve)?;
        }
        None => {
            tracing::info!(addr = %server.addr, "Clinic gateway listening on http (docs at /docs)");
            axum_server::bind(server.addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(StartupError::Serve)?;
        }
    }

    tracing::info!("Gateway shut down gracefully");
    Ok(())
}

async fn watch_shutdown(shutdown: CancellationToken, handle: Handle<SocketAddr>) {
    shutdown.cancelled().await;
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
    shutdown.cancel();
}
