// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `appfleet serve`: wires the services from configuration and runs the API

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use appfleet_core::{
    application::{
        repository_factory::{create_application_repository, create_volume_repository},
        ApplicationLifecycleService,
    },
    domain::{fleet_config::FleetConfigManifest, repository::StorageBackend},
    infrastructure::{
        db::Database, runtime::DockerRuntime, AuditListener, EventBus, MetricsListener,
    },
    presentation::api::{router, AppState},
};

pub async fn serve(config: FleetConfigManifest) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;
    let spec = &config.spec;

    info!("appfleet starting: config={}", config.metadata.name);

    if spec.observability.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], spec.observability.metrics.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let backend = spec.storage.to_backend()?;
    let database = match &backend {
        StorageBackend::PostgreSQL(pg) => Some(Database::new(&pg.connection_string).await?),
        StorageBackend::InMemory => {
            warn!("Using in-memory storage: applications are lost on restart");
            None
        }
    };
    let applications = create_application_repository(&backend, database.as_ref())?;
    let volumes = create_volume_repository(&backend, database.as_ref())?;

    let runtime = DockerRuntime::new(
        spec.runtime.docker_socket.clone(),
        spec.runtime.network.clone(),
        spec.runtime.image_registry.clone(),
        u64::from(spec.runtime.stop_timeout_secs),
    )
    .context("Failed to connect to Docker")?;
    if let Err(e) = runtime.healthcheck().await {
        warn!("Docker daemon is not answering yet: {}", e);
    }

    let event_bus = Arc::new(EventBus::with_default_capacity());
    event_bus.register_listener(Arc::new(AuditListener));
    event_bus.register_listener(Arc::new(MetricsListener));

    let state = AppState::new(
        applications,
        volumes,
        Arc::new(runtime),
        event_bus,
        &spec.routing.domain_suffix,
    );
    if spec.storage.recover_pending_on_startup {
        let recovered = state
            .lifecycle
            .recover_interrupted()
            .await
            .context("Failed to recover interrupted actions")?;
        if !recovered.is_empty() {
            warn!("{} interrupted application(s) marked FAIL", recovered.len());
        }
    }
    let app = router(state);

    let addr = format!("{}:{}", spec.api.bind_address, spec.api.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("appfleet API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("appfleet shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
