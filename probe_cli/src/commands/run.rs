use crate::server;
use anyhow::{Context, Result};
use colored::Colorize;
use probe_core::{ProbeInstruments, Prober};
use probe_metrics::MetricRegistry;
use probe_scheduler::{discover_config, Scheduler};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn execute(config_path: Option<PathBuf>, port: Option<String>) -> Result<()> {
    let (path, mut config) = discover_config(config_path.as_deref())
        .await
        .context("failed to load configuration")?;

    if let Some(port) = port {
        info!("Overriding listen port: {}", port);
        config.port = port;
        config.validate()?;
    }
    let addr = config.listen_addr()?;

    let registry = MetricRegistry::new();
    let instruments =
        ProbeInstruments::register(&registry).context("failed to register instruments")?;
    registry
        .register_process_collector()
        .context("failed to register process collector")?;
    let prober = Prober::new(instruments, config.request_timeout())?;

    println!("{}", "=== Latency Probe ===".bold().cyan());
    println!("Config: {}", path.display());
    println!(
        "Probing {} URLs every {:?} (timeout {:?})",
        config.urls.len(),
        config.scrape_interval(),
        config.request_timeout()
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    println!("Metrics available at http://{}/metrics", addr);

    let shutdown = CancellationToken::new();
    let scheduler =
        Scheduler::new(prober, config.urls.clone(), config.scrape_interval()).spawn(shutdown.clone());

    let token = shutdown.clone();
    let served = axum::serve(listener, server::router(registry))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => info!("Shutdown signal received"),
                _ = token.cancelled() => {}
            }
            token.cancel();
        })
        .await;

    shutdown.cancel();
    let scheduler = scheduler.await.context("scheduler task panicked")?;
    served.context("metrics server failed")?;

    info!(sweeps = scheduler.sweeps_completed(), "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
