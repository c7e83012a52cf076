//! Process entrypoint
//!
//! Boots state, spawns scheduler + workers + HTTP server, and drains
//! everything on SIGINT/SIGTERM with a bounded grace period.

use ingest_server::scheduler::OrderScheduler;
use ingest_server::worker::Worker;
use ingest_server::{AppState, Config};
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Drain budget after a shutdown signal.
const SHUTDOWN_GRACE_SECS: u64 = 3;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_server=info,shopee_client=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        cluster = config.cluster_enabled,
        sandbox = config.shopee_is_sandbox,
        "Starting ingest-server"
    );

    let state = AppState::new(&config).await?;
    let shutdown = CancellationToken::new();

    // Scheduler: enqueues per-shop jobs (cluster) or runs them inline.
    let scheduler = OrderScheduler::new(
        state.pool.clone(),
        state.queue.clone(),
        state.collector.clone(),
        &config.cron_expression,
        config.cluster_enabled,
        config.shopee_is_sandbox,
        config.max_retry_count,
        shutdown.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    // Worker pool. One worker in direct mode, CLUSTER_WORKERS otherwise.
    let worker_count = if config.cluster_enabled {
        config.cluster_workers.max(1)
    } else {
        1
    };
    let mut worker_handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let worker = Worker::new(
            state.queue.clone(),
            state.collector.clone(),
            config.job_concurrency,
            shutdown.clone(),
        );
        worker_handles.push(tokio::spawn(worker.run()));
    }

    // Operator HTTP surface.
    let app = ingest_server::api::create_router(state.clone());
    let addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ingest-server HTTP listening on {addr}");
    let http_shutdown = shutdown.clone();
    let http_handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!("HTTP server error: {e}");
        }
    });

    wait_for_signal().await;
    tracing::info!("Shutdown signal received, draining");
    shutdown.cancel();

    let drain = async {
        let _ = scheduler_handle.await;
        for handle in worker_handles {
            let _ = handle.await;
        }
        let _ = http_handle.await;
    };
    if tokio::time::timeout(std::time::Duration::from_secs(SHUTDOWN_GRACE_SECS), drain)
        .await
        .is_err()
    {
        tracing::warn!("Drain exceeded {SHUTDOWN_GRACE_SECS}s, exiting anyway");
    }

    tracing::info!("ingest-server stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
