use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use axum::Router;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use townsquare::config::AppConfig;
use townsquare::infra::db::Db;
use townsquare::infra::queue::SqsQueue;
use townsquare::infra::repo::Store;
use townsquare::infra::storage::ObjectStorage;
use townsquare::{http, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    if config.run_migrations {
        db.migrate().await?;
        tracing::info!("migrations applied");
    }
    let storage = ObjectStorage::new(&config).await?;
    let queue = SqsQueue::new(&config).await?;

    let state = AppState {
        store: Store::postgres(db),
        queue: Arc::new(queue),
        pictures: Arc::new(storage),
        token_key: config.token_key,
        token_ttl_days: config.token_ttl_days,
        purge_retention_days: config.purge_retention_days,
        purge_batch_size: config.purge_batch_size,
        picture_max_bytes: config.picture_max_bytes,
        max_body_bytes: config.max_body_bytes,
    };

    match config.app_mode.as_str() {
        "api" => {
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            tokio::select! {
                result = jobs::purge_worker::run(state.purge_service(), state.queue.clone()) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        "scheduler" => {
            let interval = Duration::from_secs(config.purge_sweep_interval_seconds.max(1));
            tokio::select! {
                result = jobs::scheduler::run(state.purge_service(), interval) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        "sweep" => {
            let report = state
                .purge_service()
                .sweep(OffsetDateTime::now_utc())
                .await
                .map_err(|err| anyhow!("purge sweep failed: {}", err))?;
            tracing::info!(?report, "one-shot sweep done");
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
