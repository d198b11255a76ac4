//! Status feed watcher binary entrypoint.
//! Loads config, starts the poll scheduler (and optional metrics endpoint),
//! and shuts both down on Ctrl-C / SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use status_feed_watcher::config::load_config_default;
use status_feed_watcher::metrics::Metrics;
use status_feed_watcher::{ConsoleSink, HttpFetcher, Scheduler};

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to JSON lines. Logs go to
/// stderr so stdout carries only incidents.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("status_feed_watcher=info,ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = load_config_default()?;
    cfg.apply_env();
    let rt = cfg.validate().context("invalid watcher config")?;

    let cancel = CancellationToken::new();

    // The recorder goes in before anything records or describes a series.
    let metrics = cfg.metrics_addr.map(|addr| Metrics::init().map(|m| (addr, m))).transpose()?;

    let fetcher = HttpFetcher::new(rt.scheduler.fetch_timeout, &cfg.user_agent)?;
    let scheduler = Arc::new(Scheduler::new(
        &rt.registry,
        Arc::new(fetcher),
        Arc::new(ConsoleSink::new(cfg.output)),
        rt.scheduler,
    ));

    let metrics_task = match metrics {
        Some((addr, metrics)) => {
            let token = cancel.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = metrics.serve(addr, token).await {
                    tracing::error!(error = %format!("{e:#}"), "metrics endpoint stopped");
                }
            }))
        }
        None => None,
    };

    let poller = Arc::clone(&scheduler).spawn(cancel.clone());

    shutdown_signal().await;
    tracing::info!("shutdown requested");
    cancel.cancel();

    poller.await.context("scheduler task")?;
    if let Some(task) = metrics_task {
        let _ = task.await;
    }
    tracing::info!("bye");
    Ok(())
}
