use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use pulsewatch::{
    cli::config_path_from_args,
    config::Config,
    engine::cycle::RefreshEngine,
    feed::{HttpNewsFeed, NewsFeedPort},
    logging::init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path_from_args()?;
    let config = if config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    let logging_guard = init_tracing(&config.logging)?;
    tracing::info!(
        target: "main",
        run_id = logging_guard.run_id(),
        config = %config_path.display(),
        api_base_url = %config.api.base_url,
        "pulsewatch_starting"
    );

    let feed: Arc<dyn NewsFeedPort> =
        Arc::new(HttpNewsFeed::new(&config.api.base_url, config.request_timeout())?);
    let (engine, handle) = RefreshEngine::new(feed, config.engine_settings());

    let shutdown = CancellationToken::new();
    let engine_shutdown = shutdown.clone();
    let engine_task = tokio::spawn(async move { engine.run(engine_shutdown).await });

    // Consumer: log a one-line summary of every published bundle.
    let mut bundle_rx = handle.subscribe();
    let summary_shutdown = shutdown.clone();
    let summary_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = summary_shutdown.cancelled() => break,
                changed = bundle_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let bundle = bundle_rx.borrow_and_update().clone();
                    let spiking: Vec<&str> = bundle
                        .topic_states
                        .iter()
                        .filter(|(_, state)| {
                            state.has_server_anomaly || state.is_locally_elevated
                        })
                        .map(|(topic, _)| topic.as_str())
                        .collect();
                    tracing::info!(
                        target: "main",
                        sequence = bundle.sequence,
                        rows = bundle.rows.len(),
                        markers = bundle.markers.len(),
                        articles = bundle.recent_articles.len(),
                        spiking = ?spiking,
                        "pulse_refreshed"
                    );
                }
            }
        }
    });

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };

    tracing::info!(target: "main", signal = signal_name, "shutdown_requested");
    shutdown.cancel();

    engine_task.await.context("refresh engine task join failed")?;
    summary_task.await.context("summary task join failed")?;

    tracing::info!(target: "main", signal = signal_name, "pulsewatch_stopped");
    Ok(())
}
