use std::env;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bridge_app::{config_path_from_args, systemd, BridgeConfig};
use poll_loop::{IntervalTimer, PollLoop, PollSchedule, SystemClock};
use registry::DeviceRegistry;
use state_publisher::{HomeAssistantSink, ReadingPublisher, RecordingSink, StateSink};
use status_client::StatusClient;

const DRY_RUN_RETAINED_UPDATES: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = config_path_from_args(env::args().skip(1));
    let config = BridgeConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;

    let registry =
        DeviceRegistry::new(config.devices.clone()).context("device registry init failed")?;
    if registry.is_empty() {
        warn!("no devices configured");
    }
    let client = StatusClient::new(&config.http).context("status client init failed")?;

    if config.home_assistant.dry_run {
        info!("dry run: state updates are logged, not sent");
        let sink = RecordingSink::bounded(DRY_RUN_RETAINED_UPDATES);
        serve(registry, client, sink, config.schedule).await
    } else {
        let token = config.home_assistant.token.clone().unwrap_or_default();
        let sink = HomeAssistantSink::new(config.home_assistant.base_url(), token)
            .context("home assistant client init failed")?;
        info!(base_url = %sink.base_url(), "publishing to home assistant");
        serve(registry, client, sink, config.schedule).await
    }
}

async fn serve<S: StateSink>(
    registry: DeviceRegistry,
    client: StatusClient,
    sink: S,
    schedule: PollSchedule,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let devices = registry.len();
    let mut poll = PollLoop::new(registry, client, ReadingPublisher::new(sink), SystemClock);
    let timer = IntervalTimer::start(&schedule);

    let signal_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for shutdown signal");
                // Keep the sender alive so the poll loop is not stopped.
                std::future::pending::<()>().await;
            }
        }
    });

    systemd::notify_ready();
    let watchdog_handle = systemd::spawn_watchdog(shutdown_rx.clone());
    info!(
        devices,
        initial_delay_s = schedule.initial_delay.as_secs(),
        period_s = schedule.period.as_secs(),
        "zever bridge started"
    );

    poll.run(timer, shutdown_rx).await;

    signal_handle.abort();
    if let Some(handle) = watchdog_handle {
        let _ = handle.await;
    }
    Ok(())
}
