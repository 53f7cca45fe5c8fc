mod schedule;

use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use registry::DeviceRegistry;
use state_publisher::{PublishError, ReadingPublisher, StateSink};
use status_client::{RawStatus, StatusSource};
use status_parser::parse_status;
use types::ParsedReading;

pub use schedule::{IntervalTimer, PollSchedule, Timer, Trigger};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("failed to publish readings for {device}: {source}")]
    Publish {
        device: String,
        #[source]
        source: PublishError,
    },
}

/// Source of reading timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOutcome {
    Updated,
    /// The status page could not be fetched; zeros were published.
    Unavailable,
    /// The status page did not match the expected layout; zeros were published.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub device: String,
    pub outcome: DeviceOutcome,
}

/// Per-device outcomes of one cycle, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub devices: Vec<DeviceReport>,
}

impl CycleReport {
    pub fn updated_count(&self) -> usize {
        self.count(DeviceOutcome::Updated)
    }

    pub fn failed_count(&self) -> usize {
        self.devices.len() - self.updated_count()
    }

    pub fn outcome(&self, device: &str) -> Option<DeviceOutcome> {
        self.devices
            .iter()
            .find(|report| report.device == device)
            .map(|report| report.outcome)
    }

    fn count(&self, outcome: DeviceOutcome) -> usize {
        self.devices
            .iter()
            .filter(|report| report.outcome == outcome)
            .count()
    }
}

/// Polls every registered inverter once per cycle and publishes the readings.
pub struct PollLoop<F, S, C = SystemClock> {
    registry: DeviceRegistry,
    source: F,
    publisher: ReadingPublisher<S>,
    clock: C,
}

impl<F, S, C> PollLoop<F, S, C>
where
    F: StatusSource,
    S: StateSink,
    C: Clock,
{
    pub fn new(registry: DeviceRegistry, source: F, publisher: ReadingPublisher<S>, clock: C) -> Self {
        Self {
            registry,
            source,
            publisher,
            clock,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn publisher(&self) -> &ReadingPublisher<S> {
        &self.publisher
    }

    /// Runs one cycle over all devices, strictly in registry order.
    ///
    /// Fetch and parse failures zero the device's readings and the cycle moves on.
    /// A publish failure stops the cycle and is returned.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, PollError> {
        let started = Instant::now();
        let mut report = CycleReport::default();

        for device in self.registry.iter_mut() {
            debug!(device = %device.name(), friendly_name = %device.friendly_name(), "calling inverter");
            let taken_at = self.clock.now();

            let (reading, outcome) = match self.source.fetch(device.url()).await {
                RawStatus::Payload(body) => match parse_status(&body, taken_at) {
                    Ok(reading) => (reading, DeviceOutcome::Updated),
                    Err(err) => {
                        warn!(
                            device = %device.name(),
                            url = %device.url(),
                            error = %err,
                            "malformed status page"
                        );
                        (ParsedReading::zeroed(taken_at), DeviceOutcome::Malformed)
                    }
                },
                RawStatus::Unavailable(err) => {
                    error!(
                        device = %device.name(),
                        url = %device.url(),
                        error = %err,
                        "error connecting to inverter"
                    );
                    (ParsedReading::zeroed(taken_at), DeviceOutcome::Unavailable)
                }
            };

            device.record(&reading);
            self.publisher
                .publish(device.identity(), &reading)
                .await
                .map_err(|source| PollError::Publish {
                    device: device.name().to_string(),
                    source,
                })?;

            report.devices.push(DeviceReport {
                device: device.name().to_string(),
                outcome,
            });
        }

        info!(
            devices = report.devices.len(),
            updated = report.updated_count(),
            failed = report.failed_count(),
            elapsed_ms = started.elapsed().as_millis(),
            "poll cycle complete"
        );
        Ok(report)
    }

    /// Runs a cycle on every timer trigger until shutdown is requested.
    ///
    /// A failed cycle is logged and the loop waits for the next trigger.
    pub async fn run<T: Timer>(&mut self, mut timer: T, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                info!("poll loop shutdown requested");
                break;
            }

            tokio::select! {
                trigger = timer.wait() => {
                    debug!(?trigger, "poll cycle triggered");
                    if let Err(err) = self.run_cycle().await {
                        error!(error = %err, "poll cycle aborted");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("poll loop shutdown requested");
                        break;
                    }
                }
            }
        }
    }
}
