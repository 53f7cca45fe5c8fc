//! Service manager integration: readiness and watchdog keep-alives.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Keep-alives go out at half the watchdog timeout.
pub fn ping_interval(watchdog_usec: u64) -> Duration {
    Duration::from_micros(watchdog_usec / 2).max(MIN_PING_INTERVAL)
}

#[cfg(target_os = "linux")]
pub fn notify_ready() {
    if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notification failed");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn notify_ready() {}

/// Starts the keep-alive task when the unit has a watchdog configured for this process.
#[cfg(target_os = "linux")]
pub fn spawn_watchdog(mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    let mut watchdog_usec = 0;
    if !sd_notify::watchdog_enabled(false, &mut watchdog_usec) {
        return None;
    }
    let every = ping_interval(watchdog_usec);
    debug!(interval_ms = every.as_millis(), "systemd watchdog enabled");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Watchdog]) {
                        warn!(error = %err, "systemd watchdog ping failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(not(target_os = "linux"))]
pub fn spawn_watchdog(_shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    None
}
