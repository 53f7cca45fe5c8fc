use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior, Sleep};

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_PERIOD: Duration = Duration::from_secs(60);
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// When poll cycles fire, relative to process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay before the one-shot first cycle.
    pub initial_delay: Duration,
    /// Cadence of the recurring cycles.
    pub period: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            period: DEFAULT_PERIOD,
        }
    }
}

impl PollSchedule {
    pub fn first_at(&self, init: Instant) -> Instant {
        init + self.initial_delay
    }

    /// Anchor of the recurring cycles. Computed once; later cycles land on `start + n * period`.
    pub fn start_at(&self, init: Instant) -> Instant {
        init + self.period
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The one-shot cycle shortly after startup.
    Initial,
    Periodic,
}

/// Host timer capability: resolves when the next cycle is due.
#[async_trait]
pub trait Timer: Send {
    async fn wait(&mut self) -> Trigger;
}

/// Tokio-backed timer combining the one-shot and the fixed-cadence schedules.
#[derive(Debug)]
pub struct IntervalTimer {
    once: Option<Pin<Box<Sleep>>>,
    every: Interval,
}

impl IntervalTimer {
    pub fn new(schedule: &PollSchedule, init: Instant) -> Self {
        let once = Box::pin(sleep_until(schedule.first_at(init)));
        let mut every = interval_at(schedule.start_at(init), schedule.period.max(MIN_PERIOD));
        every.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            once: Some(once),
            every,
        }
    }

    pub fn start(schedule: &PollSchedule) -> Self {
        Self::new(schedule, Instant::now())
    }
}

#[async_trait]
impl Timer for IntervalTimer {
    async fn wait(&mut self) -> Trigger {
        let fired = match self.once.as_mut() {
            Some(once) => tokio::select! {
                biased;
                () = once => Trigger::Initial,
                _ = self.every.tick() => Trigger::Periodic,
            },
            None => {
                self.every.tick().await;
                Trigger::Periodic
            }
        };

        if fired == Trigger::Initial {
            self.once = None;
        }
        fired
    }
}
