//! Tick drivers.
//!
//! The simulation only needs "call this every period". A render loop, a
//! tokio interval or a test harness can all provide that through
//! [`Scheduler`].

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

pub trait Scheduler {
    /// Invoke `tick` once every `period`.
    fn every(&mut self, period: Duration, tick: TickCallback);

    /// Stop invoking every registered callback.
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub total_scheduled: u32,
    pub total_ticks: u64,
}

struct ManualEntry {
    period: Duration,
    elapsed: Duration,
    tick: TickCallback,
}

/// Headless driver advanced explicitly by the caller.
#[derive(Default)]
pub struct ManualScheduler {
    entries: Vec<ManualEntry>,
    stats: SchedulerStats,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `by` pass and fire every callback whose period elapsed, as many
    /// times as it elapsed. Returns the number of invocations.
    pub fn advance(&mut self, by: Duration) -> u64 {
        let mut fired = 0;
        for entry in &mut self.entries {
            entry.elapsed += by;
            while !entry.period.is_zero() && entry.elapsed >= entry.period {
                entry.elapsed -= entry.period;
                (entry.tick)();
                fired += 1;
            }
        }
        self.stats.total_ticks += fired;
        fired
    }

    /// Fire every callback exactly `ticks` times.
    pub fn run_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            for entry in &mut self.entries {
                (entry.tick)();
                self.stats.total_ticks += 1;
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

impl Scheduler for ManualScheduler {
    fn every(&mut self, period: Duration, tick: TickCallback) {
        self.entries.push(ManualEntry {
            period,
            elapsed: Duration::ZERO,
            tick,
        });
        self.stats.total_scheduled += 1;
    }

    fn stop(&mut self) {
        self.entries.clear();
    }
}

/// Drives callbacks from tokio intervals. Must be used inside a runtime.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl Scheduler for IntervalScheduler {
    fn every(&mut self, period: Duration, mut tick: TickCallback) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, interval callback not scheduled");
            return;
        };
        if period.is_zero() {
            warn!("zero tick period, interval callback not scheduled");
            return;
        }
        debug!(?period, "interval callback scheduled");
        self.tasks.push(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                tick();
            }
        }));
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
