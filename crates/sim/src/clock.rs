//! Virtual clock driving a simulator.
//!
//! In real-time mode an advance sleeps for the interval and then re-reads
//! the wall clock, so any slowdown of the caller shows up in the
//! timestamps.  In accelerated mode the clock jumps forward by
//! `interval * speed_factor` without blocking.

use std::time::Duration;

use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeMode {
    Realtime,
    Accelerated { speed_factor: f64 },
}

#[derive(Debug, Clone)]
pub struct SimClock {
    now: OffsetDateTime,
    mode: TimeMode,
}

impl SimClock {
    /// Start at the current wall-clock time.
    pub fn new(mode: TimeMode) -> Self {
        Self::starting_at(mode, wall_clock())
    }

    pub fn starting_at(mode: TimeMode, start: OffsetDateTime) -> Self {
        Self { now: start, mode }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.now
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    /// Advance by `interval`.  Blocks the thread in real-time mode.
    pub fn advance(&mut self, interval: Duration) {
        match self.mode {
            TimeMode::Realtime => {
                std::thread::sleep(interval);
                self.now = wall_clock();
            }
            TimeMode::Accelerated { speed_factor } => self.skip(interval, speed_factor),
        }
    }

    /// Same as [`advance`](Self::advance) but suspends on the tokio timer
    /// instead of blocking the worker thread.
    pub async fn advance_async(&mut self, interval: Duration) {
        match self.mode {
            TimeMode::Realtime => {
                tokio::time::sleep(interval).await;
                self.now = wall_clock();
            }
            TimeMode::Accelerated { speed_factor } => self.skip(interval, speed_factor),
        }
    }

    fn skip(&mut self, interval: Duration, speed_factor: f64) {
        self.now += time::Duration::seconds_f64(interval.as_secs_f64() * speed_factor);
    }
}

/// Local wall-clock time, falling back to UTC when the local offset cannot
/// be determined (e.g. multi-threaded process on some platforms).
pub fn wall_clock() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
