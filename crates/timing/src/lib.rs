//! Timing harness shared by the benchmark session and the orchestration
//! driver.
//!
//! Every method takes the current `Instant` explicitly instead of reading
//! the clock, which keeps report scheduling deterministic under test.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default spacing between timing reports and iteration counts.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Monotonic host stopwatch.
///
/// `elapsed_*` never resets the baseline; call [`start`](Self::start) again
/// for that.
#[derive(Debug, Clone, Copy)]
pub struct HostTimer {
    origin: Instant,
}

impl HostTimer {
    pub fn new(now: Instant) -> Self {
        Self { origin: now }
    }

    pub fn start(&mut self, now: Instant) {
        self.origin = now;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.origin)
    }

    pub fn elapsed_micros(&self, now: Instant) -> u64 {
        u64::try_from(self.elapsed(now).as_micros()).unwrap_or(u64::MAX)
    }
}

/// Averages emitted once per report interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub avg_gpu_us: u64,
    pub avg_gpu_ms: u64,
    pub avg_cpu_us: u64,
    pub avg_cpu_ms: u64,
    pub samples: u64,
    pub interval_ms: u64,
}

impl TimingReport {
    fn from_totals(gpu_total_ns: u64, cpu_total_us: u64, samples: u64, interval_us: u64) -> Self {
        let average = |total: u64| total.checked_div(samples).unwrap_or(0);
        let avg_gpu_us = average(gpu_total_ns) / 1000;
        let avg_cpu_us = average(cpu_total_us);
        Self {
            avg_gpu_us,
            avg_gpu_ms: avg_gpu_us / 1000,
            avg_cpu_us,
            avg_cpu_ms: avg_cpu_us / 1000,
            samples,
            interval_ms: interval_us / 1000,
        }
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fragment shader took: {}us({}ms) GPU time ({}us({}ms) CPU time) {} runs in {}ms",
            self.avg_gpu_us,
            self.avg_gpu_ms,
            self.avg_cpu_us,
            self.avg_cpu_ms,
            self.samples,
            self.interval_ms
        )
    }
}

/// Running GPU/CPU totals flushed into a [`TimingReport`] once per interval.
///
/// The sample count always equals the number of [`record`](Self::record)
/// calls since the last report.
#[derive(Debug, Clone)]
pub struct TimingStats {
    gpu_total_ns: u64,
    cpu_total_us: u64,
    samples: u64,
    interval: Duration,
    interval_timer: HostTimer,
}

impl TimingStats {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            gpu_total_ns: 0,
            cpu_total_us: 0,
            samples: 0,
            interval,
            interval_timer: HostTimer::new(now),
        }
    }

    pub fn record(&mut self, gpu_ns: u64, cpu_us: u64) {
        self.gpu_total_ns = self.gpu_total_ns.saturating_add(gpu_ns);
        self.cpu_total_us = self.cpu_total_us.saturating_add(cpu_us);
        self.samples += 1;
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Emits a report and resets all accumulators once the interval elapsed.
    ///
    /// An interval without samples reports zero averages.
    pub fn maybe_report(&mut self, now: Instant) -> Option<TimingReport> {
        let elapsed = self.interval_timer.elapsed(now);
        if elapsed < self.interval {
            return None;
        }

        let report = TimingReport::from_totals(
            self.gpu_total_ns,
            self.cpu_total_us,
            self.samples,
            self.interval_timer.elapsed_micros(now),
        );
        self.reset(now);
        Some(report)
    }

    pub fn reset(&mut self, now: Instant) {
        self.gpu_total_ns = 0;
        self.cpu_total_us = 0;
        self.samples = 0;
        self.interval_timer.start(now);
    }
}

/// Counts presented frames and yields the count once per period.
#[derive(Debug, Clone)]
pub struct IterationCounter {
    count: u64,
    period: Duration,
    timer: HostTimer,
}

impl IterationCounter {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            count: 0,
            period,
            timer: HostTimer::new(now),
        }
    }

    /// Registers one iteration; returns the total once the period elapsed.
    pub fn tick(&mut self, now: Instant) -> Option<u64> {
        self.count += 1;
        if self.timer.elapsed(now) < self.period {
            return None;
        }
        let count = self.count;
        self.count = 0;
        self.timer.start(now);
        Some(count)
    }
}
