use std::time::{Duration, Instant};

use anyhow::Result;
use timing::IterationCounter;
use tracing::info;

use crate::gpu::GpuContext;
use crate::session::{BenchmarkSession, CycleSample};
use crate::types::{BenchConfig, RunSummary};

/// Spacing of the "iterated: N" lines.
const ITERATION_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Warmup,
    Steady,
    Finished,
}

/// Scheduling state of the orchestration loop, independent of the GPU.
#[derive(Debug)]
pub(crate) struct LoopState {
    phase: Phase,
    counter: IterationCounter,
    cycles: u64,
    limit: Option<u64>,
}

impl LoopState {
    pub fn new(limit: Option<u64>, now: Instant) -> Self {
        Self {
            phase: Phase::Warmup,
            counter: IterationCounter::new(ITERATION_PERIOD, now),
            cycles: 0,
            limit,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Enters steady state; the iteration period restarts at `now`.
    pub fn finish_warmup(&mut self, now: Instant) {
        debug_assert_eq!(self.phase, Phase::Warmup);
        self.counter = IterationCounter::new(ITERATION_PERIOD, now);
        self.phase = if self.limit == Some(0) {
            Phase::Finished
        } else {
            Phase::Steady
        };
    }

    /// Counts one presented steady-state cycle.
    ///
    /// Returns the iteration count when a period has elapsed. Cycles outside
    /// steady state are not counted.
    pub fn complete_cycle(&mut self, now: Instant) -> Option<u64> {
        if self.phase != Phase::Steady {
            return None;
        }
        self.cycles += 1;
        if self.limit.is_some_and(|limit| self.cycles >= limit) {
            self.phase = Phase::Finished;
        }
        self.counter.tick(now)
    }
}

/// Drives a [`BenchmarkSession`]: one warmup cycle, then steady-state cycles
/// with iteration counts and timing reports emitted as they come due.
pub(crate) struct Driver {
    config: BenchConfig,
    session: BenchmarkSession,
    state: LoopState,
}

impl Driver {
    pub fn new(ctx: &GpuContext, config: &BenchConfig, now: Instant) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            session: BenchmarkSession::new(ctx, config, now)?,
            state: LoopState::new(config.cycles, now),
        })
    }

    pub fn session(&self) -> &BenchmarkSession {
        &self.session
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase() == Phase::Finished
    }

    /// Runs the unrecorded warmup cycle and writes frame dumps if requested.
    pub fn warm_up(&mut self, ctx: &GpuContext) -> Result<()> {
        self.session.warm_up(ctx, Instant::now())?;
        if let Some(dir) = &self.config.dump_dir {
            self.session.dump_frames(ctx, dir)?;
        }
        self.state.finish_warmup(Instant::now());
        Ok(())
    }

    pub fn run_cycle(&mut self, ctx: &GpuContext, now: Instant) -> Result<CycleSample> {
        self.session.run_cycle(ctx, now)
    }

    /// Bookkeeping after the cycle's frame was presented.
    pub fn finish_cycle(&mut self, now: Instant) {
        if let Some(count) = self.state.complete_cycle(now) {
            info!("iterated: {count}");
        }
        self.session.maybe_report(now);
    }

    pub fn summary(&self, ctx: &GpuContext) -> RunSummary {
        RunSummary {
            adapter: ctx.adapter_profile.clone(),
            width: self.config.dims.width(),
            height: self.config.dims.height(),
            format: self.config.format.to_string(),
            strategy: self.config.strategy.to_string(),
            device_timestamps: self.session.gpu().uses_device_timestamps(),
            cycles: self.state.cycles(),
            verify_failures: self.session.verify_failures(),
            reports: self.session.reports().to_vec(),
        }
    }
}

/// Decode cycles back to back with no surface.
pub(crate) fn run_headless(config: &BenchConfig) -> Result<RunSummary> {
    let ctx = GpuContext::new_headless(config.dims)?;
    let mut driver = Driver::new(&ctx, config, Instant::now())?;
    driver.warm_up(&ctx)?;
    info!(
        width = config.dims.width(),
        height = config.dims.height(),
        strategy = %config.strategy,
        cycles = ?config.cycles,
        "running headless decode benchmark"
    );

    while !driver.is_finished() {
        driver.run_cycle(&ctx, Instant::now())?;
        driver.finish_cycle(Instant::now());
    }

    Ok(driver.summary(&ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_warmup_and_moves_to_steady() {
        let start = Instant::now();
        let mut state = LoopState::new(None, start);
        assert_eq!(state.phase(), Phase::Warmup);
        state.finish_warmup(start + Duration::from_millis(50));
        assert_eq!(state.phase(), Phase::Steady);
        assert_eq!(state.cycles(), 0);
    }

    #[test]
    fn cycle_limit_finishes_the_loop() {
        let start = Instant::now();
        let mut state = LoopState::new(Some(3), start);
        state.finish_warmup(start);
        for step in 1..=3u64 {
            assert_eq!(state.phase(), Phase::Steady);
            state.complete_cycle(start + Duration::from_millis(step));
        }
        assert_eq!(state.phase(), Phase::Finished);
        assert_eq!(state.cycles(), 3);
    }

    #[test]
    fn cycles_after_the_limit_are_ignored() {
        let start = Instant::now();
        let mut state = LoopState::new(Some(2), start);
        state.finish_warmup(start);
        state.complete_cycle(start);
        state.complete_cycle(start);
        assert_eq!(state.phase(), Phase::Finished);

        assert_eq!(state.complete_cycle(start + Duration::from_secs(5)), None);
        assert_eq!(state.cycles(), 2);
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn zero_cycle_limit_skips_steady_state() {
        let start = Instant::now();
        let mut state = LoopState::new(Some(0), start);
        state.finish_warmup(start);
        assert_eq!(state.phase(), Phase::Finished);
    }

    #[test]
    fn iteration_count_excludes_warmup_time() {
        let start = Instant::now();
        let mut state = LoopState::new(None, start);
        let steady = start + Duration::from_millis(900);
        state.finish_warmup(steady);
        // A full period measured from the start would already have elapsed.
        assert_eq!(state.complete_cycle(start + Duration::from_millis(1200)), None);
        assert_eq!(state.complete_cycle(steady + Duration::from_secs(1)), Some(2));
    }
}
