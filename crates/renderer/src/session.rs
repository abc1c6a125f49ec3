use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use texdecode::{
    CpuStrategy, DecodedPixelBuffer, PackedTexelBuffer, PatternGenerator, PixelFormat,
};
use timing::{HostTimer, TimingReport, TimingStats};
use tracing::{debug, info, warn};

use crate::gpu::{GpuContext, GpuDecoder, ProgramCache, VerifyOutcome};
use crate::types::BenchConfig;

/// Timings of one decode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CycleSample {
    pub gpu_ns: u64,
    pub cpu_us: u64,
}

/// Timing bookkeeping of a session, independent of the GPU.
///
/// Only steady-state cycles are recorded; the warmup sample is dropped and
/// the report interval restarts once warmup is over.
#[derive(Debug)]
pub(crate) struct CycleLog {
    stats: TimingStats,
    reports: Vec<TimingReport>,
}

impl CycleLog {
    pub fn new(report_interval: Duration, now: Instant) -> Self {
        Self {
            stats: TimingStats::new(report_interval, now),
            reports: Vec::new(),
        }
    }

    pub fn warmed_up(&mut self, now: Instant) {
        self.stats.reset(now);
    }

    pub fn record(&mut self, sample: CycleSample) {
        self.stats.record(sample.gpu_ns, sample.cpu_us);
    }

    pub fn maybe_report(&mut self, now: Instant) -> Option<TimingReport> {
        let report = self.stats.maybe_report(now)?;
        info!("{report}");
        self.reports.push(report);
        Some(report)
    }

    pub fn reports(&self) -> &[TimingReport] {
        &self.reports
    }
}

/// Owns every per-run resource: the packed source image, the CPU output,
/// the GPU decoder with its program cache and the timing accumulators.
pub(crate) struct BenchmarkSession {
    format: PixelFormat,
    strategy: CpuStrategy,
    verify: bool,
    packed: PackedTexelBuffer,
    decoded: DecodedPixelBuffer,
    pattern: PatternGenerator,
    programs: ProgramCache,
    gpu: GpuDecoder,
    cpu_timer: HostTimer,
    log: CycleLog,
    verify_failures: u64,
}

impl BenchmarkSession {
    pub fn new(ctx: &GpuContext, config: &BenchConfig, now: Instant) -> Result<Self> {
        let programs = ProgramCache::new(&ctx.device)?;
        let gpu = GpuDecoder::new(ctx, &programs, config.dims);

        Ok(Self {
            format: config.format,
            strategy: config.strategy,
            verify: config.verify,
            packed: PackedTexelBuffer::new(config.dims, config.format),
            decoded: DecodedPixelBuffer::new(config.dims),
            pattern: PatternGenerator::new(config.pattern_interval),
            programs,
            gpu,
            cpu_timer: HostTimer::new(now),
            log: CycleLog::new(config.report_interval, now),
            verify_failures: 0,
        })
    }

    /// Runs one unrecorded cycle so program compilation and first-use
    /// resource setup stay out of the steady-state averages.
    pub fn warm_up(&mut self, ctx: &GpuContext, now: Instant) -> Result<CycleSample> {
        let sample = self.cycle(ctx, now)?;
        debug!(
            gpu_ns = sample.gpu_ns,
            cpu_us = sample.cpu_us,
            programs = self.programs.len(),
            "warmup cycle finished"
        );
        self.log.warmed_up(Instant::now());
        Ok(sample)
    }

    /// Runs one decode cycle on both paths and records its timings.
    pub fn run_cycle(&mut self, ctx: &GpuContext, now: Instant) -> Result<CycleSample> {
        let sample = self.cycle(ctx, now)?;
        self.log.record(sample);
        Ok(sample)
    }

    /// Logs and keeps the averaged report once the report interval elapsed.
    pub fn maybe_report(&mut self, now: Instant) -> Option<TimingReport> {
        self.log.maybe_report(now)
    }

    fn cycle(&mut self, ctx: &GpuContext, now: Instant) -> Result<CycleSample> {
        if self.pattern.refresh(&mut self.packed, now) {
            self.gpu.upload(ctx, &self.packed);
            debug!(
                stripe_width = self.pattern.stripe_width(),
                generation = self.pattern.generation(),
                "regenerated synthetic pattern"
            );
        }

        let program = self.programs.get_or_compile(&ctx.device, self.format)?;
        let gpu_ns = self.gpu.decode(ctx, program)?;

        self.cpu_timer.start(Instant::now());
        self.strategy.decode(&self.packed, &mut self.decoded);
        let cpu_us = self.cpu_timer.elapsed_micros(Instant::now());

        if self.verify {
            self.verify_frame(ctx)?;
        }

        Ok(CycleSample { gpu_ns, cpu_us })
    }

    fn verify_frame(&mut self, ctx: &GpuContext) -> Result<VerifyOutcome> {
        let gpu = self.gpu.read_back(ctx)?;
        let outcome = crate::gpu::verify(&self.decoded, &gpu);
        if !outcome.is_match() {
            self.verify_failures += 1;
            if let Some((x, y, cpu, gpu)) = outcome.first {
                warn!(
                    mismatches = outcome.mismatches,
                    x,
                    y,
                    ?cpu,
                    ?gpu,
                    "GPU decode differs from CPU decode"
                );
            }
        }
        Ok(outcome)
    }

    /// Writes `cpu.png` and `gpu.png` of the current frame into `dir`.
    pub fn dump_frames(&self, ctx: &GpuContext, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create dump directory {}", dir.display()))?;
        let gpu = self.gpu.read_back(ctx)?;

        let mut written = Vec::with_capacity(2);
        for (name, frame) in [("cpu.png", &self.decoded), ("gpu.png", &gpu)] {
            let path = dir.join(name);
            write_png(&path, frame)?;
            info!(path = %path.display(), "wrote decoded frame");
            written.push(path);
        }
        Ok(written)
    }

    pub fn gpu(&self) -> &GpuDecoder {
        &self.gpu
    }

    pub fn reports(&self) -> &[TimingReport] {
        self.log.reports()
    }

    pub fn verify_failures(&self) -> u64 {
        self.verify_failures
    }
}

pub(crate) fn write_png(path: &Path, frame: &DecodedPixelBuffer) -> Result<()> {
    let dims = frame.dimensions();
    let image = image::RgbaImage::from_raw(dims.width(), dims.height(), frame.as_bytes().to_vec())
        .context("decoded frame does not match its dimensions")?;
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}
