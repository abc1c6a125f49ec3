//! GPU side of texbench: the fragment-shader RGB565 decoder, its timing and
//! the loop that races it against the CPU decoder.
//!
//! ```text
//!   texbench CLI
//!          │ BenchConfig
//!          ▼
//!   Renderer::run ──▶ Driver ──▶ BenchmarkSession::run_cycle
//!          │             │              ├─▶ PatternGenerator::refresh ─▶ upload
//!          │             │              ├─▶ GpuDecoder::decode (timestamped)
//!          │             │              └─▶ CpuStrategy::decode (host timed)
//!          │             └─▶ present ─▶ "iterated: N" ─▶ maybe_report
//!          ▼
//!      RunSummary
//! ```
//!
//! `Driver` owns the session and its scheduling state; the windowed front-end
//! wraps it in a winit event loop and blits each decoded frame to the window,
//! the headless front-end runs cycles back to back.

#![deny(rustdoc::broken_intra_doc_links)]

mod compile;
mod driver;
mod gpu;
mod session;
mod types;
mod window;

use anyhow::Result;

pub use types::{AdapterProfile, BenchConfig, RunMode, RunSummary};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: BenchConfig,
}

impl Renderer {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Runs the benchmark until the window closes or the cycle limit is hit.
    ///
    /// Shader compile or link failures and device creation errors are
    /// returned; device errors raised mid-run abort the process.
    pub fn run(&mut self) -> Result<RunSummary> {
        match self.config.mode {
            RunMode::Windowed => window::run_windowed(&self.config),
            RunMode::Headless => driver::run_headless(&self.config),
        }
    }
}
