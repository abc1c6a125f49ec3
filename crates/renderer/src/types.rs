use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use texdecode::{CpuStrategy, Dimensions, PixelFormat, DEFAULT_REFRESH_INTERVAL};
use timing::{TimingReport, DEFAULT_REPORT_INTERVAL};

/// Where decoded frames end up.
///
/// * `Windowed` opens a winit window of the benchmark dimensions and blits the
///   GPU-decoded texture to its surface once per cycle.
/// * `Headless` skips surface creation entirely and runs decode cycles back to
///   back, which is what CI and remote machines want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Windowed,
    Headless,
}

/// Immutable configuration handed to [`crate::Renderer::run`] at start-up.
///
/// Mirrors the resolved CLI flags and configuration file values.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Size of the packed source image and of the decode target.
    pub dims: Dimensions,
    /// Packing scheme of the source texels.
    pub format: PixelFormat,
    /// CPU decoder variant timed against the GPU.
    pub strategy: CpuStrategy,
    /// Minimum spacing between synthetic pattern regenerations.
    pub pattern_interval: Duration,
    /// Spacing between averaged timing reports.
    pub report_interval: Duration,
    /// Read back every GPU frame and compare it with the CPU output.
    pub verify: bool,
    /// Present with FIFO when true, prefer immediate presentation otherwise.
    pub vsync: bool,
    pub mode: RunMode,
    /// Stop after this many steady-state cycles; `None` runs until closed.
    pub cycles: Option<u64>,
    /// Directory receiving `cpu.png` and `gpu.png` after warmup.
    pub dump_dir: Option<PathBuf>,
}

impl BenchConfig {
    /// Defaults for everything but the image size.
    pub fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            format: PixelFormat::default(),
            strategy: CpuStrategy::default(),
            pattern_interval: DEFAULT_REFRESH_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            verify: false,
            vsync: true,
            mode: RunMode::default(),
            cycles: None,
            dump_dir: None,
        }
    }
}

/// Identification of the adapter the benchmark ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: String,
    pub driver: String,
    pub driver_info: String,
    pub device_type: String,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            driver: info.driver.clone(),
            driver_info: info.driver_info.clone(),
            device_type: format!("{:?}", info.device_type),
        }
    }

    pub fn is_software(&self) -> bool {
        self.device_type == format!("{:?}", wgpu::DeviceType::Cpu)
    }
}

/// Everything a bounded run produced, serialised by `--summary`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub adapter: AdapterProfile,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub strategy: String,
    /// Whether GPU elapsed times came from device timestamps.
    pub device_timestamps: bool,
    pub cycles: u64,
    pub verify_failures: u64,
    pub reports: Vec<TimingReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_config_defaults() {
        let config = BenchConfig::new(Dimensions::square(256).unwrap());
        assert_eq!(config.dims.width(), 256);
        assert_eq!(config.format, PixelFormat::Rgb565);
        assert_eq!(config.strategy, CpuStrategy::Reference);
        assert_eq!(config.pattern_interval, Duration::from_millis(2000));
        assert_eq!(config.report_interval, Duration::from_secs(1));
        assert_eq!(config.mode, RunMode::Windowed);
        assert!(config.vsync);
        assert!(config.cycles.is_none());
    }

    #[test]
    fn software_adapter_detection() {
        let profile = AdapterProfile {
            name: "llvmpipe".into(),
            backend: "Vulkan".into(),
            driver: "llvmpipe".into(),
            driver_info: String::new(),
            device_type: "Cpu".into(),
        };
        assert!(profile.is_software());
        let discrete = AdapterProfile {
            device_type: "DiscreteGpu".into(),
            ..profile
        };
        assert!(!discrete.is_software());
    }
}
