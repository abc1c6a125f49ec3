use std::path::Path;

use anyhow::{Context, Result};
use benchconfig::BenchFileConfig;
use renderer::{BenchConfig, RunMode, RunSummary, Renderer};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::paths;

pub fn run(cli: Cli) -> Result<()> {
    let file = load_config(&cli)?;
    let config = resolve_bench_config(&cli, file.as_ref());
    tracing::debug!(?config, "resolved benchmark configuration");

    let mut renderer = Renderer::new(config);
    let summary = renderer.run()?;
    tracing::info!(
        cycles = summary.cycles,
        reports = summary.reports.len(),
        device_timestamps = summary.device_timestamps,
        "benchmark finished"
    );

    if let Some(path) = cli.summary.as_deref() {
        write_summary(path, &summary)?;
    }

    if summary.verify_failures > 0 {
        anyhow::bail!(
            "{} cycle(s) produced GPU output that differs from the CPU decoder",
            summary.verify_failures
        );
    }
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config`/`TEXBENCH_CONFIG` must load; the default location
/// is optional.
fn load_config(cli: &Cli) -> Result<Option<BenchFileConfig>> {
    if let Some(path) = cli.config.as_deref() {
        let config = BenchFileConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        return Ok(Some(config));
    }

    match paths::default_config_file() {
        Some(path) if path.is_file() => {
            let config = BenchFileConfig::load(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded default configuration");
            Ok(Some(config))
        }
        _ => Ok(None),
    }
}

/// CLI flags win over the file, the file wins over built-in defaults.
fn resolve_bench_config(cli: &Cli, file: Option<&BenchFileConfig>) -> BenchConfig {
    let mut config = BenchConfig::new(cli.dim);
    if let Some(file) = file {
        let bench = &file.bench;
        config.format = bench.format.unwrap_or(config.format);
        config.strategy = bench.strategy.unwrap_or(config.strategy);
        config.pattern_interval = bench.pattern_interval.unwrap_or(config.pattern_interval);
        config.report_interval = bench.report_interval.unwrap_or(config.report_interval);
        config.verify = bench.verify.unwrap_or(config.verify);
        config.vsync = file.display.vsync.unwrap_or(config.vsync);
    }

    config.format = cli.format.unwrap_or(config.format);
    config.strategy = cli.strategy.unwrap_or(config.strategy);
    config.verify |= cli.verify;
    if cli.no_vsync {
        config.vsync = false;
    }
    if cli.headless {
        config.mode = RunMode::Headless;
    }
    config.cycles = cli.cycles;
    config.dump_dir = cli.dump.clone();
    config
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialise run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run summary to {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote run summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use texdecode::CpuStrategy;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["texbench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = resolve_bench_config(&cli(&["128"]), None);
        assert_eq!(config.dims.width(), 128);
        assert_eq!(config.strategy, CpuStrategy::Reference);
        assert_eq!(config.mode, RunMode::Windowed);
        assert!(config.vsync);
        assert!(!config.verify);
    }

    #[test]
    fn file_overrides_defaults_and_flags_override_file() {
        let file = BenchFileConfig::from_toml_str(
            r#"
version = 1

[bench]
strategy = "simd"
pattern_interval = "500ms"
verify = true

[display]
vsync = false
"#,
        )
        .unwrap();

        let from_file = resolve_bench_config(&cli(&["64"]), Some(&file));
        assert_eq!(from_file.strategy, CpuStrategy::Simd);
        assert_eq!(from_file.pattern_interval, Duration::from_millis(500));
        assert_eq!(from_file.report_interval, Duration::from_secs(1));
        assert!(from_file.verify);
        assert!(!from_file.vsync);

        let overridden = resolve_bench_config(
            &cli(&["64", "--strategy", "reference", "--headless", "--cycles", "5"]),
            Some(&file),
        );
        assert_eq!(overridden.strategy, CpuStrategy::Reference);
        assert_eq!(overridden.mode, RunMode::Headless);
        assert_eq!(overridden.cycles, Some(5));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let args = cli(&["64", "--config", missing.to_str().unwrap()]);
        assert!(load_config(&args).is_err());
    }
}
