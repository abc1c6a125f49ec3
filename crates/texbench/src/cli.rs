use std::path::PathBuf;

use clap::Parser;
use texdecode::{CpuStrategy, Dimensions, PixelFormat};

#[derive(Parser, Debug)]
#[command(
    name = "texbench",
    author,
    version,
    about = "Race a CPU RGB565 decoder against a GPU fragment-shader decoder"
)]
pub struct Cli {
    /// Side length of the square test image in texels (a non-zero multiple of 4).
    #[arg(value_name = "DIM", value_parser = parse_dimension)]
    pub dim: Dimensions,

    /// Configuration file; defaults to `<config dir>/texbench/config.toml` when present.
    #[arg(long, value_name = "FILE", env = "TEXBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// CPU decoder variant: `reference` or `simd`.
    #[arg(long, value_name = "STRATEGY", value_parser = parse_strategy)]
    pub strategy: Option<CpuStrategy>,

    /// Packed texel format of the source image.
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<PixelFormat>,

    /// Run without a window; decode cycles run back to back.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many steady-state cycles.
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,

    /// Read back every GPU frame and compare it with the CPU output.
    #[arg(long)]
    pub verify: bool,

    /// Present without waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,

    /// Write the CPU and GPU decoded frames after warmup as PNGs into DIR.
    #[arg(long, value_name = "DIR")]
    pub dump: Option<PathBuf>,

    /// Write a JSON summary of every timing report when the run ends.
    #[arg(long, value_name = "FILE", requires = "cycles")]
    pub summary: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_dimension(value: &str) -> Result<Dimensions, String> {
    let trimmed = value.trim();
    let side: u32 = trimmed
        .parse()
        .map_err(|_| format!("invalid dimension '{trimmed}'; expected a positive integer"))?;
    Dimensions::square(side).map_err(|err| err.to_string())
}

pub fn parse_strategy(value: &str) -> Result<CpuStrategy, String> {
    value.parse().map_err(|err: texdecode::StrategyParseError| err.to_string())
}

pub fn parse_format(value: &str) -> Result<PixelFormat, String> {
    value.parse().map_err(|err: texdecode::FormatParseError| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dimension() {
        let dims = parse_dimension(" 256 ").unwrap();
        assert_eq!((dims.width(), dims.height()), (256, 256));
        assert!(parse_dimension("0").unwrap_err().contains("non-zero"));
        assert!(parse_dimension("6").unwrap_err().contains("multiples of 4"));
        assert!(parse_dimension("-4").is_err());
        assert!(parse_dimension("big").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let cli = Cli::try_parse_from([
            "texbench",
            "512",
            "--strategy",
            "simd",
            "--format",
            "rgb565",
            "--headless",
            "--cycles",
            "10",
            "--verify",
            "--no-vsync",
            "--summary",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.dim.width(), 512);
        assert_eq!(cli.strategy, Some(CpuStrategy::Simd));
        assert_eq!(cli.format, Some(PixelFormat::Rgb565));
        assert!(cli.headless && cli.verify && cli.no_vsync);
        assert_eq!(cli.cycles, Some(10));
        assert_eq!(cli.summary, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn summary_requires_cycle_limit() {
        let err = Cli::try_parse_from(["texbench", "64", "--summary", "out.json"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn dimension_is_required() {
        let err = Cli::try_parse_from(["texbench"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["texbench", "64", "--strategy", "avx"]).is_err());
    }
}
