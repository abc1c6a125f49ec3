use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use texdecode::{CpuStrategy, PixelFormat};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BenchFileConfig {
    pub version: u32,
    #[serde(default)]
    pub bench: BenchSection,
    #[serde(default)]
    pub display: DisplaySection,
}

/// `[bench]` table. Every key is optional; CLI flags override these.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BenchSection {
    #[serde(default, deserialize_with = "deserialize_parsed_opt")]
    pub format: Option<PixelFormat>,
    #[serde(default, deserialize_with = "deserialize_parsed_opt")]
    pub strategy: Option<CpuStrategy>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub pattern_interval: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub report_interval: Option<Duration>,
    #[serde(default)]
    pub verify: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisplaySection {
    #[serde(default)]
    pub vsync: Option<bool>,
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Accepts any value spelled the way its `FromStr` impl expects.
fn deserialize_parsed_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| value.parse::<T>().map_err(de::Error::custom))
        .transpose()
}

impl BenchFileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BenchFileConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if let Some(interval) = self.bench.pattern_interval {
            if interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "bench.pattern_interval must be greater than zero".into(),
                ));
            }
        }

        if let Some(interval) = self.bench.report_interval {
            if interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "bench.report_interval must be greater than zero".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[bench]
format = "rgb565"
strategy = "simd"
pattern_interval = "2s"
report_interval = "1s"
verify = true

[display]
vsync = false
"#;

    #[test]
    fn parses_sample_config() {
        let config = BenchFileConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!(config.bench.format, Some(PixelFormat::Rgb565));
        assert_eq!(config.bench.strategy, Some(CpuStrategy::Simd));
        assert_eq!(config.bench.pattern_interval, Some(Duration::from_secs(2)));
        assert_eq!(config.bench.report_interval, Some(Duration::from_secs(1)));
        assert_eq!(config.bench.verify, Some(true));
        assert_eq!(config.display.vsync, Some(false));
    }

    #[test]
    fn missing_tables_leave_everything_unset() {
        let config = BenchFileConfig::from_toml_str("version = 1\n").unwrap();
        assert!(config.bench.strategy.is_none());
        assert!(config.bench.pattern_interval.is_none());
        assert!(config.display.vsync.is_none());
    }

    #[test]
    fn numeric_durations_are_seconds() {
        let config = BenchFileConfig::from_toml_str(
            r#"
version = 1

[bench]
pattern_interval = 3
report_interval = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.bench.pattern_interval, Some(Duration::from_secs(3)));
        assert_eq!(config.bench.report_interval, Some(Duration::from_millis(500)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = BenchFileConfig::from_toml_str("version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_intervals() {
        for key in ["pattern_interval", "report_interval"] {
            let input = format!("version = 1\n\n[bench]\n{key} = \"0s\"\n");
            let err = BenchFileConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{key}: {err}");
        }
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = BenchFileConfig::from_toml_str(
            r#"
version = 1

[bench]
strategy = "avx512"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BenchFileConfig::load(Path::new("/nonexistent/texbench/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn io_error_message_leaves_the_cause_to_the_source_chain() {
        let err = BenchFileConfig::load(Path::new("/nonexistent/texbench/config.toml")).unwrap_err();
        let source = std::error::Error::source(&err).expect("io source").to_string();
        let message = err.to_string();
        assert_eq!(
            message,
            "failed to read configuration /nonexistent/texbench/config.toml"
        );
        assert!(!message.contains(&source));
    }
}
