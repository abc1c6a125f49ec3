use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown pixel format '{0}'; expected rgb565")]
pub struct FormatParseError(pub String);

/// Packing scheme shared by the CPU decoder and the GPU decode program.
///
/// The GPU side keys its program cache on this tag, so adding a variant
/// means adding both a CPU decode arm and a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 5-6-5 red/green/blue, stored big-endian.
    #[default]
    Rgb565,
}

impl PixelFormat {
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb565 => "rgb565",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = FormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rgb565" | "565" => Ok(PixelFormat::Rgb565),
            other => Err(FormatParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("rgb565".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb565);
        assert_eq!(" RGB565 ".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb565);
        assert!("rgba8".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let format = PixelFormat::Rgb565;
        assert_eq!(format.to_string().parse::<PixelFormat>().unwrap(), format);
        assert_eq!(format.bytes_per_texel(), 2);
    }
}
