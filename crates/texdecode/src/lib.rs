//! Host-side half of the texel decode benchmark.
//!
//! Everything here is GPU-agnostic so it can be unit tested without an
//! adapter:
//! - `expand` widens narrow channels to 8 bits by bit replication.
//! - `format` names the packing scheme shared by the CPU and GPU paths.
//! - `buffer` owns the packed source texels and the decoded RGBA8 pixels.
//! - `decode` implements the CPU strategies (scalar reference and SIMD).
//! - `pattern` regenerates the striped test image on a fixed cadence.

pub mod buffer;
pub mod decode;
pub mod expand;
pub mod format;
pub mod pattern;

pub use buffer::{DecodedPixelBuffer, DimensionError, Dimensions, PackedTexelBuffer};
pub use decode::{decode_texel, CpuStrategy, StrategyParseError};
pub use expand::{expand3to8, expand4to8, expand5to8, expand6to8};
pub use format::{FormatParseError, PixelFormat};
pub use pattern::{PatternGenerator, DEFAULT_REFRESH_INTERVAL, STRIPE_OFF, STRIPE_ON};
