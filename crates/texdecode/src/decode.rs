//! CPU decoding of packed texels into RGBA8.
//!
//! Both strategies walk the image in 4x4 blocks, the same granularity the
//! GPU path uses, and read the source row-major so that the texel feeding
//! pixel `(x, y)` lives at byte `(y * width + x) * 2` for either decoder.

use std::fmt;
use std::str::FromStr;

use crate::buffer::{DecodedPixelBuffer, PackedTexelBuffer, BLOCK_SIZE};
use crate::expand::{expand5to8, expand6to8};
use crate::format::PixelFormat;

const BLOCK: usize = BLOCK_SIZE as usize;

#[derive(Debug, thiserror::Error)]
#[error("unknown CPU decode strategy '{0}'; expected reference or simd")]
pub struct StrategyParseError(pub String);

/// Named CPU decode implementations.
///
/// Every strategy must produce bit-identical output; they differ only in how
/// much work each step of the inner loop does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CpuStrategy {
    /// One texel at a time through [`decode_texel`].
    #[default]
    Reference,
    /// Four texels per step: SSE2 on x86_64, lane-wise bit swizzling elsewhere.
    Simd,
}

impl CpuStrategy {
    pub const ALL: [CpuStrategy; 2] = [CpuStrategy::Reference, CpuStrategy::Simd];

    pub const fn name(self) -> &'static str {
        match self {
            CpuStrategy::Reference => "reference",
            CpuStrategy::Simd => "simd",
        }
    }

    /// Decodes every texel of `src` into `dst`.
    ///
    /// # Panics
    ///
    /// When the two buffers describe different dimensions.
    pub fn decode(self, src: &PackedTexelBuffer, dst: &mut DecodedPixelBuffer) {
        let dims = src.dimensions();
        assert_eq!(
            dims,
            dst.dimensions(),
            "source and destination dimensions must match"
        );
        let width = dims.width() as usize;
        let height = dims.height() as usize;

        match src.format() {
            PixelFormat::Rgb565 => match self {
                CpuStrategy::Reference => {
                    decode_rgb565_reference(src.as_bytes(), dst.pixels_mut(), width, height)
                }
                CpuStrategy::Simd => {
                    decode_rgb565_simd(src.as_bytes(), dst.pixels_mut(), width, height)
                }
            },
        }
    }
}

impl fmt::Display for CpuStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuStrategy {
    type Err = StrategyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reference" | "scalar" | "ref" => Ok(CpuStrategy::Reference),
            "simd" | "sse" | "sse2" => Ok(CpuStrategy::Simd),
            other => Err(StrategyParseError(other.to_string())),
        }
    }
}

/// Decodes one host-order RGB565 value to `[r, g, b, 255]`.
#[inline]
pub fn decode_texel(value: u16) -> [u8; 4] {
    let r = expand5to8(((value >> 11) & 0x1F) as u8);
    let g = expand6to8(((value >> 5) & 0x3F) as u8);
    let b = expand5to8((value & 0x1F) as u8);
    [r, g, b, 0xFF]
}

/// Runs `decode_run` over every 4-texel row segment of every 4x4 block.
#[inline(always)]
fn for_each_block_row<F>(src: &[u8], dst: &mut [u32], width: usize, height: usize, mut decode_run: F)
where
    F: FnMut(&[u8], &mut [u32]),
{
    for y in (0..height).step_by(BLOCK) {
        for x in (0..width).step_by(BLOCK) {
            for iy in 0..BLOCK {
                let start = (y + iy) * width + x;
                decode_run(
                    &src[start * 2..(start + BLOCK) * 2],
                    &mut dst[start..start + BLOCK],
                );
            }
        }
    }
}

fn decode_rgb565_reference(src: &[u8], dst: &mut [u32], width: usize, height: usize) {
    for_each_block_row(src, dst, width, height, |texels, out| {
        for (pixel, texel) in out.iter_mut().zip(texels.chunks_exact(2)) {
            *pixel = u32::from_ne_bytes(decode_texel(u16::from_be_bytes([texel[0], texel[1]])));
        }
    });
}

#[cfg(target_arch = "x86_64")]
fn decode_rgb565_simd(src: &[u8], dst: &mut [u32], width: usize, height: usize) {
    use std::arch::x86_64::*;

    // SAFETY: SSE2 is part of the x86_64 baseline. Each run slice holds
    // exactly 8 source bytes and 4 destination pixels, matching the 64-bit
    // load and the 128-bit unaligned store.
    unsafe {
        let mask_r0 = _mm_set1_epi32(0x0000_00F8);
        let mask_g0 = _mm_set1_epi32(0x0000_FC00);
        let mask_g1 = _mm_set1_epi32(0x0000_0300);
        let mask_b0 = _mm_set1_epi32(0x00F8_0000);
        let alpha = _mm_set1_epi32(0xFF00_0000_u32 as i32);

        for_each_block_row(src, dst, width, height, |texels, out| {
            // Four big-endian texels `ba dc fe hg` widened so that each
            // 32-bit lane holds the same texel twice: `gggBBBbb RRRrrGGg` x2.
            let packed = _mm_loadl_epi64(texels.as_ptr() as *const __m128i);
            let c0 = _mm_unpacklo_epi16(packed, packed);

            let r0 = _mm_and_si128(c0, mask_r0);
            let r1 = _mm_srli_epi32(r0, 5);

            let gtmp = _mm_srli_epi32(c0, 3);
            let g0 = _mm_and_si128(gtmp, mask_g0);
            let g1 = _mm_and_si128(_mm_srli_epi32(gtmp, 6), mask_g1);

            let b0 = _mm_and_si128(_mm_srli_epi32(c0, 5), mask_b0);
            let b1 = _mm_srli_epi16(b0, 5);

            let rgba = _mm_or_si128(
                _mm_or_si128(_mm_or_si128(r0, r1), _mm_or_si128(g0, g1)),
                _mm_or_si128(_mm_or_si128(b0, b1), alpha),
            );
            _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, rgba);
        });
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn decode_rgb565_simd(src: &[u8], dst: &mut [u32], width: usize, height: usize) {
    for_each_block_row(src, dst, width, height, |texels, out| {
        let mut lanes = [0u32; BLOCK];
        for (lane, texel) in lanes.iter_mut().zip(texels.chunks_exact(2)) {
            let le = u16::from_le_bytes([texel[0], texel[1]]) as u32;
            *lane = le | (le << 16);
        }
        for (pixel, lane) in out.iter_mut().zip(lanes) {
            *pixel = u32::from_ne_bytes(swizzle_lane(lane).to_le_bytes());
        }
    });
}

/// Scalar mirror of the SSE2 swizzle for one duplicated 32-bit lane.
///
/// Input is a texel read little-endian and copied into both halves; output
/// is `r | g << 8 | b << 16 | a << 24`.
#[cfg_attr(target_arch = "x86_64", allow(dead_code))]
#[inline(always)]
fn swizzle_lane(c0: u32) -> u32 {
    let r0 = c0 & 0x0000_00F8;
    let r1 = r0 >> 5;
    let gtmp = c0 >> 3;
    let g0 = gtmp & 0x0000_FC00;
    let g1 = (gtmp >> 6) & 0x0000_0300;
    let b0 = (c0 >> 5) & 0x00F8_0000;
    // `_mm_srli_epi16` shifts within 16-bit halves, dropping bits that
    // would cross into the low half.
    let b1 = (b0 >> 5) & 0x0007_0000;
    r0 | r1 | g0 | g1 | b0 | b1 | 0xFF00_0000
}
