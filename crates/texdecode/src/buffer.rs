use crate::format::PixelFormat;

/// Side length of the square tiles both decoders walk.
pub const BLOCK_SIZE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimensionError {
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("image dimensions must be multiples of 4 (got {width}x{height})")]
    Unaligned { width: u32, height: u32 },
    #[error("image dimensions {width}x{height} overflow the addressable texel count")]
    Overflow { width: u32, height: u32 },
}

/// Validated image extent.
///
/// Both sides are non-zero multiples of [`BLOCK_SIZE`]; the GPU index mapping
/// `((width * y) >> 2) + (x >> 2)` is only exact under that constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, DimensionError> {
        if width == 0 || height == 0 {
            return Err(DimensionError::Empty { width, height });
        }
        if width % BLOCK_SIZE != 0 || height % BLOCK_SIZE != 0 {
            return Err(DimensionError::Unaligned { width, height });
        }
        // The shader computes `width * y` in a signed 32-bit int.
        if (width as u64) * (height as u64) > i32::MAX as u64 {
            return Err(DimensionError::Overflow { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn square(side: u32) -> Result<Self, DimensionError> {
        Self::new(side, side)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Packed source image: one big-endian 16-bit texel per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTexelBuffer {
    dims: Dimensions,
    format: PixelFormat,
    bytes: Vec<u8>,
}

impl PackedTexelBuffer {
    /// Allocates a zero-filled buffer (every texel decodes to opaque black).
    pub fn new(dims: Dimensions, format: PixelFormat) -> Self {
        Self {
            dims,
            format,
            bytes: vec![0; dims.texel_count() * format.bytes_per_texel()],
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Byte offset of texel `(x, y)`.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.dims.width as usize + x as usize) * self.format.bytes_per_texel()
    }

    /// Reads texel `(x, y)` as a host-order value.
    pub fn texel(&self, x: u32, y: u32) -> u16 {
        let at = self.offset(x, y);
        u16::from_be_bytes([self.bytes[at], self.bytes[at + 1]])
    }

    /// Stores a host-order value at `(x, y)` in big-endian byte order.
    pub fn set_texel(&mut self, x: u32, y: u32, value: u16) {
        let at = self.offset(x, y);
        self.bytes[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }
}

/// Decoded image as RGBA8 pixels.
///
/// Each `u32` holds bytes `[r, g, b, a]` in memory order on every host, so
/// the buffer is byte-compatible with an `Rgba8Unorm` texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPixelBuffer {
    dims: Dimensions,
    pixels: Vec<u32>,
}

impl DecodedPixelBuffer {
    pub fn new(dims: Dimensions) -> Self {
        Self {
            dims,
            pixels: vec![0; dims.texel_count()],
        }
    }

    /// Wraps tightly packed RGBA8 bytes, e.g. a GPU readback.
    ///
    /// Returns `None` when the byte count does not match `dims`.
    pub fn from_rgba_bytes(dims: Dimensions, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != dims.texel_count() * 4 {
            return None;
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| u32::from_ne_bytes([px[0], px[1], px[2], px[3]]))
            .collect();
        Some(Self { dims, pixels })
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Returns `[r, g, b, a]` for pixel `(x, y)`.
    pub fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[y as usize * self.dims.width as usize + x as usize].to_ne_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_dimensions() {
        assert!(matches!(
            Dimensions::new(0, 4),
            Err(DimensionError::Empty { .. })
        ));
        assert!(matches!(
            Dimensions::new(6, 4),
            Err(DimensionError::Unaligned { .. })
        ));
        assert!(matches!(
            Dimensions::square(65536),
            Err(DimensionError::Overflow { .. })
        ));
        assert_eq!(Dimensions::square(256).unwrap().texel_count(), 65536);
    }

    #[test]
    fn texels_are_stored_big_endian_row_major() {
        let dims = Dimensions::new(8, 4).unwrap();
        let mut buffer = PackedTexelBuffer::new(dims, PixelFormat::Rgb565);
        assert_eq!(buffer.as_bytes().len(), 8 * 4 * 2);

        buffer.set_texel(1, 2, 0x07FF);
        let at = (2 * 8 + 1) * 2;
        assert_eq!(&buffer.as_bytes()[at..at + 2], &[0x07, 0xFF]);
        assert_eq!(buffer.texel(1, 2), 0x07FF);
    }

    #[test]
    fn decoded_bytes_are_rgba_in_memory_order() {
        let dims = Dimensions::square(4).unwrap();
        let mut bytes = vec![0u8; dims.texel_count() * 4];
        bytes[4..8].copy_from_slice(&[1, 2, 3, 4]);
        let decoded = DecodedPixelBuffer::from_rgba_bytes(dims, &bytes).unwrap();
        assert_eq!(decoded.rgba(1, 0), [1, 2, 3, 4]);
        assert_eq!(decoded.as_bytes(), bytes.as_slice());
        assert!(DecodedPixelBuffer::from_rgba_bytes(dims, &bytes[1..]).is_none());
    }
}
