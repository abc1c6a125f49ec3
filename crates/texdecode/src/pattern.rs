use std::time::{Duration, Instant};

use crate::buffer::PackedTexelBuffer;

/// Default cadence at which the stripe pattern changes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(2000);

/// Texel written where `x & stripe_width != 0` (yellow).
pub const STRIPE_ON: u16 = 0xFFE0;
/// Texel written everywhere else (cyan).
pub const STRIPE_OFF: u16 = 0x07FF;

/// Produces vertical stripes whose width doubles on every refresh.
///
/// The pattern exists to keep the uploaded buffer changing; its content is
/// irrelevant to the timings.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    interval: Duration,
    stripe_width: u32,
    last_refresh: Option<Instant>,
    generation: u64,
}

impl PatternGenerator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stripe_width: 1,
            last_refresh: None,
            generation: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current stripe width; always a power of two no larger than the image.
    pub fn stripe_width(&self) -> u32 {
        self.stripe_width
    }

    /// Number of regenerations performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a call to [`refresh`](Self::refresh) at `now` would regenerate.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Regenerates `buffer` when the refresh interval has elapsed.
    ///
    /// Returns `true` when the buffer was rewritten and must be re-uploaded.
    /// The first call always regenerates.
    pub fn refresh(&mut self, buffer: &mut PackedTexelBuffer, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_refresh = Some(now);
        self.generation += 1;

        let dims = buffer.dimensions();
        self.stripe_width = self.stripe_width.saturating_mul(2);
        if self.stripe_width > dims.width() {
            self.stripe_width = 1;
        }

        let on = STRIPE_ON.to_be_bytes();
        let off = STRIPE_OFF.to_be_bytes();
        let stripe = self.stripe_width;
        let row_bytes = dims.width() as usize * 2;
        for row in buffer.as_bytes_mut().chunks_exact_mut(row_bytes) {
            for (x, texel) in row.chunks_exact_mut(2).enumerate() {
                let value = if (x as u32) & stripe != 0 { on } else { off };
                texel.copy_from_slice(&value);
            }
        }
        true
    }
}

impl Default for PatternGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}
