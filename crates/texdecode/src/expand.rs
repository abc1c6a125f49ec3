//! Channel widening via bit replication.
//!
//! Each helper copies the most significant bits of the narrow value into the
//! vacated low bits, which is what texture samplers do for UNORM formats.
//! Inputs wider than the stated bit count are not masked.

/// `00000abc` -> `abcabcab`
#[inline]
pub const fn expand3to8(v: u8) -> u8 {
    (v << 5) | (v << 2) | (v >> 1)
}

/// `0000abcd` -> `abcdabcd`
#[inline]
pub const fn expand4to8(v: u8) -> u8 {
    (v << 4) | v
}

/// `000abcde` -> `abcdeabc`
#[inline]
pub const fn expand5to8(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

/// `00abcdef` -> `abcdefab`
#[inline]
pub const fn expand6to8(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_map_to_full_range() {
        assert_eq!(expand3to8(0), 0);
        assert_eq!(expand3to8(7), 255);
        assert_eq!(expand4to8(0), 0);
        assert_eq!(expand4to8(15), 255);
        assert_eq!(expand5to8(0), 0);
        assert_eq!(expand5to8(31), 255);
        assert_eq!(expand6to8(0), 0);
        assert_eq!(expand6to8(63), 255);
    }

    #[test]
    fn replicates_high_bits() {
        assert_eq!(expand3to8(0b100), 0b1001_0010);
        assert_eq!(expand4to8(0b1010), 0b1010_1010);
        assert_eq!(expand5to8(0b10000), 0b1000_0100);
        assert_eq!(expand6to8(0b100000), 0b1000_0010);
    }

    #[test]
    fn expansion_is_monotonic() {
        for v in 0..31u8 {
            assert!(expand5to8(v) < expand5to8(v + 1));
        }
        for v in 0..63u8 {
            assert!(expand6to8(v) < expand6to8(v + 1));
        }
        for v in 0..7u8 {
            assert!(expand3to8(v) < expand3to8(v + 1));
        }
    }
}
