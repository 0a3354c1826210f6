//! Per-transport byte order configuration.
//!
//! Firmware builds differ only in the endianness they use for integers and
//! floats. Each transport negotiates a [`ByteOrderConfig`] once at startup and
//! hands it to the codec for every chunk it receives.

use serde::{Deserialize, Serialize};

/// Integer and float endianness used by one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteOrderConfig {
    /// Integers are big-endian (simulator sub-protocol only; subpacket
    /// integers are always big-endian).
    pub big_endian_ints: bool,
    /// Floats are big-endian.
    pub big_endian_floats: bool,
}

impl ByteOrderConfig {
    /// Big-endian integers and floats, as used by the real radio link.
    pub const BIG_ENDIAN: ByteOrderConfig = ByteOrderConfig {
        big_endian_ints: true,
        big_endian_floats: true,
    };

    /// Little-endian integers and floats, as produced by x86 simulator builds.
    pub const LITTLE_ENDIAN: ByteOrderConfig = ByteOrderConfig {
        big_endian_ints: false,
        big_endian_floats: false,
    };

    /// Create a config from the two endianness flags.
    pub const fn new(big_endian_ints: bool, big_endian_floats: bool) -> Self {
        ByteOrderConfig {
            big_endian_ints,
            big_endian_floats,
        }
    }

    /// Decode a float in the configured order.
    pub fn read_f32(&self, bytes: [u8; 4]) -> f32 {
        if self.big_endian_floats {
            f32::from_be_bytes(bytes)
        } else {
            f32::from_le_bytes(bytes)
        }
    }

    /// Encode a float in the configured order.
    pub fn write_f32(&self, value: f32) -> [u8; 4] {
        if self.big_endian_floats {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }

    /// Decode a 32-bit integer in the configured order.
    pub fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        if self.big_endian_ints {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    }

    /// Encode a 32-bit integer in the configured order.
    pub fn write_u32(&self, value: u32) -> [u8; 4] {
        if self.big_endian_ints {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        }
    }
}

impl Default for ByteOrderConfig {
    fn default() -> Self {
        ByteOrderConfig::BIG_ENDIAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_order() {
        let be = ByteOrderConfig::BIG_ENDIAN;
        let le = ByteOrderConfig::LITTLE_ENDIAN;
        assert_eq!(be.write_f32(1.0), [0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(le.write_f32(1.0), [0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(be.read_f32([0x40, 0x00, 0x00, 0x00]), 2.0);
        assert_eq!(le.read_f32([0x00, 0x00, 0x00, 0x40]), 2.0);
    }

    #[test]
    fn test_mixed_order() {
        let cfg = ByteOrderConfig::new(true, false);
        assert_eq!(cfg.write_u32(1), [0, 0, 0, 1]);
        assert_eq!(cfg.write_f32(1.0), [0x00, 0x00, 0x80, 0x3F]);
    }
}
