//! Integers whose bit width is carried with the value

use std::fmt;

use crate::ir::var_bit_byte_size;

/// Arbitrary-width integer stored little-endian in `ceil(bits / 8)` bytes
///
/// Bits above the declared width are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IVarBit {
    bits: u32,
    bytes: Vec<u8>,
}

impl IVarBit {
    /// Build from little-endian storage bytes; missing bytes read as zero
    pub fn from_le_bytes(bits: u32, bytes: &[u8]) -> Self {
        let size = var_bit_byte_size(bits);
        let mut storage = vec![0u8; size];
        let limit = size.min(bytes.len());
        storage[..limit].copy_from_slice(&bytes[..limit]);
        let mut value = IVarBit {
            bits,
            bytes: storage,
        };
        value.mask();
        value
    }

    /// Build from a signed value, sign-extending into the full width
    pub fn from_i64(bits: u32, value: i64) -> Self {
        let size = var_bit_byte_size(bits);
        let fill = if value < 0 { 0xFF } else { 0x00 };
        let mut storage = vec![fill; size.max(8)];
        storage[..8].copy_from_slice(&value.to_le_bytes());
        storage.truncate(size);
        let mut result = IVarBit {
            bits,
            bytes: storage,
        };
        result.mask();
        result
    }

    /// Build from an unsigned value, zero-extending into the full width
    pub fn from_u64(bits: u32, value: u64) -> Self {
        Self::from_le_bytes(bits, &value.to_le_bytes())
    }

    fn mask(&mut self) {
        let excess = (self.bytes.len() * 8) as u32 - self.bits;
        if excess > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= 0xFFu8 >> excess;
            }
        }
    }

    /// Declared width in bits
    pub fn bit_width(&self) -> u32 {
        self.bits
    }

    /// Storage size in bytes
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    /// Little-endian storage bytes
    pub fn as_le_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Low 64 bits, zero-extended
    pub fn to_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        let limit = self.bytes.len().min(8);
        buf[..limit].copy_from_slice(&self.bytes[..limit]);
        u64::from_le_bytes(buf)
    }

    /// Low 64 bits, sign-extended from the declared width when it is below 64
    pub fn to_i64(&self) -> i64 {
        let raw = self.to_u64();
        if self.bits == 0 || self.bits >= 64 {
            return raw as i64;
        }
        if (raw >> (self.bits - 1)) & 1 == 1 {
            (raw | (u64::MAX << self.bits)) as i64
        } else {
            raw as i64
        }
    }
}

impl fmt::Display for IVarBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits <= 64 {
            write!(f, "i{} {}", self.bits, self.to_u64())
        } else {
            write!(f, "i{} 0x", self.bits)?;
            for byte in self.bytes.iter().rev() {
                write!(f, "{:02x}", byte)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nine_bit_value() {
        let value = IVarBit::from_le_bytes(9, &[0x2A, 0x00]);
        assert_eq!(value.byte_size(), 2);
        assert_eq!(value.to_u64(), 42);
    }

    #[test]
    fn test_excess_bits_masked() {
        let value = IVarBit::from_le_bytes(9, &[0xFF, 0xFF]);
        assert_eq!(value.as_le_bytes(), &[0xFF, 0x01]);
        assert_eq!(value.to_u64(), 0x1FF);
        assert_eq!(value.to_i64(), -1);
    }

    #[test]
    fn test_negative_sign_extension() {
        let value = IVarBit::from_i64(13, -2);
        assert_eq!(value.as_le_bytes(), &[0xFE, 0x1F]);
        assert_eq!(value.to_i64(), -2);
    }

    #[test]
    fn test_wide_values() {
        let value = IVarBit::from_i64(128, -1);
        assert_eq!(value.byte_size(), 16);
        assert!(value.as_le_bytes().iter().all(|&b| b == 0xFF));
        assert_eq!(value.to_i64(), -1);
    }

    #[test]
    fn test_display() {
        assert_eq!(IVarBit::from_u64(9, 42).to_string(), "i9 42");
    }
}
