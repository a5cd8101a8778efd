//! x86 80-bit extended precision floats

use std::fmt;

use crate::ir::FLOAT80_SIZE_IN_BYTES;

const EXPONENT_BIAS: i32 = 16383;
const EXPONENT_MASK: u16 = 0x7FFF;
const SIGN_BIT: u16 = 0x8000;
const INTEGER_BIT: u64 = 1 << 63;

/// An 80-bit extended float: sign and 15-bit exponent, 64-bit mantissa with an
/// explicit integer bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Float80 {
    sign_exponent: u16,
    fraction: u64,
}

impl Float80 {
    /// Positive zero
    pub const ZERO: Float80 = Float80 {
        sign_exponent: 0,
        fraction: 0,
    };

    /// Build from raw fields
    pub fn from_parts(sign_exponent: u16, fraction: u64) -> Self {
        Float80 {
            sign_exponent,
            fraction,
        }
    }

    /// Decode the 10-byte little-endian memory layout (mantissa first)
    pub fn from_le_bytes(bytes: [u8; FLOAT80_SIZE_IN_BYTES]) -> Self {
        let mut fraction = [0u8; 8];
        fraction.copy_from_slice(&bytes[..8]);
        Float80 {
            fraction: u64::from_le_bytes(fraction),
            sign_exponent: u16::from_le_bytes([bytes[8], bytes[9]]),
        }
    }

    /// Encode into the 10-byte little-endian memory layout
    pub fn to_le_bytes(self) -> [u8; FLOAT80_SIZE_IN_BYTES] {
        let mut bytes = [0u8; FLOAT80_SIZE_IN_BYTES];
        bytes[..8].copy_from_slice(&self.fraction.to_le_bytes());
        bytes[8..].copy_from_slice(&self.sign_exponent.to_le_bytes());
        bytes
    }

    /// Sign and biased exponent word
    pub fn sign_exponent(self) -> u16 {
        self.sign_exponent
    }

    /// Mantissa including the explicit integer bit
    pub fn fraction(self) -> u64 {
        self.fraction
    }

    /// Exact widening conversion from `f64`
    pub fn from_f64(value: f64) -> Self {
        let bits = value.to_bits();
        let sign = if bits >> 63 == 1 { SIGN_BIT } else { 0 };
        let exponent = ((bits >> 52) & 0x7FF) as i32;
        let mantissa = bits & ((1u64 << 52) - 1);

        match exponent {
            0 if mantissa == 0 => Float80::from_parts(sign, 0),
            0 => {
                // Subnormal doubles become normal extended values
                let shift = mantissa.leading_zeros();
                let biased = 15372 - shift as i32;
                Float80::from_parts(sign | biased as u16, mantissa << shift)
            }
            0x7FF => Float80::from_parts(sign | EXPONENT_MASK, INTEGER_BIT | (mantissa << 11)),
            _ => {
                let biased = exponent - 1023 + EXPONENT_BIAS;
                Float80::from_parts(sign | biased as u16, INTEGER_BIT | (mantissa << 11))
            }
        }
    }

    /// Rounding conversion to `f64`
    pub fn to_f64(self) -> f64 {
        let negative = self.sign_exponent & SIGN_BIT != 0;
        let exponent = (self.sign_exponent & EXPONENT_MASK) as i32;

        let magnitude = if exponent == EXPONENT_MASK as i32 {
            if self.fraction & !INTEGER_BIT == 0 {
                f64::INFINITY
            } else {
                f64::NAN
            }
        } else if exponent == 0 && self.fraction == 0 {
            0.0
        } else {
            // Scale in two steps so intermediate powers do not underflow
            let scale = exponent - EXPONENT_BIAS - 63;
            let half = scale / 2;
            (self.fraction as f64) * 2f64.powi(half) * 2f64.powi(scale - half)
        };

        if negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// True for either infinity
    pub fn is_infinite(self) -> bool {
        self.sign_exponent & EXPONENT_MASK == EXPONENT_MASK && self.fraction & !INTEGER_BIT == 0
    }
}

impl From<f64> for Float80 {
    fn from(value: f64) -> Self {
        Float80::from_f64(value)
    }
}

impl fmt::Display for Float80 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
