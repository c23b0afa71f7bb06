//! Stack integers.
//!
//! Numbers are little-endian with the sign carried in the top bit of the most
//! significant byte. Decoding is bounded by a byte width that depends on the
//! active forks: 4 bytes historically, 8 bytes once 64-bit arithmetic is
//! enabled.

use core::fmt;

use crate::error::ScriptError;

/// Byte width of numeric operands before 64-bit arithmetic.
pub const LEGACY_NUMBER_SIZE: usize = 4;
/// Byte width of numeric operands with 64-bit arithmetic.
pub const BIG_NUMBER_SIZE: usize = 8;
/// Byte width accepted by CHECKLOCKTIMEVERIFY and CHECKSEQUENCEVERIFY.
pub const LOCKTIME_NUMBER_SIZE: usize = 5;

/// An integer decoded from, or destined for, a stack element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptNumber(i64);

impl ScriptNumber {
    pub const ZERO: ScriptNumber = ScriptNumber(0);
    pub const ONE: ScriptNumber = ScriptNumber(1);

    /// Wraps a value. `i64::MIN` lies outside the 8-byte range.
    pub fn new(value: i64) -> Result<Self, ScriptError> {
        if value == i64::MIN {
            return Err(ScriptError::OutOfRange);
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Decodes a stack element.
    ///
    /// Elements longer than `max_size` fail with [`ScriptError::OutOfRange`];
    /// with `require_minimal`, padded encodings fail with
    /// [`ScriptError::MinimalNumber`].
    pub fn decode(bytes: &[u8], max_size: usize, require_minimal: bool) -> Result<Self, ScriptError> {
        if bytes.len() > max_size.min(BIG_NUMBER_SIZE) {
            return Err(ScriptError::OutOfRange);
        }
        if require_minimal && !is_minimally_encoded(bytes) {
            return Err(ScriptError::MinimalNumber);
        }
        if bytes.is_empty() {
            return Ok(Self::ZERO);
        }

        let mut magnitude: u64 = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            magnitude |= u64::from(byte) << (8 * i);
        }
        let sign_bit = 0x80u64 << (8 * (bytes.len() - 1));
        if magnitude & sign_bit != 0 {
            // An 8-byte magnitude never exceeds i64::MAX once the sign bit is cleared.
            Ok(Self(-((magnitude & !sign_bit) as i64)))
        } else {
            Ok(Self(magnitude as i64))
        }
    }

    /// Minimal little-endian encoding; zero encodes as the empty element.
    pub fn encode(self) -> Vec<u8> {
        let value = self.0;
        if value == 0 {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(9);
        let mut abs_value = value.unsigned_abs();
        while abs_value > 0 {
            result.push((abs_value & 0xff) as u8);
            abs_value >>= 8;
        }

        if let Some(last) = result.last_mut() {
            if *last & 0x80 != 0 {
                result.push(if value < 0 { 0x80 } else { 0x00 });
            } else if value < 0 {
                *last |= 0x80;
            }
        }
        result
    }

    pub fn checked_add(self, other: Self) -> Result<Self, ScriptError> {
        fit(i128::from(self.0) + i128::from(other.0), ScriptError::OpAddOverflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ScriptError> {
        fit(i128::from(self.0) - i128::from(other.0), ScriptError::OpSubUnderflow)
    }

    pub fn checked_mul(self, other: Self) -> Result<Self, ScriptError> {
        fit(i128::from(self.0) * i128::from(other.0), ScriptError::OpMulOverflow)
    }

    /// Truncating division.
    pub fn checked_div(self, other: Self) -> Result<Self, ScriptError> {
        if other.0 == 0 {
            return Err(ScriptError::OpDivByZero);
        }
        fit(i128::from(self.0) / i128::from(other.0), ScriptError::OpDivByZero)
    }

    /// Remainder carrying the sign of the dividend.
    pub fn checked_rem(self, other: Self) -> Result<Self, ScriptError> {
        if other.0 == 0 {
            return Err(ScriptError::OpModByZero);
        }
        fit(i128::from(self.0) % i128::from(other.0), ScriptError::OpModByZero)
    }

    pub fn negate(self) -> Self {
        Self(-self.0)
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScriptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn fit(value: i128, error: ScriptError) -> Result<ScriptNumber, ScriptError> {
    let limit = i128::from(i64::MAX);
    if value > limit || value < -limit {
        return Err(error);
    }
    Ok(ScriptNumber(value as i64))
}

/// True when `bytes` carries no superfluous trailing zero byte.
pub fn is_minimally_encoded(bytes: &[u8]) -> bool {
    let Some(&last) = bytes.last() else {
        return true;
    };
    if last & 0x7f == 0 {
        if bytes.len() == 1 {
            return false;
        }
        if bytes[bytes.len() - 2] & 0x80 == 0 {
            return false;
        }
    }
    true
}

/// Trims a byte string to the minimal encoding of the number it denotes.
pub fn minimally_encode(mut bytes: Vec<u8>) -> Vec<u8> {
    let Some(&last) = bytes.last() else {
        return bytes;
    };
    if last & 0x7f != 0 {
        return bytes;
    }
    if bytes.len() == 1 {
        return Vec::new();
    }
    if bytes[bytes.len() - 2] & 0x80 != 0 {
        return bytes;
    }

    let sign = last & 0x80;
    let mut end = bytes.len() - 1;
    while end > 0 && bytes[end - 1] == 0 {
        end -= 1;
    }
    if end == 0 {
        return Vec::new();
    }
    bytes.truncate(end);
    let top = bytes[end - 1];
    if top & 0x80 != 0 {
        bytes.push(sign);
    } else {
        bytes[end - 1] = top | sign;
    }
    bytes
}
