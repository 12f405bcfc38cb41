//! Signed arbitrary-precision integers
//!
//! Sign + magnitude over [`BigUint`]. Zero is canonically non-negative.
//! Division truncates toward zero (C semantics); bitwise operations are
//! defined by two's-complement emulation at a width one bit wider than the
//! larger operand, so the sign-magnitude representation never leaks into
//! observable results.

use crate::biguint::BigUint;
use crate::error::{NumError, NumResult};
use std::cmp::Ordering;

/// Arbitrary-precision signed integer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BigInt {
    negative: bool,
    magnitude: BigUint,
}

impl BigInt {
    /// The zero value.
    pub fn zero() -> Self {
        Self {
            negative: false,
            magnitude: BigUint::zero(),
        }
    }

    /// Build from a sign and magnitude, canonicalizing negative zero.
    pub fn new(negative: bool, magnitude: BigUint) -> Self {
        Self {
            negative: negative && !magnitude.is_zero(),
            magnitude,
        }
    }

    /// Build from an i64.
    pub fn from_i64(value: i64) -> Self {
        Self::new(value < 0, BigUint::from_u64(value.unsigned_abs()))
    }

    /// Build a non-negative value from a u64.
    pub fn from_u64(value: u64) -> Self {
        Self::new(false, BigUint::from_u64(value))
    }

    /// Whether the value is negative (zero never is).
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Whether this is the zero value.
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    /// The magnitude.
    pub fn magnitude(&self) -> &BigUint {
        &self.magnitude
    }

    /// Convert to i64 if the value fits.
    pub fn to_i64(&self) -> Option<i64> {
        let mag = self.magnitude.to_u64()?;
        if self.negative {
            if mag > 1 << 63 {
                None
            } else {
                Some((mag as i64).wrapping_neg())
            }
        } else if mag > i64::MAX as u64 {
            None
        } else {
            Some(mag as i64)
        }
    }

    /// The negation; `-0` stays `0`.
    pub fn neg(&self) -> BigInt {
        Self::new(!self.negative, self.magnitude.clone())
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// `self + other`. Same signs add magnitudes; different signs subtract
    /// the smaller magnitude from the larger, which donates its sign.
    pub fn add(&self, other: &BigInt) -> NumResult<BigInt> {
        if self.negative == other.negative {
            return Ok(Self::new(self.negative, self.magnitude.add(&other.magnitude)?));
        }
        match self.magnitude.cmp(&other.magnitude) {
            Ordering::Equal => Ok(BigInt::zero()),
            Ordering::Greater => Ok(Self::new(
                self.negative,
                self.magnitude.sub(&other.magnitude)?,
            )),
            Ordering::Less => Ok(Self::new(
                other.negative,
                other.magnitude.sub(&self.magnitude)?,
            )),
        }
    }

    /// `self - other`.
    pub fn sub(&self, other: &BigInt) -> NumResult<BigInt> {
        self.add(&other.neg())
    }

    /// `self * other`; the result sign is the XOR of the operand signs.
    pub fn mul(&self, other: &BigInt) -> NumResult<BigInt> {
        Ok(Self::new(
            self.negative != other.negative,
            self.magnitude.mul(&other.magnitude)?,
        ))
    }

    /// Truncating division: `(quotient, remainder)` with the quotient sign
    /// the XOR of the operand signs and the remainder sign following the
    /// dividend.
    pub fn div_mod(&self, other: &BigInt) -> NumResult<(BigInt, BigInt)> {
        let (q, r) = self.magnitude.div_mod(&other.magnitude)?;
        Ok((
            Self::new(self.negative != other.negative, q),
            Self::new(self.negative, r),
        ))
    }

    // ========================================================================
    // Shifts
    // ========================================================================

    /// `self << bits`.
    pub fn shl(&self, bits: u64) -> NumResult<BigInt> {
        Ok(Self::new(self.negative, self.magnitude.shl(bits)?))
    }

    /// `self >> bits`, arithmetic: negative values round toward negative
    /// infinity, computed as `-ceil(|a| / 2^bits)` on the magnitude.
    pub fn shr(&self, bits: u64) -> NumResult<BigInt> {
        if !self.negative {
            return Ok(Self::new(false, self.magnitude.shr(bits)));
        }
        if bits >= self.magnitude.bit_len() {
            // Everything shifted out: floor of a negative fraction is -1.
            return Ok(BigInt::from_i64(-1));
        }
        let bias = BigUint::one().shl(bits)?.sub(&BigUint::one())?;
        let mag = self.magnitude.add(&bias)?.shr(bits);
        Ok(Self::new(true, mag))
    }

    /// Validate a shift amount held in a BigInt: negative or wider than an
    /// i32 fails (overflow class).
    pub fn shift_amount(&self) -> NumResult<u64> {
        if self.negative {
            return Err(NumError::NegativeShift);
        }
        match self.magnitude.to_u64() {
            Some(v) if v <= i32::MAX as u64 => Ok(v),
            _ => Err(NumError::NegativeShift),
        }
    }

    // ========================================================================
    // Bitwise (two's-complement emulation)
    // ========================================================================

    /// Bitwise AND.
    pub fn bit_and(&self, other: &BigInt) -> NumResult<BigInt> {
        self.bitwise(other, BigUint::bit_and)
    }

    /// Bitwise OR.
    pub fn bit_or(&self, other: &BigInt) -> NumResult<BigInt> {
        self.bitwise(other, BigUint::bit_or)
    }

    /// Bitwise XOR.
    pub fn bit_xor(&self, other: &BigInt) -> NumResult<BigInt> {
        self.bitwise(other, BigUint::bit_xor)
    }

    /// Map both operands to two's complement at a width one bit wider than
    /// the larger operand, apply `op` on the unsigned images, and decode the
    /// result sign from the top bit.
    fn bitwise(
        &self,
        other: &BigInt,
        op: fn(&BigUint, &BigUint) -> BigUint,
    ) -> NumResult<BigInt> {
        let width = self.magnitude.bit_len().max(other.magnitude.bit_len()) + 1;
        let modulus = BigUint::one().shl(width)?;
        let a = self.to_twos(&modulus)?;
        let b = other.to_twos(&modulus)?;
        let raw = op(&a, &b);
        if raw.bit(width - 1) {
            Ok(Self::new(true, modulus.sub(&raw)?))
        } else {
            Ok(Self::new(false, raw))
        }
    }

    fn to_twos(&self, modulus: &BigUint) -> NumResult<BigUint> {
        if self.negative {
            modulus.sub(&self.magnitude)
        } else {
            Ok(self.magnitude.clone())
        }
    }

    // ========================================================================
    // Comparison / formatting
    // ========================================================================

    /// Three-way signed comparison.
    pub fn cmp(&self, other: &BigInt) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
        }
    }

    /// Format as a decimal string.
    pub fn to_decimal(&self) -> String {
        if self.negative {
            format!("-{}", self.magnitude.to_decimal())
        } else {
            self.magnitude.to_decimal()
        }
    }

    /// Format in a power-of-two radix with a sign and no prefix.
    pub fn to_radix(&self, radix: u32) -> String {
        if self.negative {
            format!("-{}", self.magnitude.to_radix(radix))
        } else {
            self.magnitude.to_radix(radix)
        }
    }
}
