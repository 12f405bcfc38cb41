//! Arbitrary-precision binary float
//!
//! `value = mantissa * 2^exponent * (-1 if negative)`, where a non-zero
//! mantissa is normalized to occupy exactly [`MANTISSA_BITS`] bits. Zero is
//! the empty mantissa (exponent 0, non-negative). Every path that can drop
//! mantissa bits rounds half-to-even, and normalization re-rounds once when
//! a round-up overflows the mantissa width.

use crate::bigint::BigInt;
use crate::biguint::BigUint;
use crate::error::{NumError, NumResult};
use std::cmp::Ordering;

/// Fixed mantissa width of a normalized non-zero float.
pub const MANTISSA_BITS: u64 = 256;

/// Maximum significant decimal digits emitted by `format`. A 256-bit
/// mantissa resolves just over 77 decimal digits; cutting one short keeps
/// the binary approximation noise of terminating decimals out of the
/// output.
const MAX_SIG_DIGITS: usize = 76;

/// Fractional magnitudes smaller than `10^-PLAIN_FRAC_ZEROS` switch to
/// scientific notation.
const PLAIN_FRAC_ZEROS: usize = 4;

/// Arbitrary-precision binary floating-point value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigFloat {
    negative: bool,
    exponent: i32,
    mantissa: BigUint,
}

impl BigFloat {
    /// The zero value.
    pub fn zero() -> Self {
        Self {
            negative: false,
            exponent: 0,
            mantissa: BigUint::zero(),
        }
    }

    /// Build from parts, normalizing the mantissa to 256 bits.
    pub fn new(negative: bool, exponent: i64, mantissa: BigUint) -> NumResult<Self> {
        Self::normalize(negative, exponent, mantissa)
    }

    /// Whether this is the zero value.
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Whether the value is negative (zero never is).
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Binary exponent (0 for zero).
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Normalized mantissa (empty for zero).
    pub fn mantissa(&self) -> &BigUint {
        &self.mantissa
    }

    /// Enforce the normalization invariant: round an over-wide mantissa
    /// right (half-to-even, re-rounding once if the round-up overflows) or
    /// shift a narrow one left, adjusting the exponent either way.
    fn normalize(negative: bool, exponent: i64, mantissa: BigUint) -> NumResult<Self> {
        if mantissa.is_zero() {
            return Ok(Self::zero());
        }
        let mut exponent = exponent;
        let mut mantissa = mantissa;
        let bits = mantissa.bit_len() as i64;
        let width = MANTISSA_BITS as i64;
        if bits > width {
            let shift = (bits - width) as u64;
            mantissa = mantissa.shr_round_even(shift)?;
            exponent += shift as i64;
            if mantissa.bit_len() as i64 > width {
                mantissa = mantissa.shr_round_even(1)?;
                exponent += 1;
            }
        } else if bits < width {
            let shift = (width - bits) as u64;
            mantissa = mantissa.shl(shift)?;
            exponent -= shift as i64;
        }
        if exponent < i32::MIN as i64 || exponent > i32::MAX as i64 {
            return Err(NumError::SizeLimitExceeded);
        }
        Ok(Self {
            negative,
            exponent: exponent as i32,
            mantissa,
        })
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// Exact conversion from an unsigned integer.
    pub fn from_biguint(value: &BigUint) -> NumResult<Self> {
        Self::normalize(false, 0, value.clone())
    }

    /// Exact conversion from a signed integer.
    pub fn from_bigint(value: &BigInt) -> NumResult<Self> {
        Self::normalize(value.is_negative(), 0, value.magnitude().clone())
    }

    /// Truncate toward zero to an unsigned integer; a negative value fails
    /// with `Underflow`.
    pub fn to_biguint(&self) -> NumResult<BigUint> {
        if self.is_zero() {
            return Ok(BigUint::zero());
        }
        if self.negative {
            return Err(NumError::Underflow);
        }
        self.magnitude_trunc()
    }

    /// Truncate toward zero to a signed integer.
    pub fn to_bigint(&self) -> NumResult<BigInt> {
        if self.is_zero() {
            return Ok(BigInt::zero());
        }
        let mag = self.magnitude_trunc()?;
        Ok(BigInt::new(self.negative, mag))
    }

    fn magnitude_trunc(&self) -> NumResult<BigUint> {
        if self.exponent >= 0 {
            self.mantissa.shl(self.exponent as u64)
        } else {
            Ok(self.mantissa.shr(-(self.exponent as i64) as u64))
        }
    }

    /// The integer part of the value, as a float (truncation toward zero).
    fn trunc(&self) -> NumResult<Self> {
        if self.is_zero() || self.exponent >= 0 {
            return Ok(self.clone());
        }
        let mag = self.mantissa.shr(-(self.exponent as i64) as u64);
        Self::normalize(self.negative, 0, mag)
    }

    /// Round `num / den` to a 256-bit mantissa. The single conversion point
    /// used by decimal-literal parsing.
    ///
    /// Computes `floor(log2(num/den))` from the bit-length difference plus
    /// one shift-compare refinement, scales so the integer quotient occupies
    /// exactly 256 bits, divides, and rounds half-to-even on the true
    /// remainder.
    pub fn from_ratio(negative: bool, num: &BigUint, den: &BigUint) -> NumResult<Self> {
        if den.is_zero() {
            return Err(NumError::DivideByZero);
        }
        if num.is_zero() {
            return Ok(Self::zero());
        }
        let mut log2 = num.bit_len() as i64 - den.bit_len() as i64;
        let at_least = if log2 >= 0 {
            num.cmp(&den.shl(log2 as u64)?) != Ordering::Less
        } else {
            num.shl((-log2) as u64)?.cmp(den) != Ordering::Less
        };
        if !at_least {
            log2 -= 1;
        }
        // 2^log2 <= num/den < 2^(log2+1); scale the quotient into
        // [2^255, 2^256).
        let scale = (MANTISSA_BITS as i64 - 1) - log2;
        let (n, d) = if scale >= 0 {
            (num.shl(scale as u64)?, den.clone())
        } else {
            (num.clone(), den.shl((-scale) as u64)?)
        };
        let (q, r) = n.div_mod(&d)?;
        let q = round_quotient_half_even(q, &r, &d)?;
        Self::normalize(negative, log2 - (MANTISSA_BITS as i64 - 1), q)
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// `self + other`: align the smaller exponent up (rounding half-even),
    /// then combine magnitudes by sign agreement. Exact cancellation
    /// returns the canonical zero.
    pub fn add(&self, other: &BigFloat) -> NumResult<BigFloat> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }
        let (hi, lo) = if self.exponent >= other.exponent {
            (self, other)
        } else {
            (other, self)
        };
        let shift = (hi.exponent as i64 - lo.exponent as i64) as u64;
        let lo_mant = lo.mantissa.shr_round_even(shift)?;
        let exponent = hi.exponent as i64;
        if hi.negative == lo.negative {
            return Self::normalize(hi.negative, exponent, hi.mantissa.add(&lo_mant)?);
        }
        match hi.mantissa.cmp(&lo_mant) {
            Ordering::Equal => Ok(Self::zero()),
            Ordering::Greater => {
                Self::normalize(hi.negative, exponent, hi.mantissa.sub(&lo_mant)?)
            }
            Ordering::Less => Self::normalize(lo.negative, exponent, lo_mant.sub(&hi.mantissa)?),
        }
    }

    /// `self - other`.
    pub fn sub(&self, other: &BigFloat) -> NumResult<BigFloat> {
        self.add(&other.neg())
    }

    /// The negation; `-0` stays `0`.
    pub fn neg(&self) -> BigFloat {
        if self.is_zero() {
            return Self::zero();
        }
        Self {
            negative: !self.negative,
            exponent: self.exponent,
            mantissa: self.mantissa.clone(),
        }
    }

    /// `self * other`: magnitude product, exponent sum, normalize.
    pub fn mul(&self, other: &BigFloat) -> NumResult<BigFloat> {
        if self.is_zero() || other.is_zero() {
            return Ok(Self::zero());
        }
        let mant = self.mantissa.mul(&other.mantissa)?;
        Self::normalize(
            self.negative != other.negative,
            self.exponent as i64 + other.exponent as i64,
            mant,
        )
    }

    /// `self / other`: the dividend mantissa is scaled left by the mantissa
    /// width before integer division, and the quotient rounds to nearest
    /// even on the true remainder (`2r` vs divisor).
    pub fn div(&self, other: &BigFloat) -> NumResult<BigFloat> {
        if other.is_zero() {
            return Err(NumError::DivideByZero);
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let scaled = self.mantissa.shl(MANTISSA_BITS)?;
        let (q, r) = scaled.div_mod(&other.mantissa)?;
        let q = round_quotient_half_even(q, &r, &other.mantissa)?;
        Self::normalize(
            self.negative != other.negative,
            self.exponent as i64 - other.exponent as i64 - MANTISSA_BITS as i64,
            q,
        )
    }

    /// `self mod other`, defined via the truncating quotient:
    /// `a - trunc(a/b)*b`. The result sign follows `self`.
    pub fn rem(&self, other: &BigFloat) -> NumResult<BigFloat> {
        if other.is_zero() {
            return Err(NumError::DivideByZero);
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        let q = self.div(other)?.trunc()?;
        self.sub(&q.mul(other)?)
    }

    // ========================================================================
    // Comparison
    // ========================================================================

    /// Three-way comparison consistent with numeric value.
    ///
    /// Normalized mantissas are exactly 256 bits wide, so for equal signs
    /// the exponent orders magnitudes and the mantissa breaks ties.
    pub fn cmp(&self, other: &BigFloat) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => return Ordering::Equal,
            (true, false) => {
                return if other.negative {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                return if self.negative {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {}
        }
        if self.negative != other.negative {
            return if self.negative {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        let magnitude = if self.exponent != other.exponent {
            self.exponent.cmp(&other.exponent)
        } else {
            self.mantissa.cmp(&other.mantissa)
        };
        if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        }
    }

    // ========================================================================
    // Decimal formatting
    // ========================================================================

    /// Format as decimal text.
    ///
    /// Non-negative exponents shift the mantissa left and print a plain
    /// integer. Negative exponents split the value at the binary point; the
    /// fractional part's exact decimal digits come from a `5^n` multiply
    /// (after shedding trailing zero bits, which is the fast path when the
    /// binary fraction divides out evenly). Output is capped at 76
    /// significant digits, trailing zeros stripped, and small pure
    /// fractions switch to `D.DDDE-exp` scientific form.
    pub fn format(&self) -> NumResult<String> {
        if self.is_zero() {
            return Ok("0".to_string());
        }
        let sign = if self.negative { "-" } else { "" };
        if self.exponent >= 0 {
            let int = self.mantissa.shl(self.exponent as u64)?;
            return Ok(format!("{sign}{}", int.to_decimal()));
        }

        let frac_bits = -(self.exponent as i64) as u64;
        let int_part = self.mantissa.shr(frac_bits);
        let frac = self.mantissa.low_bits(frac_bits);
        let mut int_str = int_part.to_decimal();
        if frac.is_zero() {
            return Ok(format!("{sign}{int_str}"));
        }

        // frac / 2^n == frac * 5^n / 10^n; shedding trailing zero bits
        // first keeps the power small.
        let trailing = frac.trailing_zeros();
        let digits = frac_bits - trailing;
        if digits > u32::MAX as u64 {
            return Err(NumError::SizeLimitExceeded);
        }
        let scaled = frac.shr(trailing).mul(&BigUint::pow5(digits as u32)?)?;
        let mut frac_str = scaled.to_decimal();
        if (frac_str.len() as u64) < digits {
            let pad = digits as usize - frac_str.len();
            frac_str = "0".repeat(pad) + &frac_str;
        }

        round_fraction(&mut int_str, &mut frac_str, !int_part.is_zero());
        while frac_str.ends_with('0') {
            frac_str.pop();
        }

        if int_str != "0" || frac_str.is_empty() {
            if frac_str.is_empty() {
                return Ok(format!("{sign}{int_str}"));
            }
            return Ok(format!("{sign}{int_str}.{frac_str}"));
        }

        let zeros = frac_str.bytes().take_while(|&b| b == b'0').count();
        if zeros < PLAIN_FRAC_ZEROS {
            return Ok(format!("{sign}0.{frac_str}"));
        }
        let sig = &frac_str[zeros..];
        let exp10 = zeros + 1;
        if sig.len() == 1 {
            Ok(format!("{sign}{sig}E-{exp10}"))
        } else {
            Ok(format!("{sign}{}.{}E-{exp10}", &sig[..1], &sig[1..]))
        }
    }
}

/// Round an integer quotient to nearest even given the division remainder:
/// `2r > d` rounds up, `2r == d` rounds to even.
fn round_quotient_half_even(q: BigUint, r: &BigUint, d: &BigUint) -> NumResult<BigUint> {
    let doubled = r.shl(1)?;
    match doubled.cmp(d) {
        Ordering::Greater => q.add_small(1),
        Ordering::Equal => {
            if q.is_odd() {
                q.add_small(1)
            } else {
                Ok(q)
            }
        }
        Ordering::Less => Ok(q),
    }
}

/// Cap the fraction digits so the total significant digits stay within
/// `MAX_SIG_DIGITS`, rounding half-up at the cut and carrying into the
/// integer digits when the fraction overflows to 1.0.
fn round_fraction(int_str: &mut String, frac_str: &mut String, int_nonzero: bool) {
    let allowed = if int_nonzero {
        MAX_SIG_DIGITS.saturating_sub(int_str.len())
    } else {
        let zeros = frac_str.bytes().take_while(|&b| b == b'0').count();
        zeros + MAX_SIG_DIGITS
    };
    if frac_str.len() <= allowed {
        return;
    }
    let round_up = frac_str.as_bytes()[allowed] >= b'5';
    frac_str.truncate(allowed);
    if round_up && increment_digits(frac_str) {
        // Fraction carried out: 0.999... became 1.000...
        let overflowed = increment_digits(int_str);
        if overflowed {
            int_str.insert(0, '1');
        }
    }
}

/// Add one to a decimal digit string in place. Returns true when every
/// digit was 9 (the string is now all zeros and the carry escaped).
fn increment_digits(digits: &mut String) -> bool {
    // Safety: the buffer holds ASCII digits only.
    let bytes = unsafe { digits.as_mut_vec() };
    for b in bytes.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(num: u64, den: u64) -> BigFloat {
        BigFloat::from_ratio(false, &BigUint::from_u64(num), &BigUint::from_u64(den)).unwrap()
    }

    fn neg_ratio(num: u64, den: u64) -> BigFloat {
        BigFloat::from_ratio(true, &BigUint::from_u64(num), &BigUint::from_u64(den)).unwrap()
    }

    #[test]
    fn test_zero_canonical() {
        let z = BigFloat::zero();
        assert!(z.is_zero());
        assert!(!z.is_negative());
        assert_eq!(z.exponent(), 0);
        assert_eq!(z.format().unwrap(), "0");
    }

    #[test]
    fn test_mantissa_invariant() {
        for v in [1u64, 2, 3, 1000, u64::MAX] {
            let f = BigFloat::from_biguint(&BigUint::from_u64(v)).unwrap();
            assert_eq!(f.mantissa().bit_len(), MANTISSA_BITS);
        }
        let q = ratio(1, 3);
        assert_eq!(q.mantissa().bit_len(), MANTISSA_BITS);
    }

    #[test]
    fn test_integer_round_trip() {
        for v in [0u64, 1, 5, 42, 1_000_000, u64::MAX] {
            let f = BigFloat::from_biguint(&BigUint::from_u64(v)).unwrap();
            assert_eq!(f.format().unwrap(), v.to_string());
            assert_eq!(f.to_biguint().unwrap(), BigUint::from_u64(v));
        }
    }

    #[test]
    fn test_exact_fractions_format() {
        assert_eq!(ratio(1, 2).format().unwrap(), "0.5");
        assert_eq!(ratio(3, 4).format().unwrap(), "0.75");
        assert_eq!(ratio(15, 4).format().unwrap(), "3.75");
        assert_eq!(neg_ratio(3, 2).format().unwrap(), "-1.5");
        assert_eq!(ratio(1, 1024).format().unwrap(), "0.0009765625");
    }

    #[test]
    fn test_terminating_decimal_round_trip() {
        // 0.1 is not dyadic; exactness comes from the 76-digit output cap.
        assert_eq!(ratio(1, 10).format().unwrap(), "0.1");
        assert_eq!(ratio(3, 1000).format().unwrap(), "0.003");
        assert_eq!(neg_ratio(12345, 100).format().unwrap(), "-123.45");
    }

    #[test]
    fn test_scientific_form() {
        // Four leading fraction zeros is the plain/scientific boundary.
        assert_eq!(ratio(1, 10_000).format().unwrap(), "0.0001");
        assert_eq!(ratio(1, 100_000).format().unwrap(), "1E-5");
        assert_eq!(ratio(15, 1_000_000).format().unwrap(), "1.5E-5");
        assert_eq!(neg_ratio(1, 100_000).format().unwrap(), "-1E-5");
    }

    #[test]
    fn test_add_alignment() {
        let a = ratio(3, 2); // 1.5
        let b = ratio(9, 4); // 2.25
        assert_eq!(a.add(&b).unwrap().format().unwrap(), "3.75");
        let big = BigFloat::from_biguint(&BigUint::from_u64(1 << 40)).unwrap();
        let sum = big.add(&ratio(1, 4)).unwrap();
        assert_eq!(sum.format().unwrap(), format!("{}.25", 1u64 << 40));
    }

    #[test]
    fn test_sub_cancellation_to_zero() {
        let a = ratio(7, 3);
        let d = a.sub(&a).unwrap();
        assert!(d.is_zero());
        assert!(!d.is_negative());
    }

    #[test]
    fn test_mixed_sign_add() {
        let a = ratio(5, 2); // 2.5
        let b = neg_ratio(3, 2); // -1.5
        assert_eq!(a.add(&b).unwrap().format().unwrap(), "1");
        assert_eq!(b.add(&a).unwrap().format().unwrap(), "1");
        let c = neg_ratio(7, 2); // -3.5
        assert_eq!(a.add(&c).unwrap().format().unwrap(), "-1");
    }

    #[test]
    fn test_mul() {
        assert_eq!(ratio(3, 2).mul(&ratio(3, 2)).unwrap().format().unwrap(), "2.25");
        assert_eq!(
            neg_ratio(1, 2).mul(&ratio(8, 1)).unwrap().format().unwrap(),
            "-4"
        );
        assert!(ratio(3, 2).mul(&BigFloat::zero()).unwrap().is_zero());
    }

    #[test]
    fn test_div() {
        assert_eq!(ratio(1, 1).div(&ratio(4, 1)).unwrap().format().unwrap(), "0.25");
        assert_eq!(ratio(7, 1).div(&ratio(2, 1)).unwrap().format().unwrap(), "3.5");
        assert_eq!(
            ratio(1, 1).div(&BigFloat::zero()),
            Err(NumError::DivideByZero)
        );
        // 1/3 then *3 comes back to 1 within rounding.
        let third = ratio(1, 1).div(&ratio(3, 1)).unwrap();
        let one = third.mul(&ratio(3, 1)).unwrap();
        assert_eq!(one.format().unwrap(), "1");
    }

    #[test]
    fn test_div_matches_from_ratio() {
        let a = ratio(1, 10);
        let b = ratio(1, 1).div(&ratio(10, 1)).unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rem() {
        assert_eq!(ratio(7, 1).rem(&ratio(2, 1)).unwrap().format().unwrap(), "1");
        assert_eq!(
            ratio(15, 2).rem(&ratio(2, 1)).unwrap().format().unwrap(),
            "1.5"
        );
        // Result sign follows the dividend.
        assert_eq!(
            neg_ratio(7, 1).rem(&ratio(2, 1)).unwrap().format().unwrap(),
            "-1"
        );
        assert_eq!(
            ratio(1, 1).rem(&BigFloat::zero()),
            Err(NumError::DivideByZero)
        );
    }

    #[test]
    fn test_trunc_conversions() {
        assert_eq!(
            ratio(15, 4).to_biguint().unwrap(),
            BigUint::from_u64(3)
        );
        assert_eq!(
            neg_ratio(15, 4).to_bigint().unwrap(),
            BigInt::from_i64(-3)
        );
        // -0.75 truncates to signed zero, canonically non-negative.
        assert_eq!(neg_ratio(3, 4).to_bigint().unwrap(), BigInt::zero());
        assert_eq!(neg_ratio(15, 4).to_biguint(), Err(NumError::Underflow));
    }

    #[test]
    fn test_cmp_total_order() {
        let values = [
            neg_ratio(2, 1),
            neg_ratio(3, 2),
            BigFloat::zero(),
            ratio(1, 100_000),
            ratio(3, 2),
            ratio(2, 1),
        ];
        for i in 0..values.len() {
            for j in 0..values.len() {
                let expect = i.cmp(&j);
                assert_eq!(values[i].cmp(&values[j]), expect, "{i} vs {j}");
            }
        }
    }

    #[test]
    fn test_round_half_even_in_division() {
        // (2^256 + 1) / 2 = 2^255 + 0.5 ties on the dropped bit and rounds
        // to the even neighbor 2^255.
        let odd = BigUint::one().shl(256).unwrap().add_small(1).unwrap();
        let f = BigFloat::from_ratio(false, &odd, &BigUint::from_u64(2)).unwrap();
        let expect = BigFloat::new(false, 0, BigUint::one().shl(255).unwrap()).unwrap();
        assert_eq!(f, expect);
    }

    #[test]
    fn test_normalize_overflow_reround() {
        // A mantissa of all ones rounds up to a power of two one bit wider,
        // which must be re-rounded back into 256 bits.
        let all_ones = BigUint::one().shl(257).unwrap().sub(&BigUint::one()).unwrap();
        let f = BigFloat::new(false, 0, all_ones).unwrap();
        assert_eq!(f.mantissa().bit_len(), MANTISSA_BITS);
        assert_eq!(f.mantissa(), &BigUint::one().shl(255).unwrap());
        assert_eq!(f.exponent(), 2);
    }
}
