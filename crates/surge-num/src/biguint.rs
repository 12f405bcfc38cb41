//! Limb arithmetic core
//!
//! `BigUint` is a little-endian vector of 32-bit limbs, always trimmed so
//! the top limb is non-zero; the empty vector is the canonical zero. All
//! arithmetic is schoolbook with u64 intermediate carries. Every operation
//! that allocates checks the limb-count ceiling and fails with
//! `SizeLimitExceeded` rather than letting a hostile literal drive an
//! unbounded allocation.

use crate::error::{NumError, NumResult};
use std::cmp::Ordering;

/// Hard ceiling on limb count (~32M bits).
pub const MAX_LIMBS: usize = 1_000_000;

/// Number of decimal digits carried per formatting chunk (base 1e9).
const DECIMAL_CHUNK_DIGITS: usize = 9;
const DECIMAL_CHUNK_BASE: u32 = 1_000_000_000;

/// Arbitrary-precision unsigned integer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct BigUint {
    /// Little-endian limbs; `limbs.last() != Some(&0)`.
    limbs: Vec<u32>,
}

fn ensure_len(len: usize) -> NumResult<()> {
    if len > MAX_LIMBS {
        Err(NumError::SizeLimitExceeded)
    } else {
        Ok(())
    }
}

impl BigUint {
    /// The zero value (no limbs).
    pub fn zero() -> Self {
        Self { limbs: Vec::new() }
    }

    /// The value one.
    pub fn one() -> Self {
        Self { limbs: vec![1] }
    }

    /// Build from a single limb.
    pub fn from_u32(value: u32) -> Self {
        if value == 0 {
            Self::zero()
        } else {
            Self { limbs: vec![value] }
        }
    }

    /// Build from a 64-bit value.
    pub fn from_u64(value: u64) -> Self {
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        let mut limbs = vec![lo, hi];
        trim(&mut limbs);
        Self { limbs }
    }

    /// Build from raw little-endian limbs, trimming trailing zeros.
    pub fn from_limbs(mut limbs: Vec<u32>) -> NumResult<Self> {
        trim(&mut limbs);
        ensure_len(limbs.len())?;
        Ok(Self { limbs })
    }

    /// The limb slice (little-endian, trimmed).
    pub fn limbs(&self) -> &[u32] {
        &self.limbs
    }

    /// Whether this is the zero value.
    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Whether the low bit is set.
    pub fn is_odd(&self) -> bool {
        self.limbs.first().is_some_and(|l| l & 1 == 1)
    }

    /// Number of significant bits; zero has bit length 0.
    pub fn bit_len(&self) -> u64 {
        match self.limbs.last() {
            None => 0,
            Some(&top) => {
                (self.limbs.len() as u64 - 1) * 32 + (32 - top.leading_zeros() as u64)
            }
        }
    }

    /// Value of bit `index` (false beyond the bit length).
    pub fn bit(&self, index: u64) -> bool {
        let limb = (index / 32) as usize;
        match self.limbs.get(limb) {
            Some(&l) => (l >> (index % 32)) & 1 == 1,
            None => false,
        }
    }

    /// Number of trailing zero bits; 0 for the zero value.
    pub fn trailing_zeros(&self) -> u64 {
        for (i, &limb) in self.limbs.iter().enumerate() {
            if limb != 0 {
                return i as u64 * 32 + limb.trailing_zeros() as u64;
            }
        }
        0
    }

    /// Convert to u64 if the value fits.
    pub fn to_u64(&self) -> Option<u64> {
        match self.limbs.len() {
            0 => Some(0),
            1 => Some(self.limbs[0] as u64),
            2 => Some(self.limbs[0] as u64 | (self.limbs[1] as u64) << 32),
            _ => None,
        }
    }

    // ========================================================================
    // Addition / subtraction
    // ========================================================================

    /// `self + other`.
    pub fn add(&self, other: &BigUint) -> NumResult<BigUint> {
        let (long, short) = if self.limbs.len() >= other.limbs.len() {
            (&self.limbs, &other.limbs)
        } else {
            (&other.limbs, &self.limbs)
        };
        let mut out = Vec::with_capacity(long.len() + 1);
        let mut carry: u64 = 0;
        for i in 0..long.len() {
            let b = short.get(i).copied().unwrap_or(0) as u64;
            let t = long[i] as u64 + b + carry;
            out.push(t as u32);
            carry = t >> 32;
        }
        if carry != 0 {
            out.push(carry as u32);
        }
        ensure_len(out.len())?;
        Ok(BigUint { limbs: out })
    }

    /// `self + small`.
    pub fn add_small(&self, small: u32) -> NumResult<BigUint> {
        let mut out = self.limbs.clone();
        let mut carry = small as u64;
        for limb in out.iter_mut() {
            if carry == 0 {
                break;
            }
            let t = *limb as u64 + carry;
            *limb = t as u32;
            carry = t >> 32;
        }
        if carry != 0 {
            out.push(carry as u32);
        }
        ensure_len(out.len())?;
        Ok(BigUint { limbs: out })
    }

    /// `self - other`; fails with `Underflow` when `self < other`.
    pub fn sub(&self, other: &BigUint) -> NumResult<BigUint> {
        if self.limbs.len() < other.limbs.len() {
            return Err(NumError::Underflow);
        }
        let mut out = Vec::with_capacity(self.limbs.len());
        let mut borrow: i64 = 0;
        for i in 0..self.limbs.len() {
            let b = other.limbs.get(i).copied().unwrap_or(0) as i64;
            let mut t = self.limbs[i] as i64 - b - borrow;
            if t < 0 {
                t += 1 << 32;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out.push(t as u32);
        }
        if borrow != 0 {
            return Err(NumError::Underflow);
        }
        trim(&mut out);
        Ok(BigUint { limbs: out })
    }

    // ========================================================================
    // Multiplication
    // ========================================================================

    /// `self * other`, schoolbook O(n*m).
    pub fn mul(&self, other: &BigUint) -> NumResult<BigUint> {
        if self.is_zero() || other.is_zero() {
            return Ok(BigUint::zero());
        }
        let n = self.limbs.len();
        let m = other.limbs.len();
        ensure_len(n + m)?;
        let mut out = vec![0u32; n + m];
        for i in 0..n {
            let ai = self.limbs[i] as u64;
            let mut carry: u64 = 0;
            for j in 0..m {
                let t = ai * other.limbs[j] as u64 + out[i + j] as u64 + carry;
                out[i + j] = t as u32;
                carry = t >> 32;
            }
            out[i + m] = carry as u32;
        }
        trim(&mut out);
        Ok(BigUint { limbs: out })
    }

    /// `self * small`.
    pub fn mul_small(&self, small: u32) -> NumResult<BigUint> {
        if small == 0 || self.is_zero() {
            return Ok(BigUint::zero());
        }
        let mut out = Vec::with_capacity(self.limbs.len() + 1);
        let mut carry: u64 = 0;
        for &limb in &self.limbs {
            let t = limb as u64 * small as u64 + carry;
            out.push(t as u32);
            carry = t >> 32;
        }
        if carry != 0 {
            out.push(carry as u32);
        }
        ensure_len(out.len())?;
        Ok(BigUint { limbs: out })
    }

    // ========================================================================
    // Division
    // ========================================================================

    /// `(self / other, self % other)`; fails with `DivideByZero`.
    ///
    /// Long division one bit at a time: the divisor is shifted left to align
    /// with the dividend's top bit, then repeatedly compared and subtracted
    /// while shifting back down.
    pub fn div_mod(&self, other: &BigUint) -> NumResult<(BigUint, BigUint)> {
        if other.is_zero() {
            return Err(NumError::DivideByZero);
        }
        if self.cmp(other) == Ordering::Less {
            return Ok((BigUint::zero(), self.clone()));
        }
        let shift = self.bit_len() - other.bit_len();
        let mut d = other.shl(shift)?;
        let mut r = self.clone();
        let mut q = vec![0u32; (shift / 32 + 1) as usize];
        let mut i = shift as i64;
        while i >= 0 {
            if r.cmp(&d) != Ordering::Less {
                r = r.sub(&d)?;
                q[(i / 32) as usize] |= 1 << (i % 32);
            }
            d = d.shr(1);
            i -= 1;
        }
        trim(&mut q);
        Ok((BigUint { limbs: q }, r))
    }

    /// `(self / small, self % small)` with a single-limb divisor.
    pub fn div_mod_small(&self, small: u32) -> NumResult<(BigUint, u32)> {
        if small == 0 {
            return Err(NumError::DivideByZero);
        }
        let mut out = vec![0u32; self.limbs.len()];
        let mut rem: u64 = 0;
        for i in (0..self.limbs.len()).rev() {
            let cur = rem << 32 | self.limbs[i] as u64;
            out[i] = (cur / small as u64) as u32;
            rem = cur % small as u64;
        }
        trim(&mut out);
        Ok((BigUint { limbs: out }, rem as u32))
    }

    // ========================================================================
    // Shifts
    // ========================================================================

    /// `self << bits`.
    pub fn shl(&self, bits: u64) -> NumResult<BigUint> {
        if self.is_zero() || bits == 0 {
            return Ok(self.clone());
        }
        let words = (bits / 32) as usize;
        let rem = (bits % 32) as u32;
        ensure_len(self.limbs.len() + words + 1)?;
        let mut out = vec![0u32; self.limbs.len() + words + 1];
        for (i, &limb) in self.limbs.iter().enumerate() {
            if rem == 0 {
                out[i + words] = limb;
            } else {
                out[i + words] |= limb << rem;
                out[i + words + 1] = limb >> (32 - rem);
            }
        }
        trim(&mut out);
        Ok(BigUint { limbs: out })
    }

    /// `self >> bits` (truncating).
    pub fn shr(&self, bits: u64) -> BigUint {
        if bits >= self.bit_len() {
            return BigUint::zero();
        }
        let words = (bits / 32) as usize;
        let rem = (bits % 32) as u32;
        let mut out = Vec::with_capacity(self.limbs.len() - words);
        for i in words..self.limbs.len() {
            let mut limb = self.limbs[i] >> rem;
            if rem != 0 {
                if let Some(&next) = self.limbs.get(i + 1) {
                    limb |= next << (32 - rem);
                }
            }
            out.push(limb);
        }
        trim(&mut out);
        BigUint { limbs: out }
    }

    /// `self >> bits` rounding the discarded low bits to nearest, ties to
    /// even. The building block for all float mantissa rounding.
    pub fn shr_round_even(&self, bits: u64) -> NumResult<BigUint> {
        if bits == 0 || self.is_zero() {
            return Ok(self.clone());
        }
        let shifted = self.shr(bits);
        let half = self.bit(bits - 1);
        if !half {
            return Ok(shifted);
        }
        let sticky = self.any_bits_below(bits - 1);
        if sticky || shifted.is_odd() {
            shifted.add_small(1)
        } else {
            Ok(shifted)
        }
    }

    /// The low `bits` bits of the value.
    pub fn low_bits(&self, bits: u64) -> BigUint {
        if bits >= self.bit_len() {
            return self.clone();
        }
        let words = (bits / 32) as usize;
        let rem = (bits % 32) as u32;
        let mut out = self.limbs[..words.min(self.limbs.len())].to_vec();
        if rem != 0 {
            if let Some(&limb) = self.limbs.get(words) {
                out.push(limb & ((1u32 << rem) - 1));
            }
        }
        trim(&mut out);
        BigUint { limbs: out }
    }

    fn any_bits_below(&self, bits: u64) -> bool {
        let words = (bits / 32) as usize;
        let rem = (bits % 32) as u32;
        for &limb in self.limbs.iter().take(words.min(self.limbs.len())) {
            if limb != 0 {
                return true;
            }
        }
        if rem != 0 {
            if let Some(&limb) = self.limbs.get(words) {
                return limb & ((1u32 << rem) - 1) != 0;
            }
        }
        false
    }

    // ========================================================================
    // Bitwise
    // ========================================================================

    /// Bitwise AND over zero-extended limbs.
    pub fn bit_and(&self, other: &BigUint) -> BigUint {
        let n = self.limbs.len().min(other.limbs.len());
        let mut out: Vec<u32> = (0..n).map(|i| self.limbs[i] & other.limbs[i]).collect();
        trim(&mut out);
        BigUint { limbs: out }
    }

    /// Bitwise OR over zero-extended limbs.
    pub fn bit_or(&self, other: &BigUint) -> BigUint {
        let n = self.limbs.len().max(other.limbs.len());
        let mut out: Vec<u32> = (0..n)
            .map(|i| {
                self.limbs.get(i).copied().unwrap_or(0) | other.limbs.get(i).copied().unwrap_or(0)
            })
            .collect();
        trim(&mut out);
        BigUint { limbs: out }
    }

    /// Bitwise XOR over zero-extended limbs.
    pub fn bit_xor(&self, other: &BigUint) -> BigUint {
        let n = self.limbs.len().max(other.limbs.len());
        let mut out: Vec<u32> = (0..n)
            .map(|i| {
                self.limbs.get(i).copied().unwrap_or(0) ^ other.limbs.get(i).copied().unwrap_or(0)
            })
            .collect();
        trim(&mut out);
        BigUint { limbs: out }
    }

    // ========================================================================
    // Powers
    // ========================================================================

    /// `10^n` by binary exponentiation.
    pub fn pow10(n: u32) -> NumResult<BigUint> {
        Self::pow_small(10, n)
    }

    /// `5^n` by binary exponentiation.
    pub fn pow5(n: u32) -> NumResult<BigUint> {
        Self::pow_small(5, n)
    }

    fn pow_small(base: u32, mut n: u32) -> NumResult<BigUint> {
        let mut result = BigUint::one();
        let mut acc = BigUint::from_u32(base);
        while n > 0 {
            if n & 1 == 1 {
                result = result.mul(&acc)?;
            }
            n >>= 1;
            if n > 0 {
                acc = acc.mul(&acc)?;
            }
        }
        Ok(result)
    }

    // ========================================================================
    // Decimal formatting
    // ========================================================================

    /// Format in a power-of-two radix (2, 8, or 16) by peeling bit groups,
    /// lowercase digits, no prefix.
    pub fn to_radix(&self, radix: u32) -> String {
        let bits_per_digit = match radix {
            2 => 1,
            8 => 3,
            16 => 4,
            other => panic!("unsupported radix {other}"),
        };
        if self.is_zero() {
            return "0".to_string();
        }
        let digits = self.bit_len().div_ceil(bits_per_digit);
        let mut out = String::with_capacity(digits as usize);
        for i in (0..digits).rev() {
            let mut digit = 0u32;
            for bit in (0..bits_per_digit).rev() {
                digit = digit << 1 | self.bit(i * bits_per_digit + bit) as u32;
            }
            out.push(char::from_digit(digit, radix).unwrap());
        }
        out
    }

    /// Format as a decimal string by peeling base-1e9 chunks.
    pub fn to_decimal(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let mut chunks: Vec<u32> = Vec::new();
        let mut cur = self.clone();
        while !cur.is_zero() {
            // Single-limb divisor cannot fail for a non-zero base.
            let (q, r) = match cur.div_mod_small(DECIMAL_CHUNK_BASE) {
                Ok(pair) => pair,
                Err(_) => unreachable!("chunk base is non-zero"),
            };
            chunks.push(r);
            cur = q;
        }
        let mut out = String::with_capacity(chunks.len() * DECIMAL_CHUNK_DIGITS);
        for (i, chunk) in chunks.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&chunk.to_string());
            } else {
                out.push_str(&format!("{:09}", chunk));
            }
        }
        out
    }
}

impl PartialOrd for BigUint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Magnitude ordering: longer trimmed limb vectors are larger; equal lengths
/// compare limbs from the top down.
impl Ord for BigUint {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.limbs.len() != other.limbs.len() {
            return self.limbs.len().cmp(&other.limbs.len());
        }
        for i in (0..self.limbs.len()).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

fn trim(limbs: &mut Vec<u32>) {
    while limbs.last() == Some(&0) {
        limbs.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn big(v: u64) -> BigUint {
        BigUint::from_u64(v)
    }

    fn random_biguint(rng: &mut impl Rng, max_limbs: usize) -> BigUint {
        let len = rng.gen_range(0..=max_limbs);
        let limbs: Vec<u32> = (0..len).map(|_| rng.gen()).collect();
        BigUint::from_limbs(limbs).unwrap()
    }

    #[test]
    fn test_zero_representation() {
        assert!(BigUint::zero().is_zero());
        assert_eq!(BigUint::from_u32(0), BigUint::zero());
        assert_eq!(BigUint::from_u64(0), BigUint::zero());
        assert_eq!(BigUint::zero().bit_len(), 0);
        assert_eq!(BigUint::zero().to_decimal(), "0");
    }

    #[test]
    fn test_trim_invariant() {
        let v = BigUint::from_limbs(vec![7, 0, 0]).unwrap();
        assert_eq!(v.limbs(), &[7]);
        let z = BigUint::from_limbs(vec![0, 0]).unwrap();
        assert!(z.is_zero());
    }

    #[test]
    fn test_add_carry_chain() {
        let a = BigUint::from_limbs(vec![u32::MAX, u32::MAX]).unwrap();
        let sum = a.add_small(1).unwrap();
        assert_eq!(sum.limbs(), &[0, 0, 1]);
        assert_eq!(a.add(&BigUint::one()).unwrap(), sum);
    }

    #[test]
    fn test_sub_underflow() {
        assert_eq!(big(5).sub(&big(7)), Err(NumError::Underflow));
        assert_eq!(big(7).sub(&big(7)).unwrap(), BigUint::zero());
        assert_eq!(big(7).sub(&big(5)).unwrap(), big(2));
    }

    #[test]
    fn test_sub_borrow_chain() {
        let a = BigUint::from_limbs(vec![0, 0, 1]).unwrap();
        let r = a.sub(&BigUint::one()).unwrap();
        assert_eq!(r.limbs(), &[u32::MAX, u32::MAX]);
    }

    #[test]
    fn test_mul_basic() {
        assert_eq!(big(0).mul(&big(1234)).unwrap(), BigUint::zero());
        assert_eq!(big(12).mul(&big(34)).unwrap(), big(408));
        let a = big(u64::MAX);
        let sq = a.mul(&a).unwrap();
        // (2^64 - 1)^2 = 2^128 - 2^65 + 1
        assert_eq!(sq.to_decimal(), "340282366920938463426481119284349108225");
    }

    #[test]
    fn test_mul_matches_repeated_addition() {
        let a = big(123_456_789);
        let mut acc = BigUint::zero();
        for _ in 0..37 {
            acc = acc.add(&a).unwrap();
        }
        assert_eq!(a.mul_small(37).unwrap(), acc);
    }

    #[test]
    fn test_div_mod_by_zero() {
        assert_eq!(big(1).div_mod(&BigUint::zero()), Err(NumError::DivideByZero));
        assert_eq!(big(1).div_mod_small(0), Err(NumError::DivideByZero));
    }

    #[test]
    fn test_div_mod_basic() {
        let (q, r) = big(1_000_003).div_mod(&big(997)).unwrap();
        assert_eq!(q.to_u64(), Some(1003));
        assert_eq!(r.to_u64(), Some(12));
        let (q, r) = big(12).div_mod(&big(1_000)).unwrap();
        assert!(q.is_zero());
        assert_eq!(r.to_u64(), Some(12));
    }

    #[test]
    fn test_div_mod_small_matches_div_mod() {
        let a = BigUint::pow10(40).unwrap().add_small(987_654_321).unwrap();
        let (q1, r1) = a.div_mod(&big(1_000_000_007)).unwrap();
        let (q2, r2) = a.div_mod_small(1_000_000_007).unwrap();
        assert_eq!(q1, q2);
        assert_eq!(r1.to_u64(), Some(r2 as u64));
    }

    #[test]
    fn test_shift_round_trip() {
        let a = big(0xDEAD_BEEF_CAFE);
        for bits in [0u64, 1, 31, 32, 33, 64, 100] {
            assert_eq!(a.shl(bits).unwrap().shr(bits), a);
        }
    }

    #[test]
    fn test_shr_past_end() {
        assert_eq!(big(255).shr(8), BigUint::zero());
        assert_eq!(big(255).shr(100), BigUint::zero());
    }

    #[test]
    fn test_shr_round_even() {
        // 0b101 >> 1: half bit set, sticky below empty, shifted=0b10 even -> stays
        assert_eq!(big(5).shr_round_even(1).unwrap(), big(2));
        // 0b11 >> 1: tie, shifted=1 odd -> rounds up to 2
        assert_eq!(big(3).shr_round_even(1).unwrap(), big(2));
        // 0b110 >> 2: half set, sticky set -> rounds up
        assert_eq!(big(6).shr_round_even(2).unwrap(), big(2));
        // 1 >> 1: exactly half of even 0 -> 0
        assert_eq!(big(1).shr_round_even(1).unwrap(), BigUint::zero());
        // shift by zero is identity
        assert_eq!(big(9).shr_round_even(0).unwrap(), big(9));
    }

    #[test]
    fn test_bitwise_zero_extension() {
        let a = big(0xFF00FF00FF00FF00);
        let b = big(0x0F0F);
        assert_eq!(a.bit_and(&b), big(0x0F00));
        assert_eq!(a.bit_or(&b), big(0xFF00FF00FF00FF0F));
        assert_eq!(a.bit_xor(&b), big(0xFF00FF00FF00F00F));
    }

    #[test]
    fn test_bit_len() {
        assert_eq!(big(1).bit_len(), 1);
        assert_eq!(big(255).bit_len(), 8);
        assert_eq!(big(256).bit_len(), 9);
        assert_eq!(BigUint::from_limbs(vec![0, 1]).unwrap().bit_len(), 33);
    }

    #[test]
    fn test_trailing_zeros() {
        assert_eq!(big(8).trailing_zeros(), 3);
        assert_eq!(big(1).trailing_zeros(), 0);
        assert_eq!(BigUint::from_limbs(vec![0, 2]).unwrap().trailing_zeros(), 33);
    }

    #[test]
    fn test_low_bits() {
        let a = big(0b1101_1011);
        assert_eq!(a.low_bits(4), big(0b1011));
        assert_eq!(a.low_bits(64), a);
        assert_eq!(a.low_bits(0), BigUint::zero());
    }

    #[test]
    fn test_pow10_pow5() {
        assert_eq!(BigUint::pow10(0).unwrap(), BigUint::one());
        assert_eq!(BigUint::pow10(3).unwrap(), big(1000));
        assert_eq!(BigUint::pow5(4).unwrap(), big(625));
        assert_eq!(
            BigUint::pow10(20).unwrap().to_decimal(),
            "100000000000000000000"
        );
    }

    #[test]
    fn test_to_radix() {
        assert_eq!(big(0).to_radix(16), "0");
        assert_eq!(big(255).to_radix(16), "ff");
        assert_eq!(big(255).to_radix(2), "11111111");
        assert_eq!(big(8).to_radix(8), "10");
        assert_eq!(big(0xDEAD_BEEF).to_radix(16), "deadbeef");
        let wide = BigUint::from_limbs(vec![0x89AB_CDEF, 0x0123_4567]).unwrap();
        assert_eq!(wide.to_radix(16), "123456789abcdef");
    }

    #[test]
    fn test_random_radix_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xba5e);
        for _ in 0..50 {
            let a = random_biguint(&mut rng, 4);
            for radix in [2u32, 8, 16] {
                let text = a.to_radix(radix);
                let mut back = BigUint::zero();
                for c in text.chars() {
                    back = back
                        .mul_small(radix)
                        .unwrap()
                        .add_small(c.to_digit(radix).unwrap())
                        .unwrap();
                }
                assert_eq!(back, a, "radix {radix}");
            }
        }
    }

    #[test]
    fn test_decimal_chunks_pad() {
        // Interior chunks must be zero-padded to nine digits.
        let v = BigUint::pow10(18).unwrap().add_small(7).unwrap();
        assert_eq!(v.to_decimal(), "1000000000000000007");
    }

    #[test]
    fn test_size_limit() {
        let near = BigUint::from_limbs(vec![1; MAX_LIMBS]).unwrap();
        assert_eq!(near.shl(64), Err(NumError::SizeLimitExceeded));
        assert_eq!(near.mul(&near), Err(NumError::SizeLimitExceeded));
    }

    #[test]
    fn test_random_add_commutative() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let a = random_biguint(&mut rng, 8);
            let b = random_biguint(&mut rng, 8);
            assert_eq!(a.add(&b).unwrap(), b.add(&a).unwrap());
        }
    }

    #[test]
    fn test_random_add_sub_inverse() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xfeed);
        for _ in 0..200 {
            let a = random_biguint(&mut rng, 8);
            let b = random_biguint(&mut rng, 8);
            let (hi, lo) = if a.cmp(&b) == Ordering::Less { (b, a) } else { (a, b) };
            assert_eq!(hi.sub(&lo).unwrap().add(&lo).unwrap(), hi);
        }
    }

    #[test]
    fn test_random_div_mod_reconstruction() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0xd1ce);
        for _ in 0..100 {
            let a = random_biguint(&mut rng, 8);
            let mut b = random_biguint(&mut rng, 4);
            if b.is_zero() {
                b = BigUint::one();
            }
            let (q, r) = a.div_mod(&b).unwrap();
            assert_eq!(q.mul(&b).unwrap().add(&r).unwrap(), a);
            assert_eq!(r.cmp(&b), Ordering::Less);
        }
    }

    #[test]
    fn test_random_shift_consistency() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x0ff5);
        for _ in 0..100 {
            let a = random_biguint(&mut rng, 6);
            let bits = rng.gen_range(0u64..200);
            let shifted = a.shl(bits).unwrap();
            assert_eq!(shifted.shr(bits), a);
            if !a.is_zero() {
                assert_eq!(shifted.bit_len(), a.bit_len() + bits);
            }
        }
    }
}
