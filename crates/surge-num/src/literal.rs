//! Numeric literal boundary
//!
//! Compile-time literals arrive pre-validated, so the `*_from_literal`
//! entry points treat malformed input as fatal; the `parse_*` variants are
//! the runtime-parsing counterparts and report malformed input as `None`.
//! Numeric domain errors (a literal blowing the limb ceiling) are fatal on
//! both paths.
//!
//! Integers take an optional `0x`/`0b`/`0o` radix prefix; floats use
//! `[sign]digits[.digits][e|E[sign]digits]`. Underscores are permitted as
//! digit-group separators and ASCII whitespace is trimmed from both ends.

use crate::bigfloat::BigFloat;
use crate::bigint::BigInt;
use crate::biguint::BigUint;
use crate::error::{NumError, NumResult};
use surge_sdk::fatal;

enum LiteralError {
    Malformed,
    Num(NumError),
}

impl From<NumError> for LiteralError {
    fn from(err: NumError) -> Self {
        LiteralError::Num(err)
    }
}

type LiteralResult<T> = Result<T, LiteralError>;

// ============================================================================
// Public entry points
// ============================================================================

/// Parse an unsigned integer literal; malformed input is fatal.
pub fn biguint_from_literal(text: &str) -> BigUint {
    unwrap_literal(uint_literal(text), "malformed unsigned integer literal")
}

/// Parse a signed integer literal; malformed input is fatal.
pub fn bigint_from_literal(text: &str) -> BigInt {
    unwrap_literal(int_literal(text), "malformed integer literal")
}

/// Parse a decimal float literal; malformed input is fatal.
pub fn bigfloat_from_literal(text: &str) -> BigFloat {
    unwrap_literal(float_literal(text), "malformed float literal")
}

/// Runtime parse of an unsigned integer; `None` on malformed input.
pub fn parse_biguint(text: &str) -> Option<BigUint> {
    option_literal(uint_literal(text))
}

/// Runtime parse of a signed integer; `None` on malformed input.
pub fn parse_bigint(text: &str) -> Option<BigInt> {
    option_literal(int_literal(text))
}

/// Runtime parse of a decimal float; `None` on malformed input.
pub fn parse_bigfloat(text: &str) -> Option<BigFloat> {
    option_literal(float_literal(text))
}

fn unwrap_literal<T>(result: LiteralResult<T>, malformed_msg: &str) -> T {
    match result {
        Ok(value) => value,
        Err(LiteralError::Malformed) => fatal::raise(fatal::CODE_NUMERIC, malformed_msg),
        Err(LiteralError::Num(err)) => err.raise(),
    }
}

fn option_literal<T>(result: LiteralResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(LiteralError::Malformed) => None,
        Err(LiteralError::Num(err)) => err.raise(),
    }
}

// ============================================================================
// Integer parsing
// ============================================================================

fn uint_literal(text: &str) -> LiteralResult<BigUint> {
    let text = trim_ws(text);
    let text = text.strip_prefix('+').unwrap_or(text);
    let (radix, digits) = split_radix_prefix(text);
    accumulate_digits(digits, radix)
}

fn int_literal(text: &str) -> LiteralResult<BigInt> {
    let text = trim_ws(text);
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = split_radix_prefix(rest);
    let magnitude = accumulate_digits(digits, radix)?;
    Ok(BigInt::new(negative, magnitude))
}

fn trim_ws(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_ascii_whitespace())
}

fn split_radix_prefix(text: &str) -> (u32, &str) {
    if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        (2, rest)
    } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        (8, rest)
    } else {
        (10, text)
    }
}

/// Fold digit characters into a BigUint, skipping underscore separators.
/// At least one real digit is required.
fn accumulate_digits(digits: &str, radix: u32) -> LiteralResult<BigUint> {
    let mut value = BigUint::zero();
    let mut seen = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix).ok_or(LiteralError::Malformed)?;
        value = value.mul_small(radix)?.add_small(d)?;
        seen = true;
    }
    if !seen {
        return Err(LiteralError::Malformed);
    }
    Ok(value)
}

// ============================================================================
// Float parsing
// ============================================================================

fn float_literal(text: &str) -> LiteralResult<BigFloat> {
    let text = trim_ws(text);
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let bytes = rest.as_bytes();
    let mut pos = 0;
    let mut digits = String::new();

    let int_len = take_decimal_digits(bytes, pos, &mut digits);
    if int_len == 0 {
        return Err(LiteralError::Malformed);
    }
    pos += int_len;

    let mut frac_digits = 0u32;
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        let before = digits.len();
        let frac_len = take_decimal_digits(bytes, pos, &mut digits);
        if frac_len == 0 {
            return Err(LiteralError::Malformed);
        }
        pos += frac_len;
        frac_digits = (digits.len() - before) as u32;
    }

    let mut exp10: i64 = 0;
    if matches!(bytes.get(pos), Some(b'e') | Some(b'E')) {
        pos += 1;
        let exp_negative = match bytes.get(pos) {
            Some(b'-') => {
                pos += 1;
                true
            }
            Some(b'+') => {
                pos += 1;
                false
            }
            _ => false,
        };
        let mut exp_str = String::new();
        let exp_len = take_decimal_digits(bytes, pos, &mut exp_str);
        if exp_len == 0 {
            return Err(LiteralError::Malformed);
        }
        pos += exp_len;
        for b in exp_str.bytes() {
            exp10 = exp10
                .checked_mul(10)
                .and_then(|v| v.checked_add((b - b'0') as i64))
                .ok_or(NumError::SizeLimitExceeded)?;
        }
        if exp_negative {
            exp10 = -exp10;
        }
    }

    if pos != bytes.len() {
        return Err(LiteralError::Malformed);
    }

    let mantissa = accumulate_digits(&digits, 10)?;
    Ok(decimal_to_float(negative, mantissa, exp10 - frac_digits as i64)?)
}

/// Consume `[0-9_]+` starting at `pos`, appending real digits to `out`.
/// Returns the number of bytes consumed (zero if no digit was found).
fn take_decimal_digits(bytes: &[u8], pos: usize, out: &mut String) -> usize {
    let mut len = 0;
    let mut seen = false;
    while let Some(&b) = bytes.get(pos + len) {
        match b {
            b'0'..=b'9' => {
                out.push(b as char);
                seen = true;
                len += 1;
            }
            b'_' => len += 1,
            _ => break,
        }
    }
    if seen {
        len
    } else {
        0
    }
}

/// `value = mantissa * 10^exp10`, routed through the exact-ratio conversion.
fn decimal_to_float(negative: bool, mantissa: BigUint, exp10: i64) -> NumResult<BigFloat> {
    if mantissa.is_zero() {
        return Ok(BigFloat::zero());
    }
    let power = exp10.unsigned_abs();
    if power > u32::MAX as u64 {
        return Err(NumError::SizeLimitExceeded);
    }
    let scale = BigUint::pow10(power as u32)?;
    if exp10 >= 0 {
        let num = mantissa.mul(&scale)?;
        BigFloat::from_ratio(negative, &num, &BigUint::one())
    } else {
        BigFloat::from_ratio(negative, &mantissa, &scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_decimal_uint() {
        assert_eq!(parse_biguint("0").unwrap(), BigUint::zero());
        assert_eq!(parse_biguint("12345").unwrap(), BigUint::from_u64(12345));
        assert_eq!(
            parse_biguint("1_000_000").unwrap(),
            BigUint::from_u64(1_000_000)
        );
        assert_eq!(parse_biguint(" 42 ").unwrap(), BigUint::from_u64(42));
        assert_eq!(parse_biguint("+7").unwrap(), BigUint::from_u64(7));
    }

    #[test]
    fn test_parse_radix_prefixes() {
        assert_eq!(parse_biguint("0xFF").unwrap(), BigUint::from_u64(255));
        assert_eq!(parse_biguint("0Xff_ff").unwrap(), BigUint::from_u64(65535));
        assert_eq!(parse_biguint("0b1010").unwrap(), BigUint::from_u64(10));
        assert_eq!(parse_biguint("0o777").unwrap(), BigUint::from_u64(511));
        assert_eq!(parse_bigint("-0x10").unwrap(), BigInt::from_i64(-16));
    }

    #[test]
    fn test_parse_malformed_uint() {
        for bad in ["", "_", "12a", "0x", "0b", "0x_", "1２3", "-5", "+ 5"] {
            assert!(parse_biguint(bad).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_parse_bigint_signs() {
        assert_eq!(parse_bigint("-12345").unwrap(), BigInt::from_i64(-12345));
        assert_eq!(parse_bigint("+12345").unwrap(), BigInt::from_i64(12345));
        // "-0" normalizes to canonical zero
        let z = parse_bigint("-0").unwrap();
        assert_eq!(z, BigInt::zero());
        assert!(!z.is_negative());
    }

    #[test]
    fn test_int_decimal_round_trip() {
        for s in ["0", "1", "-1", "999999999999999999999999999", "-42"] {
            assert_eq!(parse_bigint(s).unwrap().to_decimal(), s);
        }
        // Leading zeros normalize away.
        assert_eq!(parse_bigint("007").unwrap().to_decimal(), "7");
        assert_eq!(parse_bigint("-007").unwrap().to_decimal(), "-7");
    }

    #[test]
    fn test_parse_float_basic() {
        assert_eq!(parse_bigfloat("0").unwrap(), BigFloat::zero());
        assert_eq!(parse_bigfloat("1.5").unwrap().format().unwrap(), "1.5");
        assert_eq!(parse_bigfloat("-2.0").unwrap().format().unwrap(), "-2");
        assert_eq!(parse_bigfloat("0.1").unwrap().format().unwrap(), "0.1");
        assert_eq!(parse_bigfloat("1_0.2_5").unwrap().format().unwrap(), "10.25");
    }

    #[test]
    fn test_parse_float_exponent() {
        assert_eq!(parse_bigfloat("1.5e3").unwrap().format().unwrap(), "1500");
        assert_eq!(parse_bigfloat("2E-3").unwrap().format().unwrap(), "0.002");
        assert_eq!(parse_bigfloat("25e-1").unwrap().format().unwrap(), "2.5");
        assert_eq!(parse_bigfloat("1e10").unwrap().format().unwrap(), "10000000000");
        assert_eq!(parse_bigfloat("0e99999").unwrap(), BigFloat::zero());
    }

    #[test]
    fn test_parse_malformed_float() {
        for bad in ["", ".", ".5", "1.", "1.2.3", "1e", "1e+", "--1.0", "1.5f"] {
            assert!(parse_bigfloat(bad).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_float_ordering_of_literals() {
        let near_threehalves =
            "1.49999999999999999999999999999999999999999999999999999999999999999999999999";
        let ordered = [
            parse_bigfloat("-2.0").unwrap(),
            parse_bigfloat("0").unwrap(),
            parse_bigfloat(near_threehalves).unwrap(),
            parse_bigfloat("1.5").unwrap(),
        ];
        for i in 0..ordered.len() {
            for j in 0..ordered.len() {
                assert_eq!(ordered[i].cmp(&ordered[j]), i.cmp(&j), "{i} vs {j}");
            }
        }
    }

    #[test]
    fn test_from_literal_accepts_valid() {
        assert_eq!(biguint_from_literal("99"), BigUint::from_u64(99));
        assert_eq!(bigint_from_literal("-3"), BigInt::from_i64(-3));
        assert_eq!(bigfloat_from_literal("2.5").format().unwrap(), "2.5");
    }
}
