use num_bigint::BigInt;

use crate::num::decimal::Decimal;
use crate::{Error, Result};

/// Layout of a validated JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberShape {
    pub negative: bool,
    pub int_digits: usize,
    pub frac_digits: usize,
    /// Byte index of the exponent marker, if any.
    pub exponent_at: Option<usize>,
}

impl NumberShape {
    pub fn is_integer(&self) -> bool {
        self.frac_digits == 0 && self.exponent_at.is_none()
    }

    pub fn digit_count(&self) -> usize {
        self.int_digits + self.frac_digits
    }
}

/// Checks `bytes` against the JSON number grammar:
/// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`
pub fn validate(bytes: &[u8]) -> Result<NumberShape> {
    let mut idx = 0;
    let negative = bytes.first() == Some(&b'-');
    if negative {
        idx += 1;
    }

    let int_start = idx;
    match bytes.get(idx) {
        Some(b'0') => idx += 1,
        Some(b'1'..=b'9') => idx += count_digits(&bytes[idx..]),
        Some(_) => return Err(invalid_number(bytes)),
        None if bytes.is_empty() => return Err(Error::malformed("expected a number")),
        None => return Err(invalid_number(bytes)),
    }
    let int_digits = idx - int_start;

    let mut frac_digits = 0;
    if bytes.get(idx) == Some(&b'.') {
        idx += 1;
        frac_digits = count_digits(&bytes[idx..]);
        if frac_digits == 0 {
            return Err(invalid_number(bytes));
        }
        idx += frac_digits;
    }

    let mut exponent_at = None;
    if matches!(bytes.get(idx), Some(b'e' | b'E')) {
        exponent_at = Some(idx);
        idx += 1;
        if matches!(bytes.get(idx), Some(b'+' | b'-')) {
            idx += 1;
        }
        let exp_digits = count_digits(&bytes[idx..]);
        if exp_digits == 0 {
            return Err(invalid_number(bytes));
        }
        idx += exp_digits;
    }

    if idx != bytes.len() {
        return Err(invalid_number(bytes));
    }

    Ok(NumberShape {
        negative,
        int_digits,
        frac_digits,
        exponent_at,
    })
}

#[inline]
fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|byte| byte.is_ascii_digit()).count()
}

fn invalid_number(bytes: &[u8]) -> Error {
    Error::malformed(format!("invalid number '{}'", bytes.escape_ascii()))
}

fn overflow(bytes: &[u8], target: &str) -> Error {
    Error::malformed(format!(
        "integer overflow: '{}' does not fit in {target}",
        bytes.escape_ascii()
    ))
}

fn require_integer(bytes: &[u8], target: &str) -> Result<NumberShape> {
    let shape = validate(bytes)?;
    if !shape.is_integer() {
        return Err(Error::malformed(format!(
            "expected {target}, found '{}'",
            bytes.escape_ascii()
        )));
    }
    Ok(shape)
}

pub fn parse_i64(bytes: &[u8]) -> Result<i64> {
    let shape = require_integer(bytes, "an integer")?;
    let digits = &bytes[usize::from(shape.negative)..];
    // Accumulate negatively so that i64::MIN is representable.
    let mut value: i64 = 0;
    for &byte in digits {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_sub(i64::from(byte - b'0')))
            .ok_or_else(|| overflow(bytes, "i64"))?;
    }
    if shape.negative {
        Ok(value)
    } else {
        value.checked_neg().ok_or_else(|| overflow(bytes, "i64"))
    }
}

pub fn parse_i32(bytes: &[u8]) -> Result<i32> {
    let value = parse_i64(bytes)?;
    i32::try_from(value).map_err(|_| overflow(bytes, "i32"))
}

pub fn parse_i16(bytes: &[u8]) -> Result<i16> {
    let value = parse_i64(bytes)?;
    i16::try_from(value).map_err(|_| overflow(bytes, "i16"))
}

pub fn parse_u64(bytes: &[u8]) -> Result<u64> {
    let shape = require_integer(bytes, "an unsigned integer")?;
    if shape.negative {
        if bytes == b"-0" {
            return Ok(0);
        }
        return Err(overflow(bytes, "u64"));
    }
    let mut value: u64 = 0;
    for &byte in bytes {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| overflow(bytes, "u64"))?;
    }
    Ok(value)
}

/// Correctly rounded; magnitudes beyond `f64::MAX` become infinite.
pub fn parse_f64(bytes: &[u8]) -> Result<f64> {
    validate(bytes)?;
    // The grammar check guarantees ASCII.
    let text = std::str::from_utf8(bytes).map_err(|_| invalid_number(bytes))?;
    text.parse::<f64>().map_err(|_| invalid_number(bytes))
}

pub fn parse_big_integer(bytes: &[u8], max_digits: usize) -> Result<BigInt> {
    let shape = require_integer(bytes, "an integer")?;
    if shape.digit_count() > max_digits {
        return Err(Error::number_too_long(max_digits));
    }
    BigInt::parse_bytes(bytes, 10).ok_or_else(|| invalid_number(bytes))
}

pub fn parse_decimal(bytes: &[u8], max_digits: usize) -> Result<Decimal> {
    let shape = validate(bytes)?;
    if shape.digit_count() > max_digits {
        return Err(Error::number_too_long(max_digits));
    }

    let sign_len = usize::from(shape.negative);
    let int_end = sign_len + shape.int_digits;
    let mut digits = Vec::with_capacity(shape.digit_count() + 1);
    if shape.negative {
        digits.push(b'-');
    }
    digits.extend_from_slice(&bytes[sign_len..int_end]);
    if shape.frac_digits > 0 {
        digits.extend_from_slice(&bytes[int_end + 1..int_end + 1 + shape.frac_digits]);
    }
    let unscaled = BigInt::parse_bytes(&digits, 10).ok_or_else(|| invalid_number(bytes))?;

    let exponent = match shape.exponent_at {
        Some(at) => parse_exponent(&bytes[at + 1..]).ok_or_else(|| invalid_number(bytes))?,
        None => 0,
    };
    let scale = (shape.frac_digits as i64)
        .checked_sub(exponent)
        .ok_or_else(|| invalid_number(bytes))?;
    Ok(Decimal::new(unscaled, scale))
}

fn parse_exponent(bytes: &[u8]) -> Option<i64> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    let mut value: i64 = 0;
    for &byte in digits {
        value = value.checked_mul(10)?.checked_add(i64::from(byte - b'0'))?;
    }
    if value > i64::from(i32::MAX) {
        return None;
    }
    Some(if negative { -value } else { value })
}

pub fn write_i64(out: &mut Vec<u8>, value: i64) {
    let mut buf = itoa::Buffer::new();
    out.extend_from_slice(buf.format(value).as_bytes());
}

pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    let mut buf = itoa::Buffer::new();
    out.extend_from_slice(buf.format(value).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[rstest::rstest]
    #[case("0", true)]
    #[case("-0", true)]
    #[case("12", true)]
    #[case("-12.5", false)]
    #[case("1e10", false)]
    #[case("1.5E-3", false)]
    #[case("0.0", false)]
    fn test_validate_accepts(#[case] input: &str, #[case] integer: bool) {
        let shape = validate(input.as_bytes()).unwrap();
        assert_eq!(shape.is_integer(), integer);
    }

    #[rstest::rstest]
    #[case("")]
    #[case("-")]
    #[case("01")]
    #[case("1.")]
    #[case(".5")]
    #[case("1e")]
    #[case("1e+")]
    #[case("+1")]
    #[case("1x")]
    #[case("--1")]
    #[case("Infinity")]
    fn test_validate_rejects(#[case] input: &str) {
        let err = validate(input.as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
    }

    #[rstest::rstest]
    fn test_parse_integers() {
        assert_eq!(parse_i64(b"-9223372036854775808").unwrap(), i64::MIN);
        assert_eq!(parse_i64(b"9223372036854775807").unwrap(), i64::MAX);
        assert_eq!(parse_i32(b"-2147483648").unwrap(), i32::MIN);
        assert_eq!(parse_i16(b"32767").unwrap(), i16::MAX);
        assert_eq!(parse_u64(b"18446744073709551615").unwrap(), u64::MAX);
        assert_eq!(parse_u64(b"-0").unwrap(), 0);
    }

    #[rstest::rstest]
    #[case("9223372036854775808")]
    #[case("-9223372036854775809")]
    fn test_parse_i64_overflow(#[case] input: &str) {
        let err = parse_i64(input.as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedToken);
        assert!(err.message.contains("overflow"));
    }

    #[rstest::rstest]
    fn test_narrow_overflow() {
        assert!(parse_i32(b"2147483648").is_err());
        assert!(parse_i16(b"-32769").is_err());
        assert!(parse_u64(b"18446744073709551616").is_err());
        assert!(parse_u64(b"-1").is_err());
    }

    #[rstest::rstest]
    fn test_integer_reads_reject_fractions() {
        assert!(parse_i64(b"1.0").is_err());
        assert!(parse_i32(b"1e3").is_err());
    }

    #[rstest::rstest]
    fn test_parse_f64() {
        assert_eq!(parse_f64(b"4204.3").unwrap(), 4204.3);
        assert_eq!(parse_f64(b"-0.0").unwrap().to_bits(), (-0.0f64).to_bits());
        assert_eq!(parse_f64(b"1e400").unwrap(), f64::INFINITY);
        assert!(parse_f64(b"NaN").is_err());
    }

    #[rstest::rstest]
    fn test_parse_big_integer() {
        let value = parse_big_integer(b"-123456789012345678901234567890", 100).unwrap();
        assert_eq!(value.to_string(), "-123456789012345678901234567890");

        let err = parse_big_integer(b"12345", 4).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumberTooLong);
    }

    #[rstest::rstest]
    fn test_parse_decimal() {
        let value = parse_decimal(b"-12.345e1", 100).unwrap();
        assert_eq!(value.unscaled().to_string(), "-12345");
        assert_eq!(value.scale(), 2);

        let err = parse_decimal(b"1.2345", 4).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NumberTooLong);
    }

    #[rstest::rstest]
    fn test_write_integers() {
        let mut out = Vec::new();
        write_i64(&mut out, -42);
        out.push(b',');
        write_u64(&mut out, u64::MAX);
        assert_eq!(out, b"-42,18446744073709551615");
    }
}
