use crate::num::grisu::{self, MAX_DIGITS};

/// Quoted because JSON has no literal for them.
pub const NAN: &[u8] = b"\"NaN\"";
pub const INFINITY: &[u8] = b"\"Infinity\"";
pub const NEG_INFINITY: &[u8] = b"\"-Infinity\"";

/// Appends the shortest representation of `value` that parses back to the
/// same double.
///
/// Integral values keep a trailing `.0`; magnitudes outside `[1e-6, 1e21)`
/// switch to `d.dddE±x`.
pub fn write_f64(out: &mut Vec<u8>, value: f64) {
    if value.is_nan() {
        out.extend_from_slice(NAN);
        return;
    }
    if value.is_infinite() {
        out.extend_from_slice(if value > 0.0 { INFINITY } else { NEG_INFINITY });
        return;
    }
    if value == 0.0 {
        let zero: &[u8] = if value.is_sign_negative() { b"-0.0" } else { b"0.0" };
        out.extend_from_slice(zero);
        return;
    }

    let negative = value.is_sign_negative();
    let magnitude = value.abs();
    let mut buffer = [0u8; MAX_DIGITS];
    if let Some((len, point)) = grisu::shortest(magnitude, &mut buffer) {
        layout(out, negative, &buffer[..len], point);
        return;
    }

    let mut ryu = ryu::Buffer::new();
    let (digits, point) = decompose(ryu.format_finite(magnitude));
    layout(out, negative, &digits, point);
}

pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    if !value.is_finite() || value == 0.0 {
        write_f64(out, f64::from(value));
        return;
    }
    // Shortest f32 digits, so 0.1f32 prints as 0.1 rather than its widened form.
    let mut ryu = ryu::Buffer::new();
    let (digits, point) = decompose(ryu.format_finite(value.abs()));
    layout(out, value.is_sign_negative(), &digits, point);
}

/// Splits ryu output such as `1.2345e-7` into significant digits and a
/// decimal point position.
fn decompose(text: &str) -> (Vec<u8>, i32) {
    let (mantissa, exponent) = match text.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (text, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: Vec<u8> = int.bytes().chain(frac.bytes()).collect();
    let mut point = int.len() as i32 + exponent;

    let leading = digits.iter().take_while(|&&d| d == b'0').count();
    digits.drain(..leading);
    point -= leading as i32;
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    (digits, point)
}

/// Renders `0.d1d2...dk * 10^point`.
fn layout(out: &mut Vec<u8>, negative: bool, digits: &[u8], point: i32) {
    if negative {
        out.push(b'-');
    }
    let len = digits.len() as i32;

    if 0 < point && point <= 21 {
        if point >= len {
            out.extend_from_slice(digits);
            out.extend(std::iter::repeat(b'0').take((point - len) as usize));
            out.extend_from_slice(b".0");
        } else {
            let (int, frac) = digits.split_at(point as usize);
            out.extend_from_slice(int);
            out.push(b'.');
            out.extend_from_slice(frac);
        }
        return;
    }

    if -6 < point && point <= 0 {
        out.extend_from_slice(b"0.");
        out.extend(std::iter::repeat(b'0').take(point.unsigned_abs() as usize));
        out.extend_from_slice(digits);
        return;
    }

    let (first, rest) = digits.split_at(1);
    out.extend_from_slice(first);
    out.push(b'.');
    if rest.is_empty() {
        out.push(b'0');
    } else {
        out.extend_from_slice(rest);
    }
    out.push(b'E');
    let exponent = point - 1;
    if exponent < 0 {
        out.push(b'-');
    }
    let mut buf = itoa::Buffer::new();
    out.extend_from_slice(buf.format(exponent.unsigned_abs()).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(value: f64) -> String {
        let mut out = Vec::new();
        write_f64(&mut out, value);
        String::from_utf8(out).unwrap()
    }

    #[rstest::rstest]
    #[case(4204.3, "4204.3")]
    #[case(3751242155626800.5, "3751242155626800.5")]
    #[case(1.0, "1.0")]
    #[case(-2.5, "-2.5")]
    #[case(100.0, "100.0")]
    #[case(0.1, "0.1")]
    #[case(0.000001, "0.000001")]
    #[case(1e-7, "1.0E-7")]
    #[case(1.2565011332672846e-52, "1.2565011332672846E-52")]
    #[case(2.159602538102293e176, "2.159602538102293E176")]
    #[case(1.5e-10, "1.5E-10")]
    #[case(1e20, "100000000000000000000.0")]
    #[case(1e21, "1.0E21")]
    #[case(1.2345e300, "1.2345E300")]
    fn test_write_f64(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(formatted(value), expected);
    }

    #[rstest::rstest]
    #[case(0.0, "0.0")]
    #[case(-0.0, "-0.0")]
    #[case(f64::NAN, "\"NaN\"")]
    #[case(f64::INFINITY, "\"Infinity\"")]
    #[case(f64::NEG_INFINITY, "\"-Infinity\"")]
    fn test_special_values(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(formatted(value), expected);
    }

    #[rstest::rstest]
    fn test_round_trip_extremes() {
        for value in [
            f64::MAX,
            f64::MIN,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            5e-324,
            -1.7976931348623157e308,
            0.30000000000000004,
        ] {
            let text = formatted(value);
            assert_eq!(text.parse::<f64>().unwrap(), value, "{text}");
        }
    }

    #[rstest::rstest]
    fn test_decompose_ryu_output() {
        assert_eq!(decompose("4204.3"), (b"42043".to_vec(), 4));
        assert_eq!(decompose("1e-7"), (b"1".to_vec(), -6));
        assert_eq!(decompose("0.001"), (b"1".to_vec(), -2));
        assert_eq!(decompose("1.5e20"), (b"15".to_vec(), 21));
        assert_eq!(decompose("100.0"), (b"1".to_vec(), 3));
    }

    #[rstest::rstest]
    fn test_write_f32_uses_single_precision_digits() {
        let mut out = Vec::new();
        write_f32(&mut out, 0.1);
        assert_eq!(out, b"0.1");
    }
}
