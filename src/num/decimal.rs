use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};

use crate::constants::MAX_NUMBER_DIGITS;
use crate::num::number::parse_decimal;
use crate::Error;

/// Arbitrary-precision decimal: `unscaled * 10^-scale`.
///
/// Equality is structural, so `1.0` and `1.00` are different values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: BigInt,
    scale: i64,
}

impl Decimal {
    pub fn new(unscaled: BigInt, scale: i64) -> Self {
        Self { unscaled, scale }
    }

    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    pub fn scale(&self) -> i64 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.unscaled.sign() == Sign::NoSign
    }

    pub fn to_f64(&self) -> f64 {
        // Display output is always valid float syntax.
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl From<BigInt> for Decimal {
    fn from(value: BigInt) -> Self {
        Self::new(value, 0)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        parse_decimal(text.as_bytes(), MAX_NUMBER_DIGITS)
    }
}

/// Plain notation while the adjusted exponent is at least -6 and the scale is
/// not negative, scientific (`1.23E+5`) otherwise. Both are valid JSON numbers.
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.magnitude().to_string();
        if self.unscaled.sign() == Sign::Minus {
            f.write_str("-")?;
        }
        let len = digits.len() as i64;
        let adjusted = len - 1 - self.scale;

        if self.scale >= 0 && adjusted >= -6 {
            let scale = self.scale as usize;
            if scale == 0 {
                return f.write_str(&digits);
            }
            if digits.len() > scale {
                let (int, frac) = digits.split_at(digits.len() - scale);
                return write!(f, "{int}.{frac}");
            }
            f.write_str("0.")?;
            for _ in 0..scale - digits.len() {
                f.write_str("0")?;
            }
            return f.write_str(&digits);
        }

        let (first, rest) = digits.split_at(1);
        f.write_str(first)?;
        if !rest.is_empty() {
            write!(f, ".{rest}")?;
        }
        if adjusted >= 0 {
            write!(f, "E+{adjusted}")
        } else {
            write!(f, "E{adjusted}")
        }
    }
}
