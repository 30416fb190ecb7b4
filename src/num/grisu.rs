//! Grisu3 shortest-digit generation.
//!
//! Produces the shortest decimal digit string that reads back as the same
//! double, or `None` for the small fraction of inputs where the error bounds
//! cannot prove the result. Callers fall back to `ryu` in that case.

use std::sync::OnceLock;

use num_bigint::BigUint;

const SIGNIFICAND_MASK: u64 = 0x000F_FFFF_FFFF_FFFF;
const HIDDEN_BIT: u64 = 0x0010_0000_0000_0000;
const EXPONENT_BIAS: i32 = 0x3FF + 52;
const DENORMAL_EXPONENT: i32 = 1 - EXPONENT_BIAS;

const MIN_TARGET_EXPONENT: i32 = -60;
const MAX_TARGET_EXPONENT: i32 = -32;

const CACHED_POWERS_OFFSET: i32 = 348;
const CACHED_POWERS_STEP: i32 = 8;
const CACHED_POWERS_LEN: i32 = 87;
const D_1_LOG2_10: f64 = 0.301_029_995_663_981_14;

/// Longest digit string Grisu3 can emit for a double.
pub const MAX_DIGITS: usize = 18;

/// `f * 2^e` with a 64-bit significand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiyFp {
    f: u64,
    e: i32,
}

impl DiyFp {
    fn new(f: u64, e: i32) -> Self {
        Self { f, e }
    }

    fn normalize(self) -> Self {
        let shift = self.f.leading_zeros();
        Self::new(self.f << shift, self.e - shift as i32)
    }

    /// Product rounded to the upper 64 bits.
    fn times(self, other: Self) -> Self {
        let product = u128::from(self.f) * u128::from(other.f);
        let rounded = (product + (1u128 << 63)) >> 64;
        Self::new(rounded as u64, self.e + other.e + 64)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPower {
    f: u64,
    e: i32,
    decimal_exponent: i32,
}

static CACHED_POWERS: OnceLock<Vec<CachedPower>> = OnceLock::new();

/// Normalized `10^k` for `k = -348, -340, ..., 340`, correctly rounded.
fn cached_powers() -> &'static [CachedPower] {
    CACHED_POWERS.get_or_init(|| {
        (0..CACHED_POWERS_LEN)
            .map(|idx| power_of_ten(idx * CACHED_POWERS_STEP - CACHED_POWERS_OFFSET))
            .collect()
    })
}

fn power_of_ten(k: i32) -> CachedPower {
    let ten = BigUint::from(10u32);
    let (f, e) = if k >= 0 {
        let power = ten.pow(k.unsigned_abs());
        let bits = power.bits();
        if bits <= 64 {
            let f = low_u64(&power) << (64 - bits);
            (f, bits as i32 - 64)
        } else {
            let shift = bits - 64;
            let f = low_u64(&(&power >> shift));
            round_half_up(f, shift as i32, power.bit(shift - 1))
        }
    } else {
        let divisor = ten.pow(k.unsigned_abs());
        let shift = divisor.bits() + 63;
        let numerator = BigUint::from(1u32) << shift;
        let quotient = &numerator / &divisor;
        let remainder = &numerator % &divisor;
        let round = (remainder << 1u32) >= divisor;
        round_half_up(low_u64(&quotient), -(shift as i32), round)
    };
    CachedPower {
        f,
        e,
        decimal_exponent: k,
    }
}

fn low_u64(value: &BigUint) -> u64 {
    value.iter_u64_digits().next().unwrap_or(0)
}

fn round_half_up(f: u64, e: i32, round: bool) -> (u64, i32) {
    if !round {
        return (f, e);
    }
    match f.checked_add(1) {
        Some(f) => (f, e),
        None => (1 << 63, e + 1),
    }
}

/// Cached power whose product with a significand of binary exponent `e`
/// lands in `[MIN_TARGET_EXPONENT, MAX_TARGET_EXPONENT]`.
fn cached_power_for(e: i32) -> Option<CachedPower> {
    let min_exponent = MIN_TARGET_EXPONENT - (e + 64);
    let max_exponent = MAX_TARGET_EXPONENT - (e + 64);
    let k = (f64::from(min_exponent + 63) * D_1_LOG2_10).ceil() as i32;
    let index = (CACHED_POWERS_OFFSET + k - 1) / CACHED_POWERS_STEP + 1;
    let power = *cached_powers().get(usize::try_from(index).ok()?)?;
    (min_exponent <= power.e && power.e <= max_exponent).then_some(power)
}

/// Significand and exponent of a positive finite double, plus its
/// normalized lower and upper rounding boundaries.
fn boundaries(value: f64) -> (DiyFp, DiyFp, DiyFp) {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7FF) as i32;
    let significand = bits & SIGNIFICAND_MASK;
    let v = if biased == 0 {
        DiyFp::new(significand, DENORMAL_EXPONENT)
    } else {
        DiyFp::new(significand + HIDDEN_BIT, biased - EXPONENT_BIAS)
    };

    let plus = DiyFp::new((v.f << 1) + 1, v.e - 1).normalize();
    let lower_is_closer = significand == 0 && biased > 1;
    let mut minus = if lower_is_closer {
        DiyFp::new((v.f << 2) - 1, v.e - 2)
    } else {
        DiyFp::new((v.f << 1) - 1, v.e - 1)
    };
    minus.f <<= minus.e - plus.e;
    minus.e = plus.e;
    (v.normalize(), minus, plus)
}

/// Shortest digits for a positive finite `value`. Returns the digit count and
/// the decimal point position `n`, meaning `value = 0.d1d2...dk * 10^n`.
pub fn shortest(value: f64, buffer: &mut [u8; MAX_DIGITS]) -> Option<(usize, i32)> {
    if !(value.is_finite() && value > 0.0) {
        return None;
    }
    let (w, minus, plus) = boundaries(value);
    let power = cached_power_for(w.e)?;
    let ten_mk = DiyFp::new(power.f, power.e);

    let scaled_w = w.times(ten_mk);
    let scaled_minus = minus.times(ten_mk);
    let scaled_plus = plus.times(ten_mk);

    let (len, kappa) = digit_gen(scaled_minus, scaled_w, scaled_plus, buffer)?;
    Some((len, len as i32 + kappa - power.decimal_exponent))
}

/// Largest power of ten not above `number`, with its digit count.
fn biggest_power_ten(number: u32) -> (u32, i32) {
    let mut power = 1u32;
    let mut exponent_plus_one = 1;
    while let Some(next) = power.checked_mul(10) {
        if next > number {
            break;
        }
        power = next;
        exponent_plus_one += 1;
    }
    (power, exponent_plus_one)
}

fn digit_gen(
    low: DiyFp,
    w: DiyFp,
    high: DiyFp,
    buffer: &mut [u8; MAX_DIGITS],
) -> Option<(usize, i32)> {
    let mut unit: u64 = 1;
    let too_low = DiyFp::new(low.f.checked_sub(unit)?, low.e);
    let too_high = DiyFp::new(high.f.checked_add(unit)?, high.e);
    let mut unsafe_interval = too_high.f.checked_sub(too_low.f)?;
    let one_shift = u32::try_from(-w.e).ok()?;
    let one = 1u64 << one_shift;

    let mut integrals = (too_high.f >> one_shift) as u32;
    let mut fractionals = too_high.f & (one - 1);
    let (mut divisor, mut kappa) = biggest_power_ten(integrals);
    let distance_too_high_w = too_high.f.checked_sub(w.f)?;
    let mut len = 0;

    while kappa > 0 {
        let digit = integrals / divisor;
        *buffer.get_mut(len)? = b'0' + digit as u8;
        len += 1;
        integrals %= divisor;
        kappa -= 1;
        let rest = (u64::from(integrals) << one_shift) + fractionals;
        if rest < unsafe_interval {
            let ten_kappa = u64::from(divisor) << one_shift;
            return round_weed(
                &mut buffer[..len],
                distance_too_high_w,
                unsafe_interval,
                rest,
                ten_kappa,
                unit,
            )
            .then_some((len, kappa));
        }
        divisor /= 10;
    }

    loop {
        fractionals = fractionals.checked_mul(10)?;
        unit = unit.checked_mul(10)?;
        unsafe_interval = unsafe_interval.checked_mul(10)?;
        let digit = (fractionals >> one_shift) as u8;
        *buffer.get_mut(len)? = b'0' + digit;
        len += 1;
        fractionals &= one - 1;
        kappa -= 1;
        if fractionals < unsafe_interval {
            return round_weed(
                &mut buffer[..len],
                distance_too_high_w.checked_mul(unit)?,
                unsafe_interval,
                fractionals,
                one,
                unit,
            )
            .then_some((len, kappa));
        }
    }
}

/// Nudges the last digit towards `w` and reports whether the result is
/// provably the closest shortest representation.
fn round_weed(
    digits: &mut [u8],
    distance_too_high_w: u64,
    unsafe_interval: u64,
    mut rest: u64,
    ten_kappa: u64,
    unit: u64,
) -> bool {
    let Some(small_distance) = distance_too_high_w.checked_sub(unit) else {
        return false;
    };
    let Some(big_distance) = distance_too_high_w.checked_add(unit) else {
        return false;
    };
    let Some(last) = digits.last_mut() else {
        return false;
    };

    while rest < small_distance
        && unsafe_interval - rest >= ten_kappa
        && (rest + ten_kappa < small_distance
            || small_distance - rest >= rest + ten_kappa - small_distance)
    {
        if *last == b'0' {
            return false;
        }
        *last -= 1;
        rest += ten_kappa;
    }

    if rest < big_distance
        && unsafe_interval - rest >= ten_kappa
        && (rest + ten_kappa < big_distance
            || big_distance - rest > rest + ten_kappa - big_distance)
    {
        return false;
    }

    let Some(upper) = unit.checked_mul(4).and_then(|four| unsafe_interval.checked_sub(four))
    else {
        return false;
    };
    unit.checked_mul(2).is_some_and(|two| two <= rest) && rest <= upper
}
