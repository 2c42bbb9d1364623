// src/fixed.rs
//! E8 fixed-point conversions.
//!
//! All prices and sizes in the pipeline are 64-bit signed integers scaled by
//! 10^8. Parsing from decimal text is exact for up to 8 fractional digits;
//! anything beyond that is truncated toward zero. Conversion back to floating
//! point exists for display only.

/// Fixed-point scale: 1.0 == 10^8.
pub const SCALE: i64 = 100_000_000;

const FRAC_DIGITS: u32 = 8;

/// Parses a decimal string into an E8 integer.
///
/// Exact for up to 8 fractional digits; excess digits are truncated toward
/// zero (`"0.123456789"` -> `12_345_678`). Returns `None` on empty input,
/// stray characters, or overflow.
pub fn to_e8(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut value: i64 = 0;
    for b in int_part.bytes() {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value
            .checked_mul(10)?
            .checked_add(i64::from(b - b'0'))?;
    }
    value = value.checked_mul(SCALE)?;

    let mut frac: i64 = 0;
    let mut seen: u32 = 0;
    for b in frac_part.bytes() {
        if !b.is_ascii_digit() {
            return None;
        }
        if seen < FRAC_DIGITS {
            frac = frac * 10 + i64::from(b - b'0');
            seen += 1;
        }
        // Digits past the 8th are truncated toward zero.
    }
    frac *= 10_i64.pow(FRAC_DIGITS - seen.min(FRAC_DIGITS));

    let total = value.checked_add(frac)?;
    Some(if neg { -total } else { total })
}

/// E8 -> f64, for logging and display only.
#[inline]
pub fn to_f64(v: i64) -> f64 {
    v as f64 / SCALE as f64
}

/// f64 -> E8, for the decimal-domain simulator boundary only.
#[inline]
pub fn from_f64(v: f64) -> i64 {
    (v * SCALE as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_and_fractions() {
        assert_eq!(to_e8("2"), Some(200_000_000));
        assert_eq!(to_e8("0.455"), Some(45_500_000));
        assert_eq!(to_e8("2.08"), Some(208_000_000));
        assert_eq!(to_e8("0.00000001"), Some(1));
        assert_eq!(to_e8("12345.6789"), Some(1_234_567_890_000));
    }

    #[test]
    fn parses_signs() {
        assert_eq!(to_e8("-0.0001"), Some(-10_000));
        assert_eq!(to_e8("+1.5"), Some(150_000_000));
        assert_eq!(to_e8("-0"), Some(0));
    }

    #[test]
    fn truncates_excess_digits_toward_zero() {
        assert_eq!(to_e8("0.123456789"), Some(12_345_678));
        assert_eq!(to_e8("-0.999999999"), Some(-99_999_999));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(to_e8(""), None);
        assert_eq!(to_e8("."), None);
        assert_eq!(to_e8("-"), None);
        assert_eq!(to_e8("1.2.3"), None);
        assert_eq!(to_e8("12a"), None);
        assert_eq!(to_e8("1e8"), None);
    }

    #[test]
    fn rejects_overflow() {
        assert_eq!(to_e8("99999999999999999999"), None);
    }

    #[test]
    fn display_round_trip() {
        let v = to_e8("0.5002").unwrap();
        assert!((to_f64(v) - 0.5002).abs() < 1e-12);
    }
}
