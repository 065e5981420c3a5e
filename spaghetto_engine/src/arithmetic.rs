/// Spaghetto Engine — Arithmetic Primitives
///
/// Money is i64 cents. Fractional values (unit costs, interest rates)
/// are i64 fixed-point (SCALE = 10_000). No float. No f64. No f32.

use crate::error::{EngineError, Result};

/// Fixed-point scale factor. All fractional values are stored as `real * SCALE`.
pub const SCALE: i64 = 10_000;

/// Weeks per game month.
pub const WEEKS_PER_MONTH: i64 = 4;

/// Weeks per game year (12 months of 4 weeks).
pub const WEEKS_PER_YEAR: i64 = 48;

/// Checked integer addition.
pub fn checked_add(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| EngineError::Overflow(format!("{} + {} overflows i64", a, b)))
}

/// Checked integer subtraction.
pub fn checked_sub(a: i64, b: i64) -> Result<i64> {
    a.checked_sub(b)
        .ok_or_else(|| EngineError::Overflow(format!("{} - {} overflows i64", a, b)))
}

/// Checked integer multiplication.
pub fn checked_mul(a: i64, b: i64) -> Result<i64> {
    a.checked_mul(b)
        .ok_or_else(|| EngineError::Overflow(format!("{} * {} overflows i64", a, b)))
}

/// Integer division rounding half away from zero.
pub fn div_round(n: i64, d: i64) -> Result<i64> {
    round_i128(n as i128, d as i128)
}

/// `a * b / d` with an i128 intermediate, rounding half away from zero.
pub fn mul_div_round(a: i64, b: i64, d: i64) -> Result<i64> {
    round_i128(a as i128 * b as i128, d as i128)
}

/// Ceiling division for non-negative operands.
pub fn div_ceil(n: i64, d: i64) -> Result<i64> {
    if d <= 0 || n < 0 {
        return Err(EngineError::validation(format!(
            "div_ceil expects n >= 0 and d > 0, got {} / {}",
            n, d
        )));
    }
    Ok(n / d + i64::from(n % d != 0))
}

fn round_i128(n: i128, d: i128) -> Result<i64> {
    if d == 0 {
        return Err(EngineError::Overflow(format!("{} / 0", n)));
    }
    let q = n / d;
    let r = n % d;
    let q = if 2 * r.abs() >= d.abs() {
        if (n < 0) == (d < 0) {
            q + 1
        } else {
            q - 1
        }
    } else {
        q
    };
    i64::try_from(q).map_err(|_| EngineError::Overflow(format!("{} does not fit in i64", q)))
}

/// Format cents as dollars: `-$1,234.05`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, group_thousands(abs / 100), abs % 100)
}

fn group_thousands(mut n: u64) -> String {
    let mut groups = Vec::new();
    loop {
        if n < 1000 {
            groups.push(n.to_string());
            break;
        }
        groups.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    groups.reverse();
    groups.join(",")
}

/// Parse a dollar amount typed by the user into cents.
///
/// Accepts an optional sign and `$`, thousands separators and at most
/// two decimal places: `"12"`, `"12.5"`, `"$1,200.75"`, `"-3.10"`.
pub fn parse_dollars(input: &str) -> Result<i64> {
    let s = input.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let s = s.strip_prefix('$').unwrap_or(s);
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) if !negative => (true, rest),
        _ => (negative, s),
    };
    let s: String = s.chars().filter(|c| *c != ',').collect();

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(EngineError::parse(format!("could not parse amount {:?}", input)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::parse(format!("could not parse amount {:?}", input)));
    }
    if frac.len() > 2 {
        return Err(EngineError::parse(format!(
            "amount {:?} has more than two decimal places",
            input
        )));
    }

    let dollars: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| EngineError::parse(format!("amount {:?} is too large", input)))?
    };
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac.parse::<i64>().unwrap_or(0),
    };

    let total = checked_add(checked_mul(dollars, 100)?, cents)?;
    Ok(if negative { -total } else { total })
}

/// Append an `s` to `word` unless `n == 1`.
pub fn plural(word: &str, n: i64) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Format an absolute week number as `Y1 M1 W1`.
pub fn format_week(week: i64) -> String {
    format!(
        "Y{} M{} W{}",
        week / WEEKS_PER_YEAR + 1,
        week / WEEKS_PER_MONTH % 12 + 1,
        week % WEEKS_PER_MONTH + 1
    )
}

/// Format a fixed-point rate as a percentage: `525` → `5.25%`.
pub fn format_rate(rate: i64) -> String {
    let sign = if rate < 0 { "-" } else { "" };
    let abs = rate.unsigned_abs();
    format!("{}{}.{:02}%", sign, abs / 100, abs % 100)
}

/// Validate a display name (item, dish, loan): non-empty after trimming,
/// no control characters.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EngineError::validation(format!("{} name must not be empty", kind)));
    }
    if name.trim() != name {
        return Err(EngineError::validation(format!(
            "{} name {:?} has surrounding whitespace",
            kind, name
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(EngineError::validation(format!(
            "{} name {:?} contains control characters",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add_ok() {
        assert_eq!(checked_add(3, 4).unwrap(), 7);
        assert_eq!(checked_add(-10, 5).unwrap(), -5);
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(matches!(checked_add(i64::MAX, 1), Err(EngineError::Overflow(_))));
    }

    #[test]
    fn test_checked_mul_overflow() {
        assert_eq!(checked_mul(3, 4).unwrap(), 12);
        assert!(checked_mul(i64::MAX, 2).is_err());
    }

    #[test]
    fn test_div_round_half_away_from_zero() {
        assert_eq!(div_round(5, 2).unwrap(), 3);
        assert_eq!(div_round(-5, 2).unwrap(), -3);
        assert_eq!(div_round(4, 3).unwrap(), 1);
        assert_eq!(div_round(7, 7).unwrap(), 1);
        assert!(div_round(1, 0).is_err());
    }

    #[test]
    fn test_mul_div_round_uses_wide_intermediate() {
        assert_eq!(mul_div_round(i64::MAX / 2, 4, 4).unwrap(), i64::MAX / 2);
        assert_eq!(mul_div_round(3, 25_000, SCALE).unwrap(), 8);
    }

    #[test]
    fn test_div_ceil() {
        assert_eq!(div_ceil(10, 3).unwrap(), 4);
        assert_eq!(div_ceil(9, 3).unwrap(), 3);
        assert_eq!(div_ceil(0, 3).unwrap(), 0);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-123_405), "-$1,234.05");
        assert_eq!(format_cents(100_000_000), "$1,000,000.00");
    }

    #[test]
    fn test_parse_dollars() {
        assert_eq!(parse_dollars("12").unwrap(), 1200);
        assert_eq!(parse_dollars("12.5").unwrap(), 1250);
        assert_eq!(parse_dollars(" $1,200.75 ").unwrap(), 120_075);
        assert_eq!(parse_dollars("-3.10").unwrap(), -310);
        assert_eq!(parse_dollars("$-3.10").unwrap(), -310);
        assert_eq!(parse_dollars(".99").unwrap(), 99);
    }

    #[test]
    fn test_parse_dollars_rejects_garbage() {
        assert!(parse_dollars("").is_err());
        assert!(parse_dollars("abc").is_err());
        assert!(parse_dollars("1.234").is_err());
        assert!(parse_dollars("1.2.3").is_err());
        assert!(parse_dollars("$").is_err());
    }

    #[test]
    fn test_format_week() {
        assert_eq!(format_week(0), "Y1 M1 W1");
        assert_eq!(format_week(5), "Y1 M2 W2");
        assert_eq!(format_week(48), "Y2 M1 W1");
        assert_eq!(format_week(47), "Y1 M12 W4");
    }

    #[test]
    fn test_format_rate_and_plural() {
        assert_eq!(format_rate(525), "5.25%");
        assert_eq!(format_rate(10_000), "100.00%");
        assert_eq!(plural("cup", 1), "cup");
        assert_eq!(plural("cup", 0), "cups");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("dish", "Carbonara").is_ok());
        assert!(validate_name("dish", "").is_err());
        assert!(validate_name("dish", " Carbonara").is_err());
        assert!(validate_name("dish", "Car\nbonara").is_err());
    }
}
