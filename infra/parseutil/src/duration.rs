use crate::error::ParseError;
use serde_json::Value;
use std::time::Duration;

const NANOS_PER_UNIT: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

/// Parses a duration that is either a number of seconds or a unit-suffixed string.
///
/// Accepted forms: integers and floats (seconds), numeric strings (seconds), and
/// strings such as `"90s"`, `"1h30m"` or `"250ms"`. `null` and the empty string are zero.
///
/// # Errors
/// Returns [`ParseError::InvalidValue`] for negative values, unknown units or any other
/// JSON type.
pub fn parse_duration_second(value: &Value) -> Result<Duration, ParseError> {
    match value {
        Value::Null => Ok(Duration::ZERO),
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                return Ok(Duration::from_secs(secs));
            }
            match n.as_f64() {
                Some(secs) if secs >= 0.0 && secs.is_finite() => Ok(Duration::from_secs_f64(secs)),
                _ => Err(ParseError::invalid(format!("duration must be non-negative, got {n}"))),
            }
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Duration::ZERO);
            }
            if let Ok(secs) = s.parse::<u64>() {
                return Ok(Duration::from_secs(secs));
            }
            parse_duration(s)
        },
        other => Err(ParseError::invalid(format!("cannot interpret {other} as a duration"))),
    }
}

/// Parses a unit-suffixed duration string such as `"2h45m"` or `"1.5s"`.
///
/// A bare `"0"` is accepted; every other component needs a unit.
///
/// # Errors
/// Returns [`ParseError::InvalidValue`] if the string is empty, negative, overflows or
/// contains an unknown unit.
pub fn parse_duration(input: &str) -> Result<Duration, ParseError> {
    let original = input;
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(ParseError::invalid(format!("negative duration {original:?}")));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(ParseError::invalid(format!("invalid duration {original:?}")));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, tail) = rest.split_at(int_end);

        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => {
                let frac_end =
                    after_dot.find(|c: char| !c.is_ascii_digit()).unwrap_or(after_dot.len());
                after_dot.split_at(frac_end)
            },
            None => ("", tail),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseError::invalid(format!("invalid duration {original:?}")));
        }

        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        let scale = NANOS_PER_UNIT
            .iter()
            .find_map(|(name, nanos)| (*name == unit).then_some(*nanos))
            .ok_or_else(|| {
                if unit.is_empty() {
                    ParseError::invalid(format!("missing unit in duration {original:?}"))
                } else {
                    ParseError::invalid(format!("unknown unit {unit:?} in duration {original:?}"))
                }
            })?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow(original))?
        };
        let mut component = whole.checked_mul(scale).ok_or_else(|| overflow(original))?;

        if !frac_part.is_empty() {
            // Keep at most 18 fractional digits; beyond that the contribution is below 1ns/h.
            let digits = &frac_part[..frac_part.len().min(18)];
            let numerator: u128 = digits.parse().map_err(|_| overflow(original))?;
            let denominator = 10u128.pow(u32::try_from(digits.len()).unwrap_or(18));
            let fraction = numerator.checked_mul(scale).ok_or_else(|| overflow(original))? / denominator;
            component = component.checked_add(fraction).ok_or_else(|| overflow(original))?;
        }

        total = total.checked_add(component).ok_or_else(|| overflow(original))?;
        rest = tail;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| overflow(original))?;
    let nanos = u32::try_from(total % 1_000_000_000).map_err(|_| overflow(original))?;
    Ok(Duration::new(secs, nanos))
}

fn overflow(original: &str) -> ParseError {
    ParseError::invalid(format!("duration {original:?} overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_go_style_strings() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1h15m30s").unwrap(), Duration::from_secs(4530));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2us").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration("+5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_malformed_strings() {
        for bad in ["", "10", "-5s", "5x", "s", ".s", "1h-1m", "3d"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_fraction_overflow_is_an_error() {
        // The whole part alone fits, the fractional hour pushes the sum past u128.
        let whole_hours = u128::MAX / 3_600_000_000_000;
        let input = format!("{whole_hours}.999999999999999999h");
        assert!(parse_duration(&input).is_err());
        assert!(parse_duration("340282366920938463463374607431768211455ns").is_err());
    }

    #[test]
    fn test_seconds_from_json() {
        assert_eq!(parse_duration_second(&json!(42)).unwrap(), Duration::from_secs(42));
        assert_eq!(parse_duration_second(&json!("42")).unwrap(), Duration::from_secs(42));
        assert_eq!(parse_duration_second(&json!("42s")).unwrap(), Duration::from_secs(42));
        assert_eq!(parse_duration_second(&json!(0.25)).unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration_second(&json!("")).unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_second(&Value::Null).unwrap(), Duration::ZERO);
        assert!(parse_duration_second(&json!(-1)).is_err());
        assert!(parse_duration_second(&json!(true)).is_err());
        assert!(parse_duration_second(&json!(["1s"])).is_err());
    }
}
