use crate::error::ParseError;
use serde_json::Value;

/// Parses a boolean from a JSON bool, number (`0`/`1`) or string.
///
/// Strings are matched case-insensitively against `true/false`, `t/f`, `yes/no`, `y/n`,
/// `on/off` and `1/0`.
pub fn parse_bool(value: &Value) -> Result<bool, ParseError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(ParseError::invalid(format!("cannot interpret {n} as a boolean"))),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
            other => Err(ParseError::invalid(format!("cannot interpret {other:?} as a boolean"))),
        },
        other => Err(ParseError::invalid(format!("cannot interpret {other} as a boolean"))),
    }
}

/// Parses a signed integer from a JSON number or numeric string.
pub fn parse_int(value: &Value) -> Result<i64, ParseError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ParseError::invalid(format!("{n} is not an integer"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| ParseError::invalid(format!("cannot parse {s:?} as an integer: {e}"))),
        other => Err(ParseError::invalid(format!("cannot interpret {other} as an integer"))),
    }
}

/// Parses a byte capacity such as `1024`, `"512kb"`, `"32MiB"` or `"1.5 GB"`.
///
/// Decimal (`kb`, `mb`, …) and binary (`kib`, `mib`, …) suffixes are both recognised.
pub fn parse_capacity_string(value: &Value) -> Result<u64, ParseError> {
    let raw = match value {
        Value::Number(n) => {
            return n
                .as_u64()
                .ok_or_else(|| ParseError::invalid(format!("capacity must be a positive integer, got {n}")));
        },
        Value::String(s) => s.trim().to_ascii_lowercase(),
        other => return Err(ParseError::invalid(format!("cannot interpret {other} as a capacity"))),
    };

    let split = raw.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "kb" | "k" => 1_000,
        "kib" => 1 << 10,
        "mb" | "m" => 1_000_000,
        "mib" => 1 << 20,
        "gb" | "g" => 1_000_000_000,
        "gib" => 1 << 30,
        "tb" | "t" => 1_000_000_000_000,
        "tib" => 1 << 40,
        other => return Err(ParseError::invalid(format!("unknown capacity unit {other:?}"))),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| ParseError::invalid(format!("capacity {raw:?} overflows")));
    }
    let fractional: f64 = number
        .parse()
        .map_err(|_| ParseError::invalid(format!("cannot parse capacity {raw:?}")))?;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bytes = (fractional * multiplier as f64).round() as u64;
    Ok(bytes)
}

/// Parses either a list of strings or a single comma-separated string.
///
/// Entries are trimmed and empty entries are dropped.
pub fn parse_comma_strings(value: &Value) -> Result<Vec<String>, ParseError> {
    let collect = |parts: &mut dyn Iterator<Item = String>| {
        parts.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()).collect::<Vec<_>>()
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(collect(&mut s.split(',').map(str::to_owned))),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    Value::Number(_) | Value::Bool(_) => out.push(item.to_string()),
                    other => {
                        return Err(ParseError::invalid(format!(
                            "list entries must be strings, got {other}"
                        )));
                    },
                }
            }
            Ok(collect(&mut out.into_iter()))
        },
        other => Err(ParseError::invalid(format!("cannot interpret {other} as a string list"))),
    }
}

/// Renders a dynamic value as a flat string.
///
/// Strings are returned verbatim, scalars are formatted and anything structured is
/// JSON-encoded. `null` becomes the empty string.
#[must_use]
pub fn to_plain_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        structured => structured.to_string(),
    }
}
