// Loose value coercions matching what the pages do with untrusted JSON and
// form text (`Number(v)`, `String(v)`, `parseInt(v)`).

use serde_json::Value;

/// Numeric value of `value`, or 0 when it is not a finite number.
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => number_from_text(s).unwrap_or(0.0),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => coerce_number(single),
            _ => 0.0,
        },
        Value::Object(_) => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn number_from_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    let lower = trimmed.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    // Rust accepts spellings like "inf" and "nan" that Number() rejects; both
    // end up as 0 after the finiteness check anyway.
    trimmed.parse::<f64>().ok()
}

/// Textual form of a JSON value the way `String(v)` renders it.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f.fract() == 0.0 && f.abs() < 1e21 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Leading integer of `text` (`parseInt(text, 10)`), `None` when there is none.
pub fn parse_int(text: &str) -> Option<i64> {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_follow_js_coercion() {
        assert_eq!(coerce_number(&json!(3.5)), 3.5);
        assert_eq!(coerce_number(&json!("12.25")), 12.25);
        assert_eq!(coerce_number(&json!(" 7 ")), 7.0);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!(true)), 1.0);
        assert_eq!(coerce_number(&json!([4])), 4.0);
        assert_eq!(coerce_number(&json!([1, 2])), 0.0);
        assert_eq!(coerce_number(&json!({"a": 1})), 0.0);
        assert_eq!(coerce_number(&json!("Infinity")), 0.0);
        assert_eq!(coerce_number(&json!("0x10")), 16.0);
    }

    #[test]
    fn labels_stringify_like_js() {
        assert_eq!(js_string(&json!(1)), "1");
        assert_eq!(js_string(&json!(1.5)), "1.5");
        assert_eq!(js_string(&json!(2.0)), "2");
        assert_eq!(js_string(&json!("Comuna 3")), "Comuna 3");
        assert_eq!(js_string(&json!(null)), "null");
        assert_eq!(js_string(&json!([1, null, "x"])), "1,,x");
    }

    #[test]
    fn parse_int_takes_leading_digits() {
        assert_eq!(parse_int("40"), Some(40));
        assert_eq!(parse_int("  40abc"), Some(40));
        assert_eq!(parse_int("-5"), Some(-5));
        assert_eq!(parse_int("33.9"), Some(33));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("x1"), None);
        assert_eq!(parse_int("-"), None);
    }
}
