//! Lenient scalar coercion for model-authored values.

use serde_json::{Map, Value};

/// Result of reading a loosely typed numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Missing,
    Value(f64),
    Percent(f64),
    /// Present but not numeric. Carried as NaN so the validator can default it.
    Invalid,
}

impl Numeric {
    /// The value, `default` when absent or relative, NaN when garbage.
    pub(crate) fn or(self, default: f64) -> f64 {
        match self {
            Numeric::Missing | Numeric::Percent(_) => default,
            Numeric::Value(v) => v,
            Numeric::Invalid => f64::NAN,
        }
    }
}

pub(crate) fn numeric(value: Option<&Value>) -> Numeric {
    match value {
        None | Some(Value::Null) => Numeric::Missing,
        Some(Value::Number(n)) => n.as_f64().map_or(Numeric::Invalid, Numeric::Value),
        Some(Value::String(s)) => match split_number(s) {
            None if s.trim().is_empty() => Numeric::Missing,
            None => Numeric::Invalid,
            Some((v, suffix)) if suffix == "%" => Numeric::Percent(v),
            Some((v, _)) => Numeric::Value(v),
        },
        Some(_) => Numeric::Invalid,
    }
}

/// Reads a duration in milliseconds; `"2s"` is scaled, `"500ms"` is not.
pub(crate) fn millis(value: Option<&Value>) -> Numeric {
    if let Some(Value::String(s)) = value {
        if let Some((v, suffix)) = split_number(s) {
            if suffix.eq_ignore_ascii_case("s") || suffix.eq_ignore_ascii_case("sec") {
                return Numeric::Value(v * 1000.0);
            }
        }
    }
    numeric(value)
}

/// Splits `"  12.5px "` into `(12.5, "px")`.
fn split_number(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    // Exponent only when digits follow, so "5em" stays 5 with an "em" suffix.
    if i + 1 < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let v = s[..i].parse::<f64>().ok()?;
    Some((v, s[i..].trim()))
}

/// First present, non-null value among `keys`.
pub(crate) fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Renders scalars as strings; blank strings count as absent.
pub(crate) fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(as_string)
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A finite number for optional payload fields; anything else is dropped.
pub(crate) fn finite(value: Option<&Value>) -> Option<f64> {
    match numeric(value) {
        Numeric::Value(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(numeric(Some(&json!("100px"))), Numeric::Value(100.0));
        assert_eq!(numeric(Some(&json!(" -12.5 deg"))), Numeric::Value(-12.5));
        assert_eq!(numeric(Some(&json!("1e3"))), Numeric::Value(1000.0));
        assert_eq!(numeric(Some(&json!("5em"))), Numeric::Value(5.0));
        assert_eq!(numeric(Some(&json!("50%"))), Numeric::Percent(50.0));
        assert_eq!(numeric(Some(&json!("wide"))), Numeric::Invalid);
        assert_eq!(numeric(Some(&json!(true))), Numeric::Invalid);
        assert_eq!(numeric(Some(&json!(""))), Numeric::Missing);
        assert_eq!(numeric(None), Numeric::Missing);
    }

    #[test]
    fn test_millis() {
        assert_eq!(millis(Some(&json!("500ms"))), Numeric::Value(500.0));
        assert_eq!(millis(Some(&json!("1.5s"))), Numeric::Value(1500.0));
        assert_eq!(millis(Some(&json!(250))), Numeric::Value(250.0));
    }

    #[test]
    fn test_or_default() {
        assert_eq!(Numeric::Missing.or(3.0), 3.0);
        assert_eq!(Numeric::Percent(50.0).or(3.0), 3.0);
        assert!(Numeric::Invalid.or(3.0).is_nan());
    }

    #[test]
    fn test_scalars() {
        let obj = json!({"a": null, "b": "", "c": 7});
        let obj = obj.as_object().unwrap();
        assert_eq!(first(obj, &["a", "c"]), Some(&json!(7)));
        assert_eq!(first_string(obj, &["b", "c"]), Some("7".to_string()));
        assert_eq!(as_bool(&json!("yes")), Some(true));
        assert_eq!(as_bool(&json!("maybe")), None);
    }
}
