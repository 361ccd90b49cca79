//! Type coercion for flat, string-encoded values.
//!
//! URL query serialization turns every value into a string (`"2"`, `"false"`,
//! `"a,b"`). [`converty`] reads such a value back as the declared type. It is
//! deliberately narrow and is not a general deserializer.

use crate::value::{FieldValue, ValueType};

/// Convert a loosely typed value into `target`.
///
/// * `Boolean`: `"false"` is `false`, anything else follows truthiness.
/// * `Array`: strings split on `,`, lists pass through, anything else is `[]`.
/// * `Number`: numeric conversion; unparsable input becomes `NaN`.
/// * `String`: loose string conversion.
/// * `Object` and entity types: returned unchanged.
pub fn converty(value: &FieldValue, target: &ValueType) -> FieldValue {
    match target {
        ValueType::Boolean => match value {
            FieldValue::String(s) if s == "false" => FieldValue::Bool(false),
            other => FieldValue::Bool(other.is_truthy()),
        },
        ValueType::Array => match value {
            FieldValue::String(s) => FieldValue::List(
                s.split(',')
                    .map(|part| FieldValue::String(part.to_string()))
                    .collect(),
            ),
            FieldValue::List(_) => value.clone(),
            _ => FieldValue::List(Vec::new()),
        },
        ValueType::Number => to_number(value),
        ValueType::String => FieldValue::String(value.to_string()),
        ValueType::Object | ValueType::Entity(_) => value.clone(),
    }
}

fn to_number(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Int(_) | FieldValue::Float(_) => value.clone(),
        FieldValue::Bool(b) => FieldValue::Int(i64::from(*b)),
        FieldValue::Null => FieldValue::Int(0),
        FieldValue::String(s) => parse_number(s),
        FieldValue::List(items) => match items.as_slice() {
            [] => FieldValue::Int(0),
            [single] => to_number(&FieldValue::String(single.to_string())),
            _ => FieldValue::Float(f64::NAN),
        },
        FieldValue::Record(_) | FieldValue::Entity(_) => FieldValue::Float(f64::NAN),
    }
}

fn parse_number(text: &str) -> FieldValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return FieldValue::Int(0);
    }
    match trimmed {
        "Infinity" | "+Infinity" => return FieldValue::Float(f64::INFINITY),
        "-Infinity" => return FieldValue::Float(f64::NEG_INFINITY),
        _ => {}
    }
    if let Some(value) = parse_radix(trimmed) {
        return value;
    }
    // f64::from_str also accepts "inf" and "nan", which are not numbers here
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return FieldValue::Float(f64::NAN);
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return FieldValue::Int(int);
    }
    match trimmed.parse::<f64>() {
        Ok(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
            FieldValue::Int(float as i64)
        }
        Ok(float) => FieldValue::Float(float),
        Err(_) => FieldValue::Float(f64::NAN),
    }
}

/// Unsigned `0x`, `0o` and `0b` literals. Signs are not allowed after a prefix.
fn parse_radix(text: &str) -> Option<FieldValue> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Some(FieldValue::Float(f64::NAN));
    }
    if let Ok(int) = i64::from_str_radix(digits, radix) {
        return Some(FieldValue::Int(int));
    }
    let float = digits.chars().fold(0.0, |acc, c| {
        acc * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0))
    });
    Some(FieldValue::Float(float))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s(text: &str) -> FieldValue {
        FieldValue::from(text)
    }

    #[test]
    fn test_converty_boolean() {
        assert_eq!(converty(&s("false"), &ValueType::Boolean), FieldValue::Bool(false));
        assert_eq!(converty(&s("true"), &ValueType::Boolean), FieldValue::Bool(true));
        assert_eq!(converty(&s(""), &ValueType::Boolean), FieldValue::Bool(false));
        assert_eq!(converty(&s("0"), &ValueType::Boolean), FieldValue::Bool(true));
        assert_eq!(converty(&FieldValue::Int(0), &ValueType::Boolean), FieldValue::Bool(false));
    }

    #[test]
    fn test_converty_array() {
        assert_eq!(
            converty(&s("a,b,c"), &ValueType::Array),
            FieldValue::from(json!(["a", "b", "c"]))
        );
        let list = FieldValue::from(json!([1, 2]));
        assert_eq!(converty(&list, &ValueType::Array), list);
        assert_eq!(converty(&FieldValue::Int(3), &ValueType::Array), FieldValue::List(vec![]));
        assert_eq!(converty(&s(""), &ValueType::Array), FieldValue::from(json!([""])));
    }

    #[test]
    fn test_converty_number() {
        assert_eq!(converty(&s("42"), &ValueType::Number), FieldValue::Int(42));
        assert_eq!(converty(&s(" 1.5 "), &ValueType::Number), FieldValue::Float(1.5));
        assert_eq!(converty(&s("1e3"), &ValueType::Number), FieldValue::Int(1000));
        assert_eq!(converty(&s(""), &ValueType::Number), FieldValue::Int(0));
        assert_eq!(converty(&FieldValue::Bool(true), &ValueType::Number), FieldValue::Int(1));

        let nan = converty(&s("abc"), &ValueType::Number);
        assert!(nan.as_f64().unwrap().is_nan());
        let inf = converty(&s("inf"), &ValueType::Number);
        assert!(inf.as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_converty_number_radix_prefixes() {
        assert_eq!(converty(&s("0x10"), &ValueType::Number), FieldValue::Int(16));
        assert_eq!(converty(&s("0XfF"), &ValueType::Number), FieldValue::Int(255));
        assert_eq!(converty(&s("0b101"), &ValueType::Number), FieldValue::Int(5));
        assert_eq!(converty(&s(" 0o7 "), &ValueType::Number), FieldValue::Int(7));

        for bad in ["0x", "0xg", "-0x10", "0b2", "0x+1"] {
            let value = converty(&s(bad), &ValueType::Number);
            assert!(value.as_f64().unwrap().is_nan(), "{} should be NaN", bad);
        }
    }

    #[test]
    fn test_converty_string() {
        assert_eq!(converty(&FieldValue::Int(7), &ValueType::String), s("7"));
        assert_eq!(converty(&FieldValue::Float(2.0), &ValueType::String), s("2"));
        assert_eq!(converty(&FieldValue::from(json!(["a", "b"])), &ValueType::String), s("a,b"));
        assert_eq!(converty(&FieldValue::Null, &ValueType::String), s("null"));
    }
}
