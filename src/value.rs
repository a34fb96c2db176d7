//! Typed cell values produced by the column mapper.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Timestamp,
    /// Nested object or array kept as JSON text
    Json,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        };
        f.write_str(name)
    }
}

/// One cell of a result row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    /// Wide enough for any u64/i64 identifier
    Integer(i128),
    Float(f64),
    Boolean(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert a JSON field into the given column type.
    ///
    /// Returns `None` when the JSON value cannot represent that type.
    pub fn from_json(json: &JsonValue, ty: ColumnType) -> Option<Value> {
        if json.is_null() {
            return Some(Value::Null);
        }

        match ty {
            ColumnType::Integer => json_to_integer(json).map(Value::Integer),
            ColumnType::Float => match json {
                JsonValue::Number(n) => n.as_f64().map(Value::Float),
                JsonValue::String(s) => s.trim().parse().ok().map(Value::Float),
                _ => None,
            },
            ColumnType::Boolean => match json {
                JsonValue::Bool(b) => Some(Value::Boolean(*b)),
                JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Some(Value::Boolean(true)),
                    "false" => Some(Value::Boolean(false)),
                    _ => None,
                },
                JsonValue::Number(n) => match n.as_u64() {
                    Some(0) => Some(Value::Boolean(false)),
                    Some(1) => Some(Value::Boolean(true)),
                    _ => None,
                },
                _ => None,
            },
            ColumnType::Timestamp => json_to_timestamp(json).map(Value::Timestamp),
            ColumnType::String => match json {
                JsonValue::String(s) => Some(Value::Text(s.clone())),
                JsonValue::Number(n) => Some(Value::Text(n.to_string())),
                JsonValue::Bool(b) => Some(Value::Text(b.to_string())),
                other => Some(Value::Text(other.to_string())),
            },
            ColumnType::Json => Some(Value::Text(json.to_string())),
        }
    }

    /// Parse a SQL literal (already unquoted) into the column type, used to
    /// compare filter literals against row values.
    pub fn from_literal(raw: &str, ty: ColumnType) -> Option<Value> {
        match ty {
            ColumnType::String | ColumnType::Json => Some(Value::Text(raw.to_string())),
            ColumnType::Integer => raw.trim().parse().ok().map(Value::Integer),
            ColumnType::Float => raw.trim().parse().ok().map(Value::Float),
            ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            ColumnType::Timestamp => parse_timestamp_str(raw).map(Value::Timestamp),
        }
    }

    /// Ordering between two non-null values of compatible types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            // Outside the i64 range JSON consumers would round, so emit a string
            Value::Integer(i) => match i64::try_from(*i) {
                Ok(small) => serializer.serialize_i64(small),
                Err(_) => serializer.serialize_str(&i.to_string()),
            },
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
        }
    }
}

fn json_to_integer(json: &JsonValue) -> Option<i128> {
    match json {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i as i128)
            } else if let Some(u) = n.as_u64() {
                Some(u as i128)
            } else {
                // Accept 12.0 but not 12.5
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i128)
            }
        }
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_timestamp(json: &JsonValue) -> Option<DateTime<Utc>> {
    match json {
        JsonValue::String(s) => parse_timestamp_str(s),
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Dune result rows use "2024-01-02 03:04:05.000 UTC"
    let trimmed = raw.strip_suffix(" UTC").unwrap_or(raw);
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_identifiers_keep_precision() {
        let max_u64 = json!(18446744073709551615u64);
        assert_eq!(
            Value::from_json(&max_u64, ColumnType::Integer),
            Some(Value::Integer(18446744073709551615))
        );

        let as_string = json!("170141183460469231731687303715884105727");
        assert_eq!(
            Value::from_json(&as_string, ColumnType::Integer),
            Some(Value::Integer(i128::MAX))
        );
    }

    #[test]
    fn test_integer_rejects_fractions() {
        assert_eq!(Value::from_json(&json!(12.0), ColumnType::Integer), Some(Value::Integer(12)));
        assert_eq!(Value::from_json(&json!(12.5), ColumnType::Integer), None);
        assert_eq!(Value::from_json(&json!("abc"), ColumnType::Integer), None);
    }

    #[test]
    fn test_null_maps_to_null_for_every_type() {
        for ty in [
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::String,
            ColumnType::Boolean,
            ColumnType::Timestamp,
            ColumnType::Json,
        ] {
            assert_eq!(Value::from_json(&JsonValue::Null, ty), Some(Value::Null));
        }
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        for raw in [
            json!("2024-01-02T03:04:05Z"),
            json!("2024-01-02T03:04:05.000+00:00"),
            json!("2024-01-02 03:04:05.000 UTC"),
            json!("2024-01-02 03:04:05"),
            json!(expected.timestamp()),
        ] {
            assert_eq!(
                Value::from_json(&raw, ColumnType::Timestamp),
                Some(Value::Timestamp(expected)),
                "failed for {}",
                raw
            );
        }
    }

    #[test]
    fn test_string_and_json_columns() {
        assert_eq!(
            Value::from_json(&json!(42), ColumnType::String),
            Some(Value::Text("42".to_string()))
        );
        assert_eq!(
            Value::from_json(&json!(["a", "b"]), ColumnType::Json),
            Some(Value::Text(r#"["a","b"]"#.to_string()))
        );
    }

    #[test]
    fn test_serialize_wide_integer_as_string() {
        let wide = Value::Integer(i128::from(u64::MAX));
        assert_eq!(serde_json::to_string(&wide).unwrap(), "\"18446744073709551615\"");
        assert_eq!(serde_json::to_string(&Value::Integer(7)).unwrap(), "7");
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(Value::Integer(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Text("a".into()).compare(&Value::Integer(1)), None);
    }
}
