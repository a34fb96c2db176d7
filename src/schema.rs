//! Declarative table schemas and the JSON → row mapper.
//!
//! Each virtual table declares its columns once. A column knows its semantic
//! type and which JSON keys the provider may use for it; the first key that is
//! present on the object wins. Keys may be dotted paths (`token_a.address`).

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{HandlerError, Result};
use crate::value::{ColumnType, Value};

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(skip)]
    sources: &'static [&'static str],
}

impl ColumnDef {
    /// Column read from the JSON key of the same name
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            sources: &[],
        }
    }

    /// Column read from the first present key among `sources`
    pub const fn from_keys(
        name: &'static str,
        ty: ColumnType,
        sources: &'static [&'static str],
    ) -> Self {
        Self { name, ty, sources }
    }

    fn lookup<'a>(&self, object: &'a JsonValue) -> Option<&'a JsonValue> {
        if self.sources.is_empty() {
            return object.get(self.name);
        }
        self.sources.iter().find_map(|key| get_path(object, key))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self { name, columns }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn column(&self, column: &str) -> Option<&ColumnDef> {
        self.index_of(column).map(|i| &self.columns[i])
    }

    /// Map one provider JSON object onto this schema.
    ///
    /// Missing keys and JSON nulls become [`Value::Null`]; values that cannot
    /// be converted to the column type are a malformed-response error.
    pub fn map_row(&self, object: &JsonValue) -> Result<Row> {
        if !object.is_object() {
            return Err(HandlerError::malformed(format!(
                "{}: expected a JSON object per row, got {}",
                self.name,
                json_kind(object)
            )));
        }

        self.columns
            .iter()
            .map(|column| match column.lookup(object) {
                None => Ok(Value::Null),
                Some(raw) => Value::from_json(raw, column.ty).ok_or_else(|| {
                    HandlerError::malformed(format!(
                        "{}.{}: cannot read {} as {}",
                        self.name, column.name, raw, column.ty
                    ))
                }),
            })
            .collect()
    }

    /// Map a row and then overwrite the listed columns with fixed values taken
    /// from the request rather than the row payload.
    pub fn map_row_with(&self, object: &JsonValue, fixed: &[(&str, Value)]) -> Result<Row> {
        let mut row = self.map_row(object)?;
        for (column, value) in fixed {
            if let Some(idx) = self.index_of(column) {
                row[idx] = value.clone();
            }
        }
        Ok(row)
    }
}

fn get_path<'a>(object: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .try_fold(object, |current, key| current.get(key))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Locate the row array inside a provider payload.
///
/// Dune preset endpoints wrap rows as `result.rows`; other endpoints use a
/// named top-level array or return a bare array.
pub fn extract_rows<'a>(payload: &'a JsonValue, keys: &[&str]) -> Result<&'a [JsonValue]> {
    if let Some(rows) = payload.as_array() {
        return Ok(rows);
    }

    let fallbacks: [&str; 2] = ["result.rows", "rows"];
    for key in keys.iter().copied().chain(fallbacks) {
        if let Some(rows) = get_path(payload, key).and_then(JsonValue::as_array) {
            return Ok(rows);
        }
    }

    Err(HandlerError::malformed(format!(
        "no row array found in response (looked for {:?})",
        keys
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> TableSchema {
        TableSchema::new(
            "things",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::from_keys("address", ColumnType::String, &["contract_address", "address"]),
                ColumnDef::from_keys("token", ColumnType::String, &["token.symbol"]),
                ColumnDef::new("active", ColumnType::Boolean),
            ],
        )
    }

    #[test]
    fn test_map_row_with_fallback_keys_and_nulls() {
        let row = schema()
            .map_row(&json!({
                "id": 7,
                "address": "0xabc",
                "token": {"symbol": "WETH"}
            }))
            .unwrap();

        assert_eq!(
            row,
            vec![
                Value::Integer(7),
                Value::Text("0xabc".into()),
                Value::Text("WETH".into()),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_first_source_key_wins() {
        let row = schema()
            .map_row(&json!({"contract_address": "0x1", "address": "0x2"}))
            .unwrap();
        assert_eq!(row[1], Value::Text("0x1".into()));
    }

    #[test]
    fn test_type_mismatch_is_malformed() {
        let err = schema().map_row(&json!({"id": "seven"})).unwrap_err();
        assert!(matches!(err, HandlerError::MalformedResponse(ref m) if m.contains("things.id")));
    }

    #[test]
    fn test_non_object_row_is_malformed() {
        assert!(schema().map_row(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_map_row_with_fixed_values() {
        let row = schema()
            .map_row_with(&json!({"id": 1}), &[("active", Value::Boolean(true))])
            .unwrap();
        assert_eq!(row[3], Value::Boolean(true));
    }

    #[test]
    fn test_extract_rows_shapes() {
        let wrapped = json!({"result": {"rows": [{"a": 1}]}});
        assert_eq!(extract_rows(&wrapped, &[]).unwrap().len(), 1);

        let named = json!({"balances": [{"a": 1}, {"a": 2}]});
        assert_eq!(extract_rows(&named, &["balances"]).unwrap().len(), 2);

        let bare = json!([{"a": 1}]);
        assert_eq!(extract_rows(&bare, &["balances"]).unwrap().len(), 1);

        assert!(extract_rows(&json!({"other": 1}), &["balances"]).is_err());
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        assert_eq!(schema().index_of("ADDRESS"), Some(1));
        assert!(schema().column("missing").is_none());
    }
}
