//! What the handler hands back to its caller.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::schema::{ColumnDef, Row};

/// Outcome of `connect` / `check_connection`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub error_message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Rows of a select together with their column definitions
#[derive(Debug, Clone, Serialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Rows as JSON objects keyed by column name
    pub fn to_records(&self) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| {
                let record: Map<String, JsonValue> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| {
                        (
                            column.name.to_string(),
                            serde_json::to_value(value).unwrap_or(JsonValue::Null),
                        )
                    })
                    .collect();
                JsonValue::Object(record)
            })
            .collect()
    }

    /// Plain-text table, one line per row, columns padded to their widest cell
    pub fn render_table(&self) -> String {
        let header: Vec<String> = self.columns.iter().map(|c| c.name.to_string()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                cells
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let format_line = |values: &[String]| {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = Vec::with_capacity(cells.len() + 2);
        out.push(format_line(&header));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &cells {
            out.push(format_line(row));
        }
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ColumnType, Value};

    fn result_set() -> ResultSet {
        ResultSet {
            columns: vec![
                ColumnDef::new("query_id", ColumnType::Integer),
                ColumnDef::new("name", ColumnType::String),
            ],
            rows: vec![
                vec![Value::Integer(1), Value::Text("first".into())],
                vec![Value::Integer(22), Value::Null],
            ],
        }
    }

    #[test]
    fn test_records() {
        let records = result_set().to_records();
        assert_eq!(records[0], serde_json::json!({"query_id": 1, "name": "first"}));
        assert_eq!(records[1], serde_json::json!({"query_id": 22, "name": null}));
    }

    #[test]
    fn test_render_table() {
        let rendered = result_set().render_table();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "query_id | name");
        assert_eq!(lines[1], "---------+------");
        assert_eq!(lines[2], "1        | first");
        assert_eq!(lines[3], "22       | NULL");
    }
}
