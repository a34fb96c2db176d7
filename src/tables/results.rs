//! `results`: execution results flattened to one row per cell
//!
//! A result row `{a: 1, b: "x"}` at position 1 becomes
//! `(execution_id, query_id, 1, "a", "1")` and `(execution_id, query_id, 1, "b", "x")`.
//! Row numbers are 1-based and columns follow the result metadata order, so
//! pivoting on (row_number, column_name) rebuilds the original table.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{parse_query_id, Filters, VirtualTable};
use crate::client::{DuneClient, ExecutionResults};
use crate::error::{HandlerError, Result};
use crate::query::SelectRequest;
use crate::schema::{ColumnDef, Row, TableSchema};
use crate::value::{ColumnType, Value};

pub struct ResultsTable {
    schema: TableSchema,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "results",
                vec![
                    ColumnDef::new("execution_id", ColumnType::String),
                    ColumnDef::new("query_id", ColumnType::Integer),
                    ColumnDef::new("row_number", ColumnType::Integer),
                    ColumnDef::new("column_name", ColumnType::String),
                    ColumnDef::new("column_value", ColumnType::String),
                ],
            ),
        }
    }
}

impl Default for ResultsTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for ResultsTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);

        let (results, requested_query) = if let Some(execution_id) = filters.take_eq("execution_id") {
            // Each result row yields at least one flattened row, so a row
            // limit never cuts below the cell limit
            let limit = filters.provider_limit(request.limit);
            (client.wait_for_results(&execution_id, limit).await?, None)
        } else if let Some(raw_id) = filters.take_eq("query_id") {
            let query_id = parse_query_id(&raw_id)?;
            let limit = filters.provider_limit(request.limit);
            let results = client.get_latest_results(query_id, limit).await?;
            ensure_finished(&results)?;
            (results, Some(query_id))
        } else {
            return Err(HandlerError::invalid_query(
                "results requires execution_id = <id> or query_id = <id>",
            ));
        };

        let query_id = results
            .query_id
            .map(i128::from)
            .or(requested_query.map(i128::from));

        filters.apply(&self.schema, flatten(&results, query_id), request.limit)
    }
}

fn ensure_finished(results: &ExecutionResults) -> Result<()> {
    let state = results.state();
    if state.is_success() {
        Ok(())
    } else if state.is_failure() {
        Err(HandlerError::ExecutionFailed {
            execution_id: results.execution_id.clone(),
            state: state.to_string(),
            message: results.error_message(),
        })
    } else {
        Err(HandlerError::ExecutionPending {
            execution_id: results.execution_id.clone(),
            state: state.to_string(),
        })
    }
}

fn flatten(results: &ExecutionResults, query_id: Option<i128>) -> Vec<Row> {
    let columns = results.column_names();
    let query_id = query_id.map(Value::Integer).unwrap_or(Value::Null);

    let mut rows = Vec::with_capacity(results.rows().len() * columns.len());
    for (idx, result_row) in results.rows().iter().enumerate() {
        for column in &columns {
            rows.push(vec![
                Value::Text(results.execution_id.clone()),
                query_id.clone(),
                Value::Integer(idx as i128 + 1),
                Value::Text(column.clone()),
                result_row.get(column).map(cell_text).unwrap_or(Value::Null),
            ]);
        }
    }
    rows
}

/// Cell as text; strings are kept unquoted, other JSON as its literal form
fn cell_text(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn results() -> ExecutionResults {
        serde_json::from_value(json!({
            "execution_id": "01HEXEC",
            "query_id": 42,
            "state": "QUERY_STATE_COMPLETED",
            "result": {
                "metadata": {"column_names": ["block", "hash", "fee"]},
                "rows": [
                    {"block": 18000000, "hash": "0xaa", "fee": 1.5},
                    {"block": 18000001, "hash": "0xbb", "fee": null}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_flatten_pivots_back_to_original() {
        let flat = flatten(&results(), Some(42));
        assert_eq!(flat.len(), 6);

        let mut pivot: BTreeMap<i128, Vec<(String, Value)>> = BTreeMap::new();
        for row in &flat {
            assert_eq!(row[0], Value::Text("01HEXEC".into()));
            assert_eq!(row[1], Value::Integer(42));
            let n = row[2].as_i128().unwrap();
            let column = row[3].as_str().unwrap().to_string();
            pivot.entry(n).or_default().push((column, row[4].clone()));
        }

        assert_eq!(
            pivot[&1],
            vec![
                ("block".to_string(), Value::Text("18000000".into())),
                ("hash".to_string(), Value::Text("0xaa".into())),
                ("fee".to_string(), Value::Text("1.5".into())),
            ]
        );
        assert_eq!(pivot[&2][2], ("fee".to_string(), Value::Null));
    }

    #[test]
    fn test_ensure_finished_states() {
        assert!(ensure_finished(&results()).is_ok());

        let failed: ExecutionResults = serde_json::from_value(json!({
            "execution_id": "01HEXEC",
            "state": "QUERY_STATE_FAILED",
            "error": {"type": "FAILED_TYPE_EXECUTION_FAILED", "message": "line 1: syntax error"}
        }))
        .unwrap();
        match ensure_finished(&failed).unwrap_err() {
            HandlerError::ExecutionFailed { message, .. } => assert_eq!(message, "line 1: syntax error"),
            other => panic!("unexpected error: {other:?}"),
        }

        let pending: ExecutionResults = serde_json::from_value(json!({
            "execution_id": "01HEXEC",
            "state": "QUERY_STATE_EXECUTING"
        }))
        .unwrap();
        assert!(matches!(
            ensure_finished(&pending),
            Err(HandlerError::ExecutionPending { .. })
        ));
    }
}
