//! `executions`: status of query executions
//!
//! A select by `execution_id` (`=` or `IN`) is a pure status read, one call
//! per id. A select filtered only by `query_id` (and optionally
//! `performance`) triggers a new execution on every call and returns its
//! handle, so it is not idempotent. Any other shape that would trigger is
//! rejected before a request is made.
//!
//! `performance` is known only for executions triggered here; the status
//! endpoint does not report it.

use async_trait::async_trait;
use serde_json::json;

use super::{parse_query_id, Filters, VirtualTable};
use crate::client::{DuneClient, ExecuteParams};
use crate::error::{HandlerError, Result};
use crate::query::SelectRequest;
use crate::schema::{ColumnDef, Row, TableSchema};
use crate::value::{ColumnType, Value};

pub struct ExecutionsTable {
    schema: TableSchema,
}

impl ExecutionsTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "executions",
                vec![
                    ColumnDef::new("execution_id", ColumnType::String),
                    ColumnDef::new("query_id", ColumnType::Integer),
                    ColumnDef::new("state", ColumnType::String),
                    ColumnDef::new("is_execution_finished", ColumnType::Boolean),
                    ColumnDef::new("submitted_at", ColumnType::Timestamp),
                    ColumnDef::new("execution_started_at", ColumnType::Timestamp),
                    ColumnDef::new("execution_ended_at", ColumnType::Timestamp),
                    ColumnDef::new("expires_at", ColumnType::Timestamp),
                    ColumnDef::new("queue_position", ColumnType::Integer),
                    ColumnDef::from_keys(
                        "result_row_count",
                        ColumnType::Integer,
                        &["result_metadata.total_row_count"],
                    ),
                    ColumnDef::from_keys("error_message", ColumnType::String, &["error.message"]),
                    ColumnDef::new("performance", ColumnType::String),
                ],
            ),
        }
    }
}

impl Default for ExecutionsTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for ExecutionsTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);

        if let Some(ids) = filters.take_any_of("execution_id") {
            if filters.mentions("performance") {
                return Err(HandlerError::invalid_query(
                    "performance is only known for executions started by this select, \
                     it cannot filter a status read",
                ));
            }
            let mut rows = Vec::with_capacity(ids.len());
            for execution_id in &ids {
                let status = client.get_execution_status(execution_id).await?;
                rows.push(self.schema.map_row(&status)?);
            }
            return filters.apply(&self.schema, rows, request.limit);
        }

        if filters.mentions("execution_id") {
            return Err(HandlerError::invalid_query(
                "execution_id supports only = or IN; a select on execution_id never starts an execution",
            ));
        }

        let Some(raw_id) = filters.take_eq("query_id") else {
            return Err(HandlerError::invalid_query(
                "executions requires execution_id = <id> (status) or query_id = <id> (new execution)",
            ));
        };
        let query_id = parse_query_id(&raw_id)?;
        let params = ExecuteParams {
            performance: filters.take_eq("performance"),
            ..Default::default()
        };

        // The new row would be dropped by anything left to filter on
        if !filters.is_empty() {
            let remaining = filters
                .remaining()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" AND ");
            return Err(HandlerError::invalid_query(format!(
                "starting an execution accepts only query_id and performance conditions, got: {}",
                remaining
            )));
        }
        if request.limit == Some(0) {
            return Err(HandlerError::invalid_query(
                "LIMIT 0 would discard the execution started by this select",
            ));
        }

        let handle = client.execute_query(query_id, &params).await?;
        let mut fixed = vec![("query_id", Value::Integer(query_id as i128))];
        if let Some(performance) = &params.performance {
            fixed.push(("performance", Value::Text(performance.clone())));
        }
        let row = self.schema.map_row_with(
            &json!({
                "execution_id": handle.execution_id,
                "state": handle.state,
            }),
            &fixed,
        )?;
        Ok(vec![row])
    }
}
