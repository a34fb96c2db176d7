//! `queries`: saved query metadata

use async_trait::async_trait;

use super::{parse_query_id, Filters, VirtualTable};
use crate::client::DuneClient;
use crate::error::{HandlerError, Result};
use crate::query::SelectRequest;
use crate::schema::{ColumnDef, Row, TableSchema};
use crate::value::ColumnType;

pub struct QueriesTable {
    schema: TableSchema,
}

impl QueriesTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "queries",
                vec![
                    ColumnDef::new("query_id", ColumnType::Integer),
                    ColumnDef::new("name", ColumnType::String),
                    ColumnDef::new("description", ColumnType::String),
                    ColumnDef::new("owner", ColumnType::String),
                    ColumnDef::new("query_engine", ColumnType::String),
                    ColumnDef::new("query_sql", ColumnType::String),
                    ColumnDef::new("version", ColumnType::Integer),
                    ColumnDef::new("tags", ColumnType::Json),
                    ColumnDef::new("parameters", ColumnType::Json),
                    ColumnDef::new("is_private", ColumnType::Boolean),
                    ColumnDef::new("is_archived", ColumnType::Boolean),
                    ColumnDef::new("is_unsaved", ColumnType::Boolean),
                ],
            ),
        }
    }
}

impl Default for QueriesTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for QueriesTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);
        let ids = filters.take_any_of("query_id").ok_or_else(|| {
            HandlerError::invalid_query(
                "queries cannot be listed; filter with query_id = <id> or query_id IN (...)",
            )
        })?;
        let ids = ids
            .iter()
            .map(|raw| parse_query_id(raw))
            .collect::<Result<Vec<_>>>()?;

        let wanted = filters.provider_limit(request.limit).unwrap_or(usize::MAX);
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids.into_iter().take(wanted) {
            let payload = client.get_query(id).await?;
            rows.push(self.schema.map_row(&payload)?);
        }

        filters.apply(&self.schema, rows, request.limit)
    }
}
