//! `contracts`: trending EVM contracts per chain

use async_trait::async_trait;

use super::{fill_missing, Filters, VirtualTable, DEFAULT_CHAIN};
use crate::client::DuneClient;
use crate::error::Result;
use crate::query::{Condition, SelectRequest};
use crate::schema::{extract_rows, ColumnDef, Row, TableSchema};
use crate::value::ColumnType;

pub struct ContractsTable {
    schema: TableSchema,
}

impl ContractsTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "contracts",
                vec![
                    ColumnDef::from_keys("address", ColumnType::String, &["contract_address", "address"]),
                    ColumnDef::from_keys("blockchain", ColumnType::String, &["blockchain", "chain"]),
                    ColumnDef::from_keys("name", ColumnType::String, &["contract_name", "name"]),
                    ColumnDef::from_keys("project", ColumnType::String, &["project", "namespace"]),
                    ColumnDef::from_keys(
                        "transaction_count",
                        ColumnType::Integer,
                        &["transaction_count", "tx_count", "transaction_calls"],
                    ),
                    ColumnDef::from_keys(
                        "unique_callers",
                        ColumnType::Integer,
                        &["unique_callers", "unique_users"],
                    ),
                    ColumnDef::from_keys("gas_used", ColumnType::Integer, &["gas_used", "total_gas_used"]),
                    ColumnDef::from_keys("deployed_at", ColumnType::Timestamp, &["deployed_at", "created_at"]),
                ],
            ),
        }
    }
}

impl Default for ContractsTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for ContractsTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);
        let chain = filters
            .take_eq("blockchain")
            .unwrap_or_else(|| DEFAULT_CHAIN.to_string());
        let limit = filters.provider_limit(request.limit);

        let payload = client.trending_contracts(&chain, limit).await?;
        let rows = extract_rows(&payload, &["contracts", "results"])?
            .iter()
            .map(|item| {
                let mut row = self.schema.map_row(item)?;
                fill_missing(&self.schema, &mut row, "blockchain", &chain);
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        // Rows labelled with another chain are dropped even though the chain
        // was pushed down
        filters.push(Condition::eq("blockchain", chain));
        filters.apply(&self.schema, rows, request.limit)
    }
}
