//! `dex`: DEX pair statistics per chain

use async_trait::async_trait;

use super::{fill_missing, Filters, VirtualTable, DEFAULT_CHAIN};
use crate::client::DuneClient;
use crate::error::Result;
use crate::query::{Condition, SelectRequest};
use crate::schema::{extract_rows, ColumnDef, Row, TableSchema};
use crate::value::ColumnType;

pub struct DexTable {
    schema: TableSchema,
}

impl DexTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "dex",
                vec![
                    ColumnDef::from_keys("pair_address", ColumnType::String, &["pair_address", "pool_address", "pool_id"]),
                    ColumnDef::from_keys("blockchain", ColumnType::String, &["blockchain", "chain"]),
                    ColumnDef::from_keys("dex_name", ColumnType::String, &["dex_name", "project", "projects"]),
                    ColumnDef::new("token_pair", ColumnType::String),
                    ColumnDef::from_keys("token_a_address", ColumnType::String, &["token_a_address", "token_a.address"]),
                    ColumnDef::from_keys("token_b_address", ColumnType::String, &["token_b_address", "token_b.address"]),
                    ColumnDef::new("usd_liquidity", ColumnType::Float),
                    ColumnDef::new("one_day_volume", ColumnType::Float),
                    ColumnDef::new("seven_day_volume", ColumnType::Float),
                    ColumnDef::new("thirty_day_volume", ColumnType::Float),
                ],
            ),
        }
    }
}

impl Default for DexTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for DexTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);
        let chain = filters
            .take_eq("blockchain")
            .unwrap_or_else(|| DEFAULT_CHAIN.to_string());
        let limit = filters.provider_limit(request.limit);

        let payload = client.dex_pairs(&chain, limit).await?;
        let mut rows = Vec::new();
        for item in extract_rows(&payload, &["pairs", "results"])? {
            let mut row = self.schema.map_row(item)?;
            fill_missing(&self.schema, &mut row, "blockchain", &chain);
            rows.push(row);
        }

        filters.push(Condition::eq("blockchain", chain));
        filters.apply(&self.schema, rows, request.limit)
    }
}
