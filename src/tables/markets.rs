//! `markets`: market share of projects within a market type and chain

use async_trait::async_trait;

use super::{fill_missing, Filters, VirtualTable, DEFAULT_CHAIN};
use crate::client::DuneClient;
use crate::error::Result;
use crate::query::{Condition, SelectRequest};
use crate::schema::{extract_rows, ColumnDef, Row, TableSchema};
use crate::value::ColumnType;

/// Market type used when no `market_type` condition is given
pub const DEFAULT_MARKET: &str = "dex";

pub struct MarketsTable {
    schema: TableSchema,
}

impl MarketsTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::new(
                "markets",
                vec![
                    ColumnDef::from_keys("market_type", ColumnType::String, &["market_type", "market"]),
                    ColumnDef::from_keys("blockchain", ColumnType::String, &["blockchain", "chain"]),
                    ColumnDef::from_keys("project_name", ColumnType::String, &["project_name", "project"]),
                    ColumnDef::from_keys("volume_usd", ColumnType::Float, &["volume_usd", "volume", "amount_usd"]),
                    ColumnDef::new("market_share", ColumnType::Float),
                    ColumnDef::from_keys("trade_count", ColumnType::Integer, &["trade_count", "trades"]),
                    ColumnDef::from_keys("period", ColumnType::String, &["period", "time_period"]),
                ],
            ),
        }
    }
}

impl Default for MarketsTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VirtualTable for MarketsTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);
        let market = filters
            .take_eq("market_type")
            .unwrap_or_else(|| DEFAULT_MARKET.to_string());
        let chain = filters
            .take_eq("blockchain")
            .unwrap_or_else(|| DEFAULT_CHAIN.to_string());
        let limit = filters.provider_limit(request.limit);

        let payload = client.market_share(&market, &chain, limit).await?;
        let mut rows = Vec::new();
        for item in extract_rows(&payload, &["markets", "results"])? {
            let mut row = self.schema.map_row(item)?;
            fill_missing(&self.schema, &mut row, "market_type", &market);
            fill_missing(&self.schema, &mut row, "blockchain", &chain);
            rows.push(row);
        }

        filters.push(Condition::eq("market_type", market));
        filters.push(Condition::eq("blockchain", chain));
        filters.apply(&self.schema, rows, request.limit)
    }
}
