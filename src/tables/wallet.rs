//! Sim by Dune wallet tables: `balances`, `transactions`, `collectibles`
//!
//! All three are keyed by `wallet_address` and share one adapter; only the
//! endpoint and the schema differ.

use async_trait::async_trait;

use super::{fill_missing, Filters, VirtualTable};
use crate::client::{DuneClient, WalletEndpoint};
use crate::error::{HandlerError, Result};
use crate::query::SelectRequest;
use crate::schema::{extract_rows, ColumnDef, Row, TableSchema};
use crate::value::ColumnType;

pub struct WalletTable {
    endpoint: WalletEndpoint,
    schema: TableSchema,
}

impl WalletTable {
    pub fn balances() -> Self {
        Self {
            endpoint: WalletEndpoint::Balances,
            schema: TableSchema::new(
                "balances",
                vec![
                    ColumnDef::new("wallet_address", ColumnType::String),
                    ColumnDef::new("chain", ColumnType::String),
                    ColumnDef::new("address", ColumnType::String),
                    // Raw token units can exceed 128 bits, keep the provider's text
                    ColumnDef::new("amount", ColumnType::String),
                    ColumnDef::new("decimals", ColumnType::Integer),
                    ColumnDef::new("symbol", ColumnType::String),
                    ColumnDef::new("price_usd", ColumnType::Float),
                    ColumnDef::new("value_usd", ColumnType::Float),
                ],
            ),
        }
    }

    pub fn transactions() -> Self {
        Self {
            endpoint: WalletEndpoint::Transactions,
            schema: TableSchema::new(
                "transactions",
                vec![
                    ColumnDef::new("wallet_address", ColumnType::String),
                    ColumnDef::new("chain", ColumnType::String),
                    ColumnDef::new("hash", ColumnType::String),
                    ColumnDef::new("block_number", ColumnType::Integer),
                    ColumnDef::from_keys("from_address", ColumnType::String, &["from_address", "from"]),
                    ColumnDef::from_keys("to_address", ColumnType::String, &["to_address", "to"]),
                    ColumnDef::new("value", ColumnType::String),
                    ColumnDef::new("gas_used", ColumnType::Integer),
                    ColumnDef::from_keys("timestamp", ColumnType::Timestamp, &["timestamp", "block_time"]),
                ],
            ),
        }
    }

    pub fn collectibles() -> Self {
        Self {
            endpoint: WalletEndpoint::Collectibles,
            schema: TableSchema::new(
                "collectibles",
                vec![
                    ColumnDef::new("wallet_address", ColumnType::String),
                    ColumnDef::new("chain", ColumnType::String),
                    ColumnDef::new("contract_address", ColumnType::String),
                    ColumnDef::new("token_id", ColumnType::String),
                    ColumnDef::new("name", ColumnType::String),
                    ColumnDef::new("description", ColumnType::String),
                    ColumnDef::new("image_url", ColumnType::String),
                    ColumnDef::new("collection_name", ColumnType::String),
                ],
            ),
        }
    }
}

#[async_trait]
impl VirtualTable for WalletTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>> {
        let mut filters = Filters::new(request);
        let wallet = filters.take_eq("wallet_address").ok_or_else(|| {
            HandlerError::invalid_query(format!(
                "{} requires wallet_address = <address>",
                self.schema.name
            ))
        })?;

        let payload = match self.endpoint {
            WalletEndpoint::Balances => client.wallet_balances(&wallet).await?,
            WalletEndpoint::Transactions => client.wallet_transactions(&wallet).await?,
            WalletEndpoint::Collectibles => client.wallet_collectibles(&wallet).await?,
        };
        let owner = payload
            .get("wallet_address")
            .and_then(|v| v.as_str())
            .unwrap_or(&wallet)
            .to_string();

        let mut rows = Vec::new();
        for item in extract_rows(&payload, &[self.endpoint.path()])? {
            let mut row = self.schema.map_row(item)?;
            fill_missing(&self.schema, &mut row, "wallet_address", &owner);
            rows.push(row);
        }

        filters.apply(&self.schema, rows, request.limit)
    }
}
