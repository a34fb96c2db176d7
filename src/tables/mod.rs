//! Virtual table adapters
//!
//! Each adapter turns a [`SelectRequest`] into one or more client calls and
//! maps the JSON it gets back through its [`TableSchema`]. Conditions the
//! provider can answer (ids, chain names) are pushed down into the request
//! path; everything else is evaluated locally over the fetched rows.
//!
//! ## Tables
//!
//! - `queries` - saved query metadata, by `query_id`
//! - `executions` - execution status by `execution_id`, or a new execution by `query_id`
//! - `results` - execution results flattened into (row_number, column_name, column_value)
//! - `contracts`, `dex`, `markets` - trending snapshots per chain
//! - `balances`, `transactions`, `collectibles` - Sim wallet data, by `wallet_address`

pub mod contracts;
pub mod dex;
pub mod executions;
pub mod markets;
pub mod queries;
pub mod results;
pub mod wallet;

use async_trait::async_trait;

use crate::client::DuneClient;
use crate::error::{HandlerError, Result};
use crate::query::{Condition, Operator, SelectRequest};
use crate::schema::{Row, TableSchema};
use crate::value::Value;

pub use contracts::ContractsTable;
pub use dex::DexTable;
pub use executions::ExecutionsTable;
pub use markets::MarketsTable;
pub use queries::QueriesTable;
pub use results::ResultsTable;
pub use wallet::WalletTable;

/// Chain used by the trending tables when no `blockchain` condition is given
pub const DEFAULT_CHAIN: &str = "ethereum";

#[async_trait]
pub trait VirtualTable: Send + Sync {
    fn schema(&self) -> &TableSchema;

    fn name(&self) -> &'static str {
        self.schema().name
    }

    /// Fetch rows matching `request.conditions`, at most `request.limit` of them.
    /// Rows carry every schema column; projection is applied by the caller.
    async fn list(&self, client: &DuneClient, request: &SelectRequest) -> Result<Vec<Row>>;
}

/// Conditions of a request that still need to be satisfied.
///
/// Adapters take the conditions they push down to the provider; the rest are
/// applied locally by [`Filters::apply`].
#[derive(Debug, Clone)]
pub struct Filters {
    remaining: Vec<Condition>,
}

impl Filters {
    pub fn new(request: &SelectRequest) -> Self {
        Self {
            remaining: request.conditions.clone(),
        }
    }

    /// Remove and return the literal of the first `column = literal` condition
    pub fn take_eq(&mut self, column: &str) -> Option<String> {
        let idx = self
            .remaining
            .iter()
            .position(|c| c.column == column && c.op == Operator::Eq)?;
        self.remaining.remove(idx).values.into_iter().next()
    }

    /// Like [`Filters::take_eq`], but also accepts `column IN (...)`
    pub fn take_any_of(&mut self, column: &str) -> Option<Vec<String>> {
        let idx = self
            .remaining
            .iter()
            .position(|c| c.column == column && matches!(c.op, Operator::Eq | Operator::In))?;
        Some(self.remaining.remove(idx).values)
    }

    /// Add a condition checked locally only
    pub fn push(&mut self, condition: Condition) {
        self.remaining.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Whether any remaining condition, whatever its operator, is on `column`
    pub fn mentions(&self, column: &str) -> bool {
        self.remaining.iter().any(|c| c.column == column)
    }

    pub fn remaining(&self) -> &[Condition] {
        &self.remaining
    }

    /// Limit that may be forwarded to the provider. Only safe when no local
    /// filtering can drop rows afterwards.
    pub fn provider_limit(&self, limit: Option<usize>) -> Option<usize> {
        if self.is_empty() {
            limit
        } else {
            None
        }
    }

    /// Keep only the rows matching every remaining condition, then truncate
    /// to `limit`.
    pub fn apply(&self, schema: &TableSchema, rows: Vec<Row>, limit: Option<usize>) -> Result<Vec<Row>> {
        let mut resolved = Vec::with_capacity(self.remaining.len());
        for condition in &self.remaining {
            let idx = schema.index_of(&condition.column).ok_or_else(|| {
                HandlerError::invalid_query(format!(
                    "unknown column '{}' in table {}",
                    condition.column, schema.name
                ))
            })?;
            resolved.push((idx, schema.columns[idx].ty, condition));
        }

        let limit = limit.unwrap_or(usize::MAX);
        let mut kept = Vec::new();
        for row in rows {
            if kept.len() >= limit {
                break;
            }
            let mut keep = true;
            for (idx, ty, condition) in &resolved {
                if !condition.matches(&row[*idx], *ty)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                kept.push(row);
            }
        }
        Ok(kept)
    }
}

/// Parse a `query_id` literal
pub(crate) fn parse_query_id(raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| HandlerError::invalid_query(format!("query_id must be a positive integer, got '{}'", raw)))
}

/// Fill `column` with `value` on rows where the provider left it out
pub(crate) fn fill_missing(schema: &TableSchema, row: &mut Row, column: &str, value: &str) {
    if let Some(idx) = schema.index_of(column) {
        if row[idx].is_null() {
            row[idx] = Value::Text(value.to_string());
        }
    }
}

/// The standard table set, in registration order
pub fn all_tables() -> Vec<Box<dyn VirtualTable>> {
    vec![
        Box::new(QueriesTable::new()),
        Box::new(ExecutionsTable::new()),
        Box::new(ResultsTable::new()),
        Box::new(ContractsTable::new()),
        Box::new(DexTable::new()),
        Box::new(MarketsTable::new()),
        Box::new(WalletTable::balances()),
        Box::new(WalletTable::transactions()),
        Box::new(WalletTable::collectibles()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::value::ColumnType;

    fn schema() -> TableSchema {
        TableSchema::new(
            "t",
            vec![
                ColumnDef::new("chain", ColumnType::String),
                ColumnDef::new("n", ColumnType::Integer),
            ],
        )
    }

    fn rows() -> Vec<Row> {
        (1..=5)
            .map(|n| {
                vec![
                    Value::Text(if n % 2 == 0 { "base" } else { "ethereum" }.to_string()),
                    Value::Integer(n),
                ]
            })
            .collect()
    }

    #[test]
    fn test_take_eq_removes_pushed_down_condition() {
        let request = SelectRequest::new("t")
            .filter_eq("chain", "base")
            .filter(Condition::new("n", Operator::Gt, "1"));
        let mut filters = Filters::new(&request);

        assert_eq!(filters.take_eq("chain").as_deref(), Some("base"));
        assert_eq!(filters.take_eq("chain"), None);
        assert!(!filters.is_empty());
        assert_eq!(filters.provider_limit(Some(3)), None);
    }

    #[test]
    fn test_take_any_of_accepts_in_lists() {
        let request = SelectRequest::new("t").filter(Condition::in_list("n", ["1", "2"]));
        let mut filters = Filters::new(&request);
        assert_eq!(filters.take_any_of("n"), Some(vec!["1".to_string(), "2".to_string()]));
        assert_eq!(filters.provider_limit(Some(3)), Some(3));
    }

    #[test]
    fn test_mentions_sees_any_operator() {
        let request = SelectRequest::new("t")
            .filter(Condition::new("n", Operator::NotEq, "1"))
            .filter_eq("chain", "base");
        let mut filters = Filters::new(&request);
        assert!(filters.mentions("n"));
        assert_eq!(filters.take_eq("n"), None);
        filters.take_eq("chain");
        assert_eq!(filters.remaining().len(), 1);
        assert!(!filters.mentions("chain"));
    }

    #[test]
    fn test_apply_filters_then_limits() {
        let request = SelectRequest::new("t").filter_eq("chain", "ethereum");
        let kept = Filters::new(&request).apply(&schema(), rows(), Some(2)).unwrap();

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0][1], Value::Integer(1));
        assert_eq!(kept[1][1], Value::Integer(3));
    }

    #[test]
    fn test_apply_rejects_unknown_column() {
        let request = SelectRequest::new("t").filter_eq("nope", "x");
        assert!(Filters::new(&request).apply(&schema(), rows(), None).is_err());
    }

    #[test]
    fn test_registered_table_names() {
        let names: Vec<_> = all_tables().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "queries",
                "executions",
                "results",
                "contracts",
                "dex",
                "markets",
                "balances",
                "transactions",
                "collectibles"
            ]
        );
    }
}
