//! Response payloads of the execution endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Lifecycle of a remote query execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Executing,
    Completed,
    CompletedPartial,
    Failed,
    Cancelled,
    Expired,
    Other(String),
}

impl ExecutionState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "QUERY_STATE_PENDING" => ExecutionState::Pending,
            "QUERY_STATE_EXECUTING" => ExecutionState::Executing,
            "QUERY_STATE_COMPLETED" => ExecutionState::Completed,
            "QUERY_STATE_COMPLETED_PARTIAL" => ExecutionState::CompletedPartial,
            "QUERY_STATE_FAILED" => ExecutionState::Failed,
            "QUERY_STATE_CANCELLED" | "QUERY_STATE_CANCELED" => ExecutionState::Cancelled,
            "QUERY_STATE_EXPIRED" => ExecutionState::Expired,
            other => ExecutionState::Other(other.to_string()),
        }
    }

    /// Finished with a usable result set
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionState::Completed | ExecutionState::CompletedPartial)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ExecutionState::Failed | ExecutionState::Cancelled | ExecutionState::Expired
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ExecutionState::Pending | ExecutionState::Executing)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionState::Pending => "QUERY_STATE_PENDING",
            ExecutionState::Executing => "QUERY_STATE_EXECUTING",
            ExecutionState::Completed => "QUERY_STATE_COMPLETED",
            ExecutionState::CompletedPartial => "QUERY_STATE_COMPLETED_PARTIAL",
            ExecutionState::Failed => "QUERY_STATE_FAILED",
            ExecutionState::Cancelled => "QUERY_STATE_CANCELLED",
            ExecutionState::Expired => "QUERY_STATE_EXPIRED",
            ExecutionState::Other(raw) => raw,
        };
        f.write_str(s)
    }
}

/// Response of `POST /query/{id}/execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHandle {
    pub execution_id: String,
    pub state: String,
}

/// Body of `POST /query/{id}/execute`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecuteParams {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub query_parameters: Map<String, JsonValue>,
    /// Engine tier, `medium` or `large`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultMetadata {
    #[serde(default)]
    pub column_names: Vec<String>,
    #[serde(default)]
    pub column_types: Vec<String>,
    #[serde(default)]
    pub total_row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub rows: Vec<Map<String, JsonValue>>,
    #[serde(default)]
    pub metadata: Option<ResultMetadata>,
}

/// Response of `GET /execution/{id}/results` and `GET /query/{id}/results`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionResults {
    pub execution_id: String,
    #[serde(default)]
    pub query_id: Option<i64>,
    pub state: String,
    #[serde(default)]
    pub is_execution_finished: Option<bool>,
    #[serde(default)]
    pub result: Option<ResultPayload>,
    #[serde(default)]
    pub error: Option<ExecutionError>,
    #[serde(default)]
    pub next_offset: Option<u64>,
}

impl ExecutionResults {
    pub fn state(&self) -> ExecutionState {
        ExecutionState::parse(&self.state)
    }

    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.kind.clone()))
            .unwrap_or_else(|| "no error message reported".to_string())
    }

    /// Column order of the result set: metadata order first, then any key
    /// seen on a row but missing from the metadata.
    pub fn column_names(&self) -> Vec<String> {
        let Some(result) = &self.result else {
            return Vec::new();
        };

        let mut names = result
            .metadata
            .as_ref()
            .map(|m| m.column_names.clone())
            .unwrap_or_default();

        for row in &result.rows {
            for key in row.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }

    pub fn rows(&self) -> &[Map<String, JsonValue>] {
        self.result.as_ref().map(|r| r.rows.as_slice()).unwrap_or(&[])
    }

    /// Append the rows of a following page; paging state comes from `page`.
    pub fn append_page(&mut self, page: ExecutionResults) {
        self.next_offset = page.next_offset;
        let Some(next) = page.result else {
            return;
        };
        match &mut self.result {
            Some(result) => {
                result.rows.extend(next.rows);
                if result.metadata.is_none() {
                    result.metadata = next.metadata;
                }
            }
            None => self.result = Some(next),
        }
    }

    pub fn truncate_rows(&mut self, limit: usize) {
        if let Some(result) = &mut self.result {
            result.rows.truncate(limit);
        }
    }
}

/// Sim wallet endpoints under `/evm/{kind}/{address}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEndpoint {
    Balances,
    Transactions,
    Collectibles,
}

impl WalletEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            WalletEndpoint::Balances => "balances",
            WalletEndpoint::Transactions => "transactions",
            WalletEndpoint::Collectibles => "collectibles",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_classification() {
        assert!(ExecutionState::parse("QUERY_STATE_COMPLETED").is_success());
        assert!(ExecutionState::parse("QUERY_STATE_EXECUTING").is_pending());
        assert!(ExecutionState::parse("QUERY_STATE_FAILED").is_failure());
        let unknown = ExecutionState::parse("QUERY_STATE_SOMETHING_NEW");
        assert!(!unknown.is_success() && !unknown.is_failure() && !unknown.is_pending());
        assert_eq!(unknown.to_string(), "QUERY_STATE_SOMETHING_NEW");
    }

    #[test]
    fn test_column_names_follow_metadata_order() {
        let results: ExecutionResults = serde_json::from_value(json!({
            "execution_id": "01H",
            "query_id": 1,
            "state": "QUERY_STATE_COMPLETED",
            "result": {
                "rows": [{"b": 1, "a": 2, "extra": 3}],
                "metadata": {"column_names": ["b", "a"]}
            }
        }))
        .unwrap();

        assert_eq!(results.column_names(), vec!["b", "a", "extra"]);
        assert_eq!(results.rows().len(), 1);
    }

    #[test]
    fn test_append_page_concatenates_rows() {
        let mut first: ExecutionResults = serde_json::from_value(json!({
            "execution_id": "01H",
            "state": "QUERY_STATE_COMPLETED",
            "next_offset": 2,
            "result": {
                "rows": [{"n": 1}, {"n": 2}],
                "metadata": {"column_names": ["n"], "total_row_count": 3}
            }
        }))
        .unwrap();
        let second: ExecutionResults = serde_json::from_value(json!({
            "execution_id": "01H",
            "state": "QUERY_STATE_COMPLETED",
            "result": {"rows": [{"n": 3}]}
        }))
        .unwrap();

        first.append_page(second);
        assert_eq!(first.next_offset, None);
        assert_eq!(first.rows().len(), 3);
        assert_eq!(first.rows()[2]["n"], json!(3));
        assert_eq!(first.column_names(), vec!["n"]);

        first.truncate_rows(1);
        assert_eq!(first.rows().len(), 1);
    }

    #[test]
    fn test_execute_params_body() {
        let empty = serde_json::to_value(ExecuteParams::default()).unwrap();
        assert_eq!(empty, json!({}));

        let mut params = ExecuteParams {
            performance: Some("large".to_string()),
            ..Default::default()
        };
        params.query_parameters.insert("wallet".into(), json!("0xabc"));
        assert_eq!(
            serde_json::to_value(params).unwrap(),
            json!({"query_parameters": {"wallet": "0xabc"}, "performance": "large"})
        );
    }
}
