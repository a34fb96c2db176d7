//! Handler shell
//!
//! Holds the configuration and API client, registers the virtual tables and
//! dispatches selects to them. This is the surface a hosting query engine
//! talks to: `connect`, `check_connection`, `get_tables`, `get_columns`,
//! `select` and `native_query`.

use reqwest::StatusCode;

use crate::client::DuneClient;
use crate::config::HandlerConfig;
use crate::error::{HandlerError, Result};
use crate::query::SelectRequest;
use crate::response::{ResultSet, StatusResponse};
use crate::schema::{ColumnDef, Row};
use crate::tables::{all_tables, VirtualTable};

pub struct DuneHandler {
    name: String,
    config: HandlerConfig,
    client: DuneClient,
    tables: Vec<Box<dyn VirtualTable>>,
    is_connected: bool,
}

impl DuneHandler {
    /// Create a handler with the standard table set. No request is made
    /// until [`DuneHandler::connect`] or the first select.
    pub fn new(name: impl Into<String>, config: HandlerConfig) -> Result<Self> {
        let client = DuneClient::new(&config)?;
        let name = name.into();
        let tables = all_tables();
        log::debug!(
            "Handler '{}' registered tables: {:?}",
            name,
            tables.iter().map(|t| t.name()).collect::<Vec<_>>()
        );

        Ok(Self {
            name,
            config,
            client,
            tables,
            is_connected: false,
        })
    }

    pub fn from_connection_data(name: impl Into<String>, data: &serde_json::Value) -> Result<Self> {
        let config = HandlerConfig::from_connection_data(data)?;
        Self::new(name, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    /// Verify that the API is reachable and accepts the key.
    ///
    /// A probe for a non-existent execution answers 200 or 404 when the key
    /// is valid and 401/403 when it is not.
    pub async fn connect(&mut self) -> StatusResponse {
        let status = self.probe().await;
        self.is_connected = status.success;
        status
    }

    pub async fn check_connection(&mut self) -> StatusResponse {
        self.connect().await
    }

    pub fn disconnect(&mut self) {
        if self.is_connected {
            log::info!("Handler '{}' disconnected", self.name);
        }
        self.is_connected = false;
    }

    async fn probe(&self) -> StatusResponse {
        if self.config.api_key.trim().is_empty() {
            return StatusResponse::failed("Connection failed: API key is required");
        }

        match self.client.probe().await {
            Ok(StatusCode::OK) | Ok(StatusCode::NOT_FOUND) => {
                log::info!("✅ Handler '{}' connected to {}", self.name, self.config.base_url);
                StatusResponse::ok()
            }
            Ok(StatusCode::UNAUTHORIZED) | Ok(StatusCode::FORBIDDEN) => {
                StatusResponse::failed("Connection failed: Invalid API key")
            }
            Ok(status) => StatusResponse::failed(format!(
                "Connection test returned status {}",
                status.as_u16()
            )),
            Err(HandlerError::Timeout(_)) => {
                StatusResponse::failed("Connection failed: Request timeout")
            }
            Err(HandlerError::Network(msg)) => StatusResponse::failed(format!(
                "Connection failed: Cannot connect to Dune API: {}",
                msg
            )),
            Err(e) => {
                log::error!("❌ Error connecting to Dune: {}", e);
                StatusResponse::failed(format!("Connection failed: {}", e))
            }
        }
    }

    pub fn get_tables(&self) -> Vec<&'static str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn get_columns(&self, table: &str) -> Result<Vec<ColumnDef>> {
        Ok(self.table(table)?.schema().columns.clone())
    }

    /// Run a select against one virtual table
    pub async fn select(&self, request: &SelectRequest) -> Result<ResultSet> {
        let table = self.table(&request.table)?;
        let schema = table.schema();

        for condition in &request.conditions {
            if schema.column(&condition.column).is_none() {
                return Err(HandlerError::invalid_query(format!(
                    "unknown column '{}' in WHERE clause of table {}",
                    condition.column, schema.name
                )));
            }
        }

        let projection = match &request.projection {
            None => (0..schema.columns.len()).collect::<Vec<_>>(),
            Some(columns) => columns
                .iter()
                .map(|c| {
                    schema.index_of(c).ok_or_else(|| {
                        HandlerError::invalid_query(format!(
                            "unknown column '{}' in table {}",
                            c, schema.name
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        };

        log::debug!(
            "SELECT from {} where [{}] limit {:?}",
            schema.name,
            request
                .conditions
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" AND "),
            request.limit
        );

        let mut rows = table.list(&self.client, request).await?;
        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }

        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| projection.iter().map(|&i| row[i].clone()).collect())
            .collect();
        let columns: Vec<ColumnDef> = projection
            .iter()
            .map(|&i| schema.columns[i].clone())
            .collect();

        Ok(ResultSet { columns, rows })
    }

    /// Parse and run a native SQL `SELECT`
    pub async fn native_query(&self, sql: &str) -> Result<ResultSet> {
        let request = SelectRequest::parse(sql)?;
        self.select(&request).await
    }

    fn table(&self, name: &str) -> Result<&dyn VirtualTable> {
        self.tables
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .map(|t| &**t)
            .ok_or_else(|| {
                HandlerError::invalid_query(format!(
                    "unknown table '{}', available tables: {}",
                    name,
                    self.get_tables().join(", ")
                ))
            })
    }
}
