//! # Dune Analytics handler
//!
//! Exposes the Dune Analytics REST API as a set of virtual tables that can be
//! queried with simple `SELECT` statements:
//!
//! ```no_run
//! use dune_handler::{DuneHandler, HandlerConfig};
//!
//! # async fn run() -> dune_handler::Result<()> {
//! let mut handler = DuneHandler::new("dune", HandlerConfig::new("my-api-key"))?;
//! assert!(handler.connect().await.success);
//!
//! let contracts = handler
//!     .native_query("SELECT address, name FROM contracts WHERE blockchain = 'ethereum' LIMIT 20")
//!     .await?;
//! println!("{}", contracts.render_table());
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is cached: every select goes to the API.
//!
//! ## Module Organization
//!
//! - `config` - connection settings (env vars or connection data)
//! - `client` - authenticated HTTP calls to Dune and Sim
//! - `schema` / `value` - column definitions and JSON → typed row mapping
//! - `query` - select requests and native SQL parsing
//! - `tables` - one adapter per virtual table
//! - `handler` - connection checks and select dispatch

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod query;
pub mod response;
pub mod schema;
pub mod tables;
pub mod value;

pub use client::DuneClient;
pub use config::{connection_args, connection_args_example, ConfigError, HandlerConfig};
pub use error::{HandlerError, Result};
pub use handler::DuneHandler;
pub use query::{Condition, Operator, SelectRequest};
pub use response::{ResultSet, StatusResponse};
pub use schema::{ColumnDef, Row, TableSchema};
pub use value::{ColumnType, Value};

/// Handler identifier used when registering with a host
pub const NAME: &str = "dune";
pub const TITLE: &str = "Dune Analytics";
pub const DESCRIPTION: &str = "Query Dune Analytics blockchain data as SQL tables";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
