//! Run one SQL statement against the Dune handler and print the rows.
//!
//! Configuration comes from the environment (or a `.env` file), see
//! `HandlerConfig::from_env`.
//!
//! ```text
//! dune-sql "SELECT * FROM contracts WHERE blockchain = 'base' LIMIT 10"
//! dune-sql --format json "SELECT * FROM executions WHERE execution_id = '01H...'"
//! dune-sql --check
//! ```

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use dune_handler::{DuneHandler, HandlerConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Aligned plain-text table
    Table,
    /// One JSON object per row
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "dune-sql", version, about = "Query Dune Analytics with SQL")]
struct Args {
    /// SELECT statement to run
    sql: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Override DUNE_BASE_URL
    #[arg(long)]
    base_url: Option<String>,

    /// Only check that the API key is accepted
    #[arg(long)]
    check: bool,

    /// List tables and their columns
    #[arg(long)]
    tables: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    // NOTE: Workaround for rustls issue
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Can't set crypto provider to aws_lc_rs"))?;

    let args = Args::parse();

    let mut config = HandlerConfig::from_env().context("loading configuration")?;
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    config.validate()?;

    let mut handler = DuneHandler::new(dune_handler::NAME, config)?;

    if args.tables {
        for table in handler.get_tables() {
            let columns = handler
                .get_columns(table)?
                .iter()
                .map(|c| format!("{} {}", c.name, c.ty))
                .collect::<Vec<_>>();
            println!("{} ({})", table, columns.join(", "));
        }
        return Ok(());
    }

    if args.check {
        let status = handler.check_connection().await;
        match status.error_message {
            None => println!("✅ Connected to {}", handler.config().base_url),
            Some(msg) => bail!(msg),
        }
        return Ok(());
    }

    let Some(sql) = args.sql else {
        bail!("no SQL statement given (see --help)");
    };

    log::info!("🚀 Running: {}", sql);
    let result = handler.native_query(&sql).await?;

    match args.format {
        OutputFormat::Table => println!("{}", result.render_table()),
        OutputFormat::Json => {
            for record in result.to_records() {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    log::info!("{} row(s)", result.len());

    Ok(())
}
