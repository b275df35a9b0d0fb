use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::Level;

use crate::error::CloneError;
use crate::stores::postgres::PostgresStore;
use crate::stores::sqlite::SqliteStore;
use crate::stores::traits::{DestStore, SourceStore};
use crate::uri::URI;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Delete destination rows before writing the transferred set
    Clear,
    /// Upsert by primary key, keeping destination-only rows
    Merge,
}

#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
#[command(next_line_help = true)]
pub struct Args {
    /// URI of the source database
    #[arg(long, short)]
    pub source: URI,

    /// URI of the destination database
    #[arg(long, short)]
    pub dest: URI,

    /// Tables to transfer (default: the full registry, in dependency order)
    #[arg(long, short, value_delimiter = ',')]
    pub table: Vec<String>,

    /// Destination write mode
    #[arg(long, value_enum, default_value_t = Mode::Clear)]
    pub mode: Mode,

    /// Number of rows per destination write
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Number of rows per source fetch page
    #[arg(long, default_value_t = 1000)]
    pub fetch_page_size: u64,

    /// Skip the principal import (destination accounts already exist)
    #[clap(long, action)]
    pub skip_principals: bool,

    /// Disable referential integrity checks on the destination for the
    /// duration of the run
    #[clap(long, action)]
    pub disable_constraints: bool,

    /// Milliseconds to sleep between destination batches
    #[arg(long, default_value_t = 0)]
    pub batch_delay_ms: u64,

    /// Print the run report as JSON
    #[clap(long, action)]
    pub json: bool,

    /// Disable output
    #[clap(long, action)]
    pub quiet: bool,

    /// Log level
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Args {
    pub fn new(source: URI, dest: URI) -> Self {
        return Args {
            source,
            dest,
            table: Vec::new(),
            mode: Mode::Clear,
            batch_size: 100,
            fetch_page_size: 1000,
            skip_principals: false,
            disable_constraints: false,
            batch_delay_ms: 0,
            json: false,
            quiet: true,
            log_level: Level::INFO,
        };
    }

    fn build_sqlite(uri: &str) -> anyhow::Result<Box<SqliteStore>> {
        return Ok(Box::new(
            SqliteStore::new(uri).context("Unable to connect to the sqlite")?,
        ));
    }

    fn build_postgres(uri: &str) -> anyhow::Result<Box<PostgresStore>> {
        return Ok(Box::new(
            PostgresStore::new(uri).context("Unable to connect to the postgres")?,
        ));
    }

    pub fn create_source(&self) -> Result<Box<dyn SourceStore>, CloneError> {
        let store: Box<dyn SourceStore> = match &self.source {
            URI::Sqlite(uri) => {
                Self::build_sqlite(uri).map_err(|err| CloneError::Connection("source", err))?
            }
            URI::Postgres(uri) => {
                Self::build_postgres(uri).map_err(|err| CloneError::Connection("source", err))?
            }
        };
        return Ok(store);
    }

    pub fn create_dest(&self) -> Result<Box<dyn DestStore>, CloneError> {
        let store: Box<dyn DestStore> = match &self.dest {
            URI::Sqlite(uri) => {
                Self::build_sqlite(uri).map_err(|err| CloneError::Connection("destination", err))?
            }
            URI::Postgres(uri) => Self::build_postgres(uri)
                .map_err(|err| CloneError::Connection("destination", err))?,
        };
        return Ok(store);
    }
}
