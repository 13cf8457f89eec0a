//! Runtime configuration
use crate::persistence::{InMemoryAdStore, JournalAdStore, PostgresAdStore, SharedAdStore};
use anyhow::{format_err, Result};
use clap::{Parser, ValueEnum};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Nothing survives a restart
    Memory,
    /// Append-only journal in `--data-dir`
    Journal,
    /// `PostgreSQL` at `--database-url`
    Postgres,
}

/// Persisted-ledger auction service
#[derive(Debug, Parser)]
#[command(name = "auctioneer", long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "AUCTIONEER_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Where ads are stored
    #[arg(long, env = "AUCTIONEER_STORE", value_enum, default_value_t = StoreKind::Journal)]
    pub store: StoreKind,

    /// Directory holding the journal
    #[arg(long, env = "AUCTIONEER_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// `PostgreSQL` connection string, required with `--store postgres`
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Log level used when `RUST_LOG` is not set
    #[arg(long, env = "AUCTIONEER_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn open_store(&self) -> Result<SharedAdStore> {
        info!(store = ?self.store, "opening ad store");
        match self.store {
            StoreKind::Memory => {
                warn!("using in-memory store, ads will be lost on exit");
                Ok(InMemoryAdStore::new_shared())
            }
            StoreKind::Journal => JournalAdStore::open_shared(&self.data_dir),
            StoreKind::Postgres => {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    format_err!("--database-url (or DATABASE_URL) is required for the postgres store")
                })?;
                PostgresAdStore::connect_shared(url)
            }
        }
    }
}
