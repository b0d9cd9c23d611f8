//! Process configuration, parsed once by `clap` in `main` and handed down explicitly.

use crate::domain::ports::LedgerStoreBox;
use crate::error::StoreError;
use crate::infrastructure::in_memory::InMemoryLedgerStore;
use clap::{Args, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(feature = "storage-rocksdb")]
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "prod")]
    Production,
}

#[derive(Debug, Clone, Args)]
pub struct LogConfig {
    /// Deployment environment; selects human-readable or JSON log output
    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = Environment::Production, global = true)]
    pub environment: Environment,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[cfg(feature = "storage-postgres")]
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
#[cfg(feature = "storage-postgres")]
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Which ledger backend to use. With no option given the ledger lives in memory.
#[derive(Debug, Clone, Args)]
pub struct StorageConfig {
    /// Path to a persistent RocksDB ledger
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// PostgreSQL connection URL
    #[cfg(feature = "storage-postgres")]
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Maximum number of pooled PostgreSQL connections
    #[cfg(feature = "storage-postgres")]
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, global = true)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[cfg(feature = "storage-postgres")]
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS, global = true)]
    pub acquire_timeout_secs: u64,
}

// Written out so the pool settings match the command-line defaults.
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            #[cfg(feature = "storage-rocksdb")]
            db_path: None,
            #[cfg(feature = "storage-postgres")]
            database_url: None,
            #[cfg(feature = "storage-postgres")]
            max_connections: DEFAULT_MAX_CONNECTIONS,
            #[cfg(feature = "storage-postgres")]
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl StorageConfig {
    /// Opens the configured ledger store.
    pub async fn open(&self) -> Result<LedgerStoreBox, StoreError> {
        #[cfg(feature = "storage-postgres")]
        if let Some(url) = &self.database_url {
            use crate::infrastructure::postgres::{PgLedgerStore, PostgresConfig};

            let config = PostgresConfig {
                url: url.clone(),
                max_connections: self.max_connections,
                acquire_timeout: std::time::Duration::from_secs(self.acquire_timeout_secs),
            };
            let store = PgLedgerStore::connect(&config).await?;
            store.migrate().await?;
            return Ok(Box::new(store));
        }

        #[cfg(feature = "storage-rocksdb")]
        if let Some(path) = &self.db_path {
            let store = crate::infrastructure::rocksdb::RocksDBStore::open(path)?;
            tracing::info!(path = %path.display(), "using RocksDB ledger");
            return Ok(Box::new(store));
        }

        tracing::info!("using in-memory ledger");
        Ok(Box::new(InMemoryLedgerStore::new()))
    }
}

#[derive(Debug, Clone, Args)]
pub struct HttpConfig {
    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}

impl HttpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
