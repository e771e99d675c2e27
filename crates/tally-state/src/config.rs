//! Backend selection for the counter store

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::fakes::MemoryCounterStore;
use crate::fs_store::FsCounterStore;
use crate::storage_traits::CounterStore;
use crate::surreal_store::{SurrealCounterStore, DEFAULT_DATABASE, DEFAULT_NAMESPACE};

/// Default data directory for the filesystem store
pub const DEFAULT_DATA_DIR: &str = ".tally/agents";

/// Which backend to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Process-local, nothing survives exit
    Memory,
    /// One JSON document per agent under `root`
    Fs { root: PathBuf },
    /// SurrealDB at `url` (`mem://`, `surrealkv://path`, `ws://host:port`)
    Surreal {
        url: String,
        namespace: String,
        database: String,
    },
}

impl StoreConfig {
    /// SurrealDB config with the default namespace and database
    pub fn surreal(url: impl Into<String>) -> Self {
        StoreConfig::Surreal {
            url: url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_URL (optional) - selects the SurrealDB backend
    /// - SURREALDB_NAMESPACE (optional, default: "tally")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - TALLY_DATA_DIR (optional, default: ".tally/agents") - filesystem backend root
    pub fn from_env() -> Self {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let namespace = std::env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
            let database = std::env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
            return StoreConfig::Surreal {
                url,
                namespace,
                database,
            };
        }

        let root = std::env::var("TALLY_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        StoreConfig::Fs { root: root.into() }
    }

    /// Open the configured backend.
    pub async fn open(&self) -> crate::Result<Arc<dyn CounterStore>> {
        match self {
            StoreConfig::Memory => {
                info!("Using in-memory counter store");
                Ok(Arc::new(MemoryCounterStore::new()))
            }
            StoreConfig::Fs { root } => {
                info!("Using filesystem counter store at {}", root.display());
                Ok(Arc::new(FsCounterStore::new(root)?))
            }
            StoreConfig::Surreal {
                url,
                namespace,
                database,
            } => {
                info!("Using SurrealDB counter store at {}", url);
                Ok(Arc::new(
                    SurrealCounterStore::connect(url, namespace, database).await?,
                ))
            }
        }
    }
}
