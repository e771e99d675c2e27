//! SurrealDB-backed CounterStore implementation
//!
//! Uses `schema::AgentTallyRow` for persistence, converting to/from
//! [`AgentDocument`] at the boundary. Each save deletes and recreates the
//! agent's row inside one transaction.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{AgentDocument, AgentTallyRow};
use crate::storage_traits::{CounterStore, StorageResult};

pub const DEFAULT_NAMESPACE: &str = "tally";
pub const DEFAULT_DATABASE: &str = "main";

/// SurrealDB-backed implementation of [`CounterStore`].
#[derive(Clone)]
pub struct SurrealCounterStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct AgentIdRow {
    agent_id: String,
}

impl SurrealCounterStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `tally/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        let store = Self::connect("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await?;
        info!("SurrealCounterStore connected (in-memory)");
        Ok(store)
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str, namespace: &str, database: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        debug!(url, namespace, database, "SurrealCounterStore ready");
        Ok(Self { db })
    }
}

#[async_trait]
impl CounterStore for SurrealCounterStore {
    async fn load(&self, agent_id: &str) -> StorageResult<Option<AgentDocument>> {
        let aid_owned = agent_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM agent_tallies WHERE agent_id = $aid")
            .bind(("aid", aid_owned))
            .await?;

        let rows: Vec<AgentTallyRow> = res.take(0)?;

        rows.into_iter()
            .next()
            .map(AgentTallyRow::into_document)
            .transpose()
    }

    async fn save(&self, doc: &AgentDocument) -> StorageResult<()> {
        let row = AgentTallyRow::from_document(doc)?;
        let aid_owned = doc.agent_id.clone();

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE agent_tallies WHERE agent_id = $aid;
                CREATE agent_tallies CONTENT $row;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("aid", aid_owned))
            .bind(("row", row))
            .await?
            .check()?;

        debug!(agent_id = %doc.agent_id, "agent tally row replaced");
        Ok(())
    }

    async fn list_agents(&self) -> StorageResult<Vec<String>> {
        let mut res = self
            .db
            .query("SELECT agent_id FROM agent_tallies ORDER BY agent_id ASC")
            .await?;

        let rows: Vec<AgentIdRow> = res.take(0)?;
        Ok(rows.into_iter().map(|r| r.agent_id).collect())
    }
}
