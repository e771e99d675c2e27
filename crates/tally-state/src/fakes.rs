//! In-memory fake for the storage trait (testing only)
//!
//! `MemoryCounterStore` satisfies the `CounterStore` contract without any
//! external dependencies, and can be told to fail or stall writes so callers
//! can exercise their rollback and timeout paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::AgentDocument;
use crate::storage_traits::*;

/// In-memory counter store backed by a `BTreeMap<agent_id, document JSON>`.
///
/// Documents are kept as JSON values so loads go through the same migration
/// path as the durable backends.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    docs: Mutex<BTreeMap<String, serde_json::Value>>,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    writes: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a backend error until turned off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every subsequent `save` by `delay` before it takes effect.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock().unwrap() = delay;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed a raw document, bypassing encoding (for migration tests).
    pub fn insert_raw(&self, agent_id: &str, value: serde_json::Value) {
        self.docs
            .lock()
            .unwrap()
            .insert(agent_id.to_string(), value);
    }

    /// Raw stored JSON for an agent.
    pub fn raw(&self, agent_id: &str) -> Option<serde_json::Value> {
        self.docs.lock().unwrap().get(agent_id).cloned()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn load(&self, agent_id: &str) -> StorageResult<Option<AgentDocument>> {
        let raw = self.docs.lock().unwrap().get(agent_id).cloned();
        raw.map(|value| AgentDocument::from_value(agent_id, value))
            .transpose()
    }

    async fn save(&self, doc: &AgentDocument) -> StorageResult<()> {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "injected write failure for agent {}",
                doc.agent_id
            )));
        }
        let value = doc.to_value()?;
        self.docs
            .lock()
            .unwrap()
            .insert(doc.agent_id.clone(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_agents(&self) -> StorageResult<Vec<String>> {
        Ok(self.docs.lock().unwrap().keys().cloned().collect())
    }
}
