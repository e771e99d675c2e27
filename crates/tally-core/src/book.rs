//! Per-agent state cache with serialized, rollback-safe persistence.
//!
//! Every write runs under the agent's async lock: clone the cached state,
//! apply the change, persist the whole document under a timeout, and only
//! then swap the clone in. A failed or timed-out write leaves the cache as it
//! was.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tally_state::{CounterStore, StorageError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::domain::{AgentId, AgentState};
use crate::error::{Result, TallyError};
use crate::metrics::METRICS;
use crate::obs;

type Slot = Arc<AsyncMutex<Option<AgentState>>>;

/// Result of a state change: write it, or leave the document untouched.
pub(crate) enum Mutation<T> {
    Commit(T),
    Skip(T),
}

pub(crate) struct AgentBook {
    store: Arc<dyn CounterStore>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<AgentId, Slot>>,
}

impl AgentBook {
    pub fn new(store: Arc<dyn CounterStore>, config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn slot(&self, agent: &AgentId) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(agent.clone()).or_default().clone()
    }

    /// Cached state, filled from the store on first use. Unknown agents start zeroed.
    async fn load_cached(
        &self,
        agent: &AgentId,
        cached: &mut Option<AgentState>,
    ) -> Result<AgentState> {
        if let Some(state) = cached.as_ref() {
            return Ok(state.clone());
        }
        let loaded = self
            .bounded(agent.as_str(), "load", self.store.load(agent.as_str()))
            .await?;
        let state = match loaded {
            Some(doc) => {
                let upgraded_from = doc.upgraded_from;
                let mut state = AgentState::from_document(doc)?;
                if let Some(version) = upgraded_from {
                    debug!(agent = %agent, from = version, "recounting high-value leads");
                    state.recount_high_value(self.config.high_value_premium);
                }
                state
            }
            None => AgentState::new(agent.clone()),
        };
        *cached = Some(state.clone());
        Ok(state)
    }

    /// Apply `change` to a copy of the agent's state and persist it.
    ///
    /// `change` receives the clock reading for this update. Errors returned
    /// by `change` abort without touching the store.
    pub async fn update<T, F>(&self, agent: &AgentId, change: F) -> Result<T>
    where
        F: FnOnce(&mut AgentState, DateTime<Utc>) -> Result<Mutation<T>>,
    {
        let slot = self.slot(agent);
        let mut cached = slot.lock().await;
        let mut next = self.load_cached(agent, &mut cached).await?;

        let now = self.clock.now();
        match change(&mut next, now)? {
            Mutation::Skip(value) => Ok(value),
            Mutation::Commit(value) => {
                let doc = next.to_document(now)?;
                self.bounded(agent.as_str(), "save", self.store.save(&doc))
                    .await?;
                *cached = Some(next);
                Ok(value)
            }
        }
    }

    /// Copy of the agent's current state, taken under the agent lock.
    pub async fn snapshot(&self, agent: &AgentId) -> Result<AgentState> {
        let slot = self.slot(agent);
        let mut cached = slot.lock().await;
        self.load_cached(agent, &mut cached).await
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentId>> {
        let names = self
            .bounded("*", "list_agents", self.store.list_agents())
            .await?;
        names
            .iter()
            .map(|name| {
                AgentId::parse(name).map_err(|e| {
                    TallyError::from(StorageError::CorruptDocument {
                        agent_id: name.clone(),
                        reason: e.to_string(),
                    })
                })
            })
            .collect()
    }

    async fn bounded<T, Fut>(&self, agent: &str, operation: &str, fut: Fut) -> Result<T>
    where
        Fut: std::future::Future<Output = std::result::Result<T, StorageError>>,
    {
        let outcome = match tokio::time::timeout(self.config.persist_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error(operation)),
        };
        outcome.map_err(|e| {
            METRICS.inc_persist_failures();
            obs::emit_persist_failed(agent, operation, &e);
            TallyError::from(e)
        })
    }

    fn timeout_error(&self, operation: &str) -> StorageError {
        StorageError::Timeout {
            operation: operation.to_string(),
            timeout_ms: self.config.persist_timeout.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tally_state::fakes::MemoryCounterStore;

    fn book(store: Arc<MemoryCounterStore>) -> AgentBook {
        AgentBook::new(
            store,
            TrackerConfig::default(),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn unknown_agent_snapshot_is_zeroed_and_not_written() {
        let store = Arc::new(MemoryCounterStore::new());
        let book = book(store.clone());
        let state = book.snapshot(&AgentId::parse("Grant").unwrap()).await.unwrap();
        assert!(state.is_clear());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn skip_does_not_write() {
        let store = Arc::new(MemoryCounterStore::new());
        let book = book(store.clone());
        let agent = AgentId::parse("Grant").unwrap();
        let out = book
            .update(&agent, |_, _| Ok(Mutation::Skip(7)))
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn failed_commit_keeps_cached_state() {
        let store = Arc::new(MemoryCounterStore::new());
        let book = book(store.clone());
        let agent = AgentId::parse("Grant").unwrap();

        book.update(&agent, |s, _| {
            s.counters.lead_count += 1;
            Ok(Mutation::Commit(()))
        })
        .await
        .unwrap();

        store.set_fail_writes(true);
        let err = book
            .update(&agent, |s, _| {
                s.counters.lead_count += 1;
                Ok(Mutation::Commit(()))
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let state = book.snapshot(&agent).await.unwrap();
        assert_eq!(state.counters.lead_count, 1);
    }
}
