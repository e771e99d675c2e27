//! Storage trait definitions for agent tallies
//!
//! `CounterStore` is the only persistence seam. A store holds one
//! [`AgentDocument`] per agent and replaces it wholesale on `save`, which is
//! how the domain layer keeps counters, reset markers and the activity log
//! consistent with each other.
//!
//! All methods are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::AgentDocument;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Durable per-agent document store.
///
/// Guarantees:
/// - `save(doc)` replaces the stored document for `doc.agent_id` atomically:
///   a reader sees either the previous document or the new one, never a mix.
/// - `load(agent_id)` returns `None` for agents never saved, and upgrades
///   older schema versions on the way out.
/// - `list_agents()` returns every saved agent id in ascending order.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Load the document for an agent, if one was ever saved.
    async fn load(&self, agent_id: &str) -> StorageResult<Option<AgentDocument>>;

    /// Replace the stored document for `doc.agent_id`.
    async fn save(&self, doc: &AgentDocument) -> StorageResult<()>;

    /// List agent ids with a stored document.
    async fn list_agents(&self) -> StorageResult<Vec<String>>;
}
