//! Tally-State: Persistence Layer for Agent Tallies
//!
//! This crate owns everything that touches durable storage for the agent
//! performance counter: the versioned per-agent document, the
//! [`CounterStore`] trait, and its backends.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: whole-document writes (counters, reset markers and activity log
//! change together or not at all) and additive schema migrations.
//!
//! ## Key Components
//!
//! - `AgentDocument`: the persisted layout, keyed by agent id, with a `version` field
//! - `CounterStore`: async, backend-agnostic load/save/list
//! - `MemoryCounterStore`: in-memory fake with failure injection (testing)
//! - `FsCounterStore`: one JSON file per agent, atomic rename on write
//! - `SurrealCounterStore`: SurrealDB table `agent_tallies`

mod config;
mod error;
pub mod fakes;
mod fs_store;
pub mod migrations;
mod schema;
pub mod storage_traits;
mod surreal_store;

pub use config::StoreConfig;
pub use error::{StateError, StorageError};
pub use fs_store::FsCounterStore;
pub use schema::{
    ActivityRow, AgentDocument, CounterRow, PeriodResetRow, CURRENT_SCHEMA_VERSION,
    DEFAULT_HIGH_VALUE_PREMIUM,
};
pub use storage_traits::{CounterStore, StorageResult};
pub use surreal_store::SurrealCounterStore;

/// Result type for tally-state connection and setup operations
pub type Result<T> = std::result::Result<T, StateError>;
