//! Persisted layout for agent tallies
//!
//! One [`AgentDocument`] per agent holds the counter record, the period reset
//! markers and the activity log. Keeping them in a single document is what
//! makes "append event + bump counter" and "reset everything" single writes.
//!
//! Layout history:
//! - v1: counters without `contact_count`/`high_value_lead_count`
//! - v2: adds both counters (backfilled from the log on upgrade)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::migrations;
use crate::storage_traits::StorageResult;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Premium above which a lead counts as high value when backfilling old documents.
pub const DEFAULT_HIGH_VALUE_PREMIUM: f64 = 5000.0;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Durable per-agent counters.
///
/// Counts only grow, except when the whole record is reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRow {
    pub lead_count: u64,
    pub call_count: u64,
    /// Calls where the callee answered
    #[serde(default)]
    pub contact_count: u64,
    pub sale_count: u64,
    pub broker_referral_count: u64,
    #[serde(default)]
    pub high_value_lead_count: u64,
    pub total_call_duration_seconds: u64,
    /// When the counters were last zeroed by a full reset
    #[serde(default)]
    pub global_reset_at: Option<DateTime<Utc>>,
}

/// Per-period reset markers. `None` means the period was never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodResetRow {
    #[serde(default)]
    pub day: Option<DateTime<Utc>>,
    #[serde(default)]
    pub week: Option<DateTime<Utc>>,
    #[serde(default)]
    pub month: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ytd: Option<DateTime<Utc>>,
    #[serde(default)]
    pub custom: Option<DateTime<Utc>>,
}

/// A single logged activity.
///
/// `kind` is the snake_case activity type; `payload` carries the
/// kind-specific fields. Typed decoding happens in the domain layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: String,
    pub kind: String,
    pub lead_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Everything persisted for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDocument {
    pub version: u32,
    pub agent_id: String,
    #[serde(default)]
    pub counters: CounterRow,
    #[serde(default)]
    pub period_resets: PeriodResetRow,
    #[serde(default)]
    pub activities: Vec<ActivityRow>,
    pub updated_at: DateTime<Utc>,
    /// Stored version this document was migrated from when loaded; never persisted.
    #[serde(skip)]
    pub upgraded_from: Option<u32>,
}

impl AgentDocument {
    /// Fresh, zeroed document at the current schema version.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION,
            agent_id: agent_id.into(),
            counters: CounterRow::default(),
            period_resets: PeriodResetRow::default(),
            activities: Vec::new(),
            updated_at: Utc::now(),
            upgraded_from: None,
        }
    }

    /// Decode a stored document of any supported version, upgrading it in place.
    ///
    /// A migrated document reports its stored version in `upgraded_from`.
    pub fn from_value(agent_id: &str, value: serde_json::Value) -> StorageResult<Self> {
        let stored_version = migrations::stored_version(&value);
        let upgraded = migrations::upgrade_document(agent_id, value)?;
        let mut doc: Self =
            serde_json::from_value(upgraded).map_err(|e| StorageError::CorruptDocument {
                agent_id: agent_id.to_string(),
                reason: e.to_string(),
            })?;
        doc.upgraded_from = stored_version.filter(|v| *v < CURRENT_SCHEMA_VERSION);
        Ok(doc)
    }

    /// Encode for storage.
    pub fn to_value(&self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Row shape in the SurrealDB `agent_tallies` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AgentTallyRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub agent_id: String,
    pub version: u32,
    /// The full [`AgentDocument`] as JSON
    pub document: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl AgentTallyRow {
    pub fn from_document(doc: &AgentDocument) -> StorageResult<Self> {
        Ok(Self {
            id: None,
            agent_id: doc.agent_id.clone(),
            version: doc.version,
            document: doc.to_value()?,
            updated_at: doc.updated_at,
        })
    }

    pub fn into_document(self) -> StorageResult<AgentDocument> {
        AgentDocument::from_value(&self.agent_id, self.document)
    }
}
