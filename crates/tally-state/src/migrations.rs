//! Schema setup and document migrations
//!
//! Two concerns live here:
//! - `init_schema` prepares the SurrealDB table used by
//!   [`crate::SurrealCounterStore`]
//! - `upgrade_document` lifts a stored JSON document of any supported version
//!   to [`CURRENT_SCHEMA_VERSION`] before it is decoded. Every backend routes
//!   loads through it, so older data keeps loading after additive changes.

use serde_json::{json, Map, Value};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::schema::{CURRENT_SCHEMA_VERSION, DEFAULT_HIGH_VALUE_PREMIUM};
use crate::storage_traits::StorageResult;

/// Initialize the agent tally table in SurrealDB
///
/// Safe to call multiple times (idempotent).
///
/// Schema:
/// ```text
/// TABLE agent_tallies {
///   agent_id:    STRING (unique)
///   version:     INT
///   document:    OBJECT (full AgentDocument)
///   updated_at:  DATETIME (indexed)
/// }
/// ```
pub async fn init_schema(db: &Surreal<Any>) -> crate::Result<()> {
    info!("Initializing agent tally schema");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS agent_tallies SCHEMALESS;

        -- One document per agent
        DEFINE INDEX IF NOT EXISTS idx_agent_id ON TABLE agent_tallies COLUMNS agent_id UNIQUE;

        -- Recently active agents first
        DEFINE INDEX IF NOT EXISTS idx_updated_at ON TABLE agent_tallies COLUMNS updated_at;
    "#;

    db.query(sql)
        .await
        .and_then(|res| res.check())
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

    info!("✓ agent_tallies table initialized");
    Ok(())
}

/// Schema version of a raw stored document; `None` when it is not readable.
pub fn stored_version(value: &Value) -> Option<u32> {
    match value.get("version") {
        None => Some(1),
        Some(v) => v.as_u64().and_then(|v| u32::try_from(v).ok()),
    }
}

/// Upgrade a raw stored document to the current schema version.
///
/// Documents without a `version` field predate versioning and are treated as v1.
pub fn upgrade_document(agent_id: &str, value: Value) -> StorageResult<Value> {
    let Value::Object(mut doc) = value else {
        return Err(corrupt(agent_id, "document is not an object"));
    };

    let version = match doc.get("version") {
        None => 1,
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| corrupt(agent_id, "version is not an integer"))?,
    };

    if version == 0 {
        return Err(corrupt(agent_id, "version 0 is not a valid schema version"));
    }
    if version > CURRENT_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchemaVersion {
            agent_id: agent_id.to_string(),
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if version < 2 {
        debug!(agent_id, from = version, "upgrading agent document to v2");
        upgrade_v1_to_v2(&mut doc);
    }

    doc.entry("agent_id")
        .or_insert_with(|| Value::String(agent_id.to_string()));
    doc.entry("updated_at")
        .or_insert_with(|| json!(chrono::Utc::now()));

    Ok(Value::Object(doc))
}

/// v2 added `contact_count` and `high_value_lead_count`; both are rebuilt from the log.
///
/// High-value leads are counted against [`DEFAULT_HIGH_VALUE_PREMIUM`]. Callers
/// with a different threshold recount using `AgentDocument::upgraded_from`.
fn upgrade_v1_to_v2(doc: &mut Map<String, Value>) {
    let (contacts, high_value) = doc
        .get("activities")
        .and_then(Value::as_array)
        .map(|activities| {
            activities.iter().fold((0u64, 0u64), |(c, h), a| {
                let payload = &a["payload"];
                match a["kind"].as_str() {
                    Some("call_made") if payload["connected"].as_bool() == Some(true) => {
                        (c + 1, h)
                    }
                    Some("lead_assigned")
                        if payload["premium"].as_f64().unwrap_or(0.0)
                            > DEFAULT_HIGH_VALUE_PREMIUM =>
                    {
                        (c, h + 1)
                    }
                    _ => (c, h),
                }
            })
        })
        .unwrap_or((0, 0));

    let counters = doc
        .entry("counters")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(counters) = counters {
        counters
            .entry("contact_count")
            .or_insert_with(|| json!(contacts));
        counters
            .entry("high_value_lead_count")
            .or_insert_with(|| json!(high_value));
    }

    doc.insert("version".to_string(), json!(2));
}

fn corrupt(agent_id: &str, reason: &str) -> StorageError {
    StorageError::CorruptDocument {
        agent_id: agent_id.to_string(),
        reason: reason.to_string(),
    }
}
