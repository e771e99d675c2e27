//! Typed activity events and their storage mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_state::{ActivityRow, StorageError};
use uuid::Uuid;

use super::ids::LeadId;

/// Metadata captured when a lead is assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub premium: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

/// What happened, with the fields that belong to that kind of activity.
///
/// Serialized with a `type` tag; the tag doubles as the stored activity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    LeadAssigned(LeadMetadata),
    CallMade {
        duration_seconds: u64,
        connected: bool,
        #[serde(default)]
        notes: String,
    },
    StageChanged {
        old_stage: String,
        new_stage: String,
    },
    SaleCompleted {
        #[serde(default)]
        amount: f64,
        #[serde(default)]
        commission: f64,
    },
}

impl ActivityKind {
    /// Stored kind string (`lead_assigned`, `call_made`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::LeadAssigned(_) => "lead_assigned",
            ActivityKind::CallMade { .. } => "call_made",
            ActivityKind::StageChanged { .. } => "stage_changed",
            ActivityKind::SaleCompleted { .. } => "sale_completed",
        }
    }
}

/// One logged activity. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub lead_id: LeadId,
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn new(lead_id: LeadId, timestamp: DateTime<Utc>, kind: ActivityKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            timestamp,
            kind,
        }
    }

    /// Flatten into the stored row: the serde tag becomes `kind`, the rest `payload`.
    pub fn to_row(&self) -> Result<ActivityRow, StorageError> {
        let mut payload = serde_json::to_value(&self.kind)?;
        if let Some(obj) = payload.as_object_mut() {
            obj.remove("type");
        }
        Ok(ActivityRow {
            id: self.id.to_string(),
            kind: self.kind.as_str().to_string(),
            lead_id: self.lead_id.as_str().to_string(),
            timestamp: self.timestamp,
            payload,
        })
    }

    /// Rebuild a typed event from a stored row.
    pub fn from_row(agent_id: &str, row: ActivityRow) -> Result<Self, StorageError> {
        let corrupt = |reason: String| StorageError::CorruptDocument {
            agent_id: agent_id.to_string(),
            reason,
        };

        let mut payload = match row.payload {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => return Err(corrupt(format!("activity {} payload is {other}", row.id))),
        };
        payload.insert("type".to_string(), serde_json::Value::String(row.kind));

        let kind: ActivityKind = serde_json::from_value(serde_json::Value::Object(payload))
            .map_err(|e| corrupt(format!("activity {}: {e}", row.id)))?;
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| corrupt(format!("activity id {}: {e}", row.id)))?;
        let lead_id = LeadId::parse(&row.lead_id)
            .map_err(|e| corrupt(format!("activity {}: {e}", row.id)))?;

        Ok(Self {
            id,
            lead_id,
            timestamp: row.timestamp,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_keeps_kind_out_of_payload() {
        let event = ActivityEvent::new(
            LeadId::from(7),
            Utc::now(),
            ActivityKind::CallMade {
                duration_seconds: 90,
                connected: true,
                notes: String::new(),
            },
        );
        let row = event.to_row().unwrap();
        assert_eq!(row.kind, "call_made");
        assert_eq!(row.payload["duration_seconds"], json!(90));
        assert!(row.payload.get("type").is_none());

        let back = ActivityEvent::from_row("Grant", row).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn lead_metadata_sits_beside_the_tag() {
        let event = ActivityEvent::new(
            LeadId::from(42),
            Utc::now(),
            ActivityKind::LeadAssigned(LeadMetadata {
                name: Some("Acme Freight".to_string()),
                premium: 6500.0,
                source: Some("referral".to_string()),
                stage: Some("new".to_string()),
            }),
        );
        let row = event.to_row().unwrap();
        assert_eq!(row.payload["premium"], json!(6500.0));
        assert_eq!(row.payload["name"], json!("Acme Freight"));
    }

    #[test]
    fn unknown_kind_is_corrupt() {
        let row = ActivityRow {
            id: Uuid::new_v4().to_string(),
            kind: "email_sent".to_string(),
            lead_id: "1".to_string(),
            timestamp: Utc::now(),
            payload: json!({}),
        };
        let err = ActivityEvent::from_row("Grant", row).unwrap_err();
        assert!(matches!(err, StorageError::CorruptDocument { .. }));
    }

    #[test]
    fn legacy_lead_payload_without_optional_fields_decodes() {
        let row = ActivityRow {
            id: Uuid::new_v4().to_string(),
            kind: "lead_assigned".to_string(),
            lead_id: "9".to_string(),
            timestamp: Utc::now(),
            payload: json!({"premium": 800.0}),
        };
        let event = ActivityEvent::from_row("Carson", row).unwrap();
        match event.kind {
            ActivityKind::LeadAssigned(lead) => {
                assert_eq!(lead.premium, 800.0);
                assert!(lead.name.is_none());
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
