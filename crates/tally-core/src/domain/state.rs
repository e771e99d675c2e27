//! In-memory agent state and its mapping to the stored document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_state::{AgentDocument, CounterRow, PeriodResetRow, StorageError, CURRENT_SCHEMA_VERSION};

use super::activity::{ActivityEvent, ActivityKind};
use super::ids::{AgentId, LeadId};
use super::period::Period;

/// Per-agent running totals. Only ever incremented, except by a full reset.
pub type CounterRecord = CounterRow;

/// Per-period reset markers. Activity before a marker is ignored for that period.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodResetMap {
    pub day: Option<DateTime<Utc>>,
    pub week: Option<DateTime<Utc>>,
    pub month: Option<DateTime<Utc>>,
    pub ytd: Option<DateTime<Utc>>,
    pub custom: Option<DateTime<Utc>>,
}

impl PeriodResetMap {
    pub fn get(&self, period: Period) -> Option<DateTime<Utc>> {
        match period {
            Period::Day => self.day,
            Period::Week => self.week,
            Period::Month => self.month,
            Period::Ytd => self.ytd,
            Period::Custom => self.custom,
        }
    }

    pub fn set(&mut self, period: Period, at: DateTime<Utc>) {
        let slot = match period {
            Period::Day => &mut self.day,
            Period::Week => &mut self.week,
            Period::Month => &mut self.month,
            Period::Ytd => &mut self.ytd,
            Period::Custom => &mut self.custom,
        };
        *slot = Some(at);
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_none()
            && self.week.is_none()
            && self.month.is_none()
            && self.ytd.is_none()
            && self.custom.is_none()
    }
}

impl From<PeriodResetRow> for PeriodResetMap {
    fn from(row: PeriodResetRow) -> Self {
        Self {
            day: row.day,
            week: row.week,
            month: row.month,
            ytd: row.ytd,
            custom: row.custom,
        }
    }
}

impl From<&PeriodResetMap> for PeriodResetRow {
    fn from(map: &PeriodResetMap) -> Self {
        Self {
            day: map.day,
            week: map.week,
            month: map.month,
            ytd: map.ytd,
            custom: map.custom,
        }
    }
}

/// Everything tracked for one agent: counters, reset markers and activity log.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentState {
    pub agent: AgentId,
    pub counters: CounterRecord,
    pub resets: PeriodResetMap,
    pub events: Vec<ActivityEvent>,
}

impl AgentState {
    /// Zeroed state for an agent seen for the first time.
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            counters: CounterRecord::default(),
            resets: PeriodResetMap::default(),
            events: Vec::new(),
        }
    }

    pub fn from_document(doc: AgentDocument) -> Result<Self, StorageError> {
        let agent = AgentId::parse(&doc.agent_id).map_err(|e| StorageError::CorruptDocument {
            agent_id: doc.agent_id.clone(),
            reason: e.to_string(),
        })?;
        let events = doc
            .activities
            .into_iter()
            .map(|row| ActivityEvent::from_row(&doc.agent_id, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            agent,
            counters: doc.counters,
            resets: doc.period_resets.into(),
            events,
        })
    }

    pub fn to_document(&self, updated_at: DateTime<Utc>) -> Result<AgentDocument, StorageError> {
        let activities = self
            .events
            .iter()
            .map(ActivityEvent::to_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AgentDocument {
            version: CURRENT_SCHEMA_VERSION,
            agent_id: self.agent.as_str().to_string(),
            counters: self.counters.clone(),
            period_resets: (&self.resets).into(),
            activities,
            updated_at,
            upgraded_from: None,
        })
    }

    /// Rebuild `high_value_lead_count` from the log against `threshold`.
    pub fn recount_high_value(&mut self, threshold: f64) {
        self.counters.high_value_lead_count = self
            .events
            .iter()
            .filter(|e| matches!(&e.kind, ActivityKind::LeadAssigned(m) if m.premium > threshold))
            .count() as u64;
    }

    /// True if `lead` already has a `lead_assigned` entry in the log.
    pub fn has_assignment(&self, lead: &LeadId) -> bool {
        self.events
            .iter()
            .any(|e| &e.lead_id == lead && matches!(e.kind, ActivityKind::LeadAssigned(_)))
    }

    /// Nothing to reset: zero counters, empty log, no markers.
    pub fn is_clear(&self) -> bool {
        self.counters.lead_count == 0
            && self.counters.call_count == 0
            && self.counters.contact_count == 0
            && self.counters.sale_count == 0
            && self.counters.broker_referral_count == 0
            && self.counters.high_value_lead_count == 0
            && self.counters.total_call_duration_seconds == 0
            && self.events.is_empty()
            && self.resets.is_empty()
    }
}
