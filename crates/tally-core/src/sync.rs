//! Assignment sync: turns lead-list changes into recorded assignments.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{AgentId, LeadId};
use crate::error::Result;
use crate::leads::LeadRef;
use crate::recorder::{ActivityRecorder, RecordOutcome};

/// A lead that gained its first assignee between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub agent: AgentId,
    pub lead: LeadRef,
}

/// Compare two snapshots of the lead list.
///
/// A lead counts when it is new and already assigned, or when it had no
/// assignee before and has one now. Moving a lead between agents is not a
/// new assignment. Output follows the order of `current`.
pub fn detect_new_assignments(previous: &[LeadRef], current: &[LeadRef]) -> Vec<Assignment> {
    let before: HashMap<&LeadId, Option<&AgentId>> = previous
        .iter()
        .map(|lead| (&lead.lead_id, lead.assigned_to.as_ref()))
        .collect();

    current
        .iter()
        .filter_map(|lead| {
            let agent = lead.assigned_to.as_ref()?;
            match before.get(&lead.lead_id) {
                Some(Some(_)) => None,
                Some(None) | None => Some(Assignment {
                    agent: agent.clone(),
                    lead: lead.clone(),
                }),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub recorded: usize,
    pub duplicates: usize,
}

/// Records detected assignments through the recorder.
pub struct AssignmentSync<'a> {
    recorder: &'a ActivityRecorder,
}

impl<'a> AssignmentSync<'a> {
    pub fn new(recorder: &'a ActivityRecorder) -> Self {
        Self { recorder }
    }

    /// Record each assignment in order. Stops at the first error; assignments
    /// recorded before it stay recorded.
    pub async fn apply(&self, changes: &[Assignment]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for change in changes {
            let outcome = self
                .recorder
                .record_lead_assigned(&change.agent, &change.lead.lead_id, change.lead.metadata())
                .await?;
            match outcome {
                RecordOutcome::Recorded(_) => report.recorded += 1,
                RecordOutcome::Duplicate => {
                    debug!(lead_id = %change.lead.lead_id, agent = %change.agent, "assignment already counted");
                    report.duplicates += 1;
                }
            }
        }
        info!(
            event = "sync.applied",
            recorded = report.recorded,
            duplicates = report.duplicates
        );
        Ok(report)
    }
}
