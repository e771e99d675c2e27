//! Activity recorder: appends typed events and bumps counters in one write.

use std::sync::Arc;

use tracing::Instrument;

use crate::book::{AgentBook, Mutation};
use crate::domain::{ActivityEvent, ActivityKind, AgentId, CounterRecord, LeadId, LeadMetadata};
use crate::error::{Result, TallyError};
use crate::leads::LeadDirectory;
use crate::metrics::METRICS;
use crate::obs;

/// What a record call did.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Event appended and counters updated.
    Recorded(ActivityEvent),
    /// The lead was already assigned to this agent; nothing changed.
    Duplicate,
}

impl RecordOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RecordOutcome::Duplicate)
    }

    pub fn event(&self) -> Option<&ActivityEvent> {
        match self {
            RecordOutcome::Recorded(event) => Some(event),
            RecordOutcome::Duplicate => None,
        }
    }
}

pub struct ActivityRecorder {
    book: Arc<AgentBook>,
    leads: Option<Arc<dyn LeadDirectory>>,
}

impl ActivityRecorder {
    pub(crate) fn new(book: Arc<AgentBook>, leads: Option<Arc<dyn LeadDirectory>>) -> Self {
        Self { book, leads }
    }

    /// Count a lead assignment once per agent and lead.
    ///
    /// A repeat for a lead already in the agent's log is reported as
    /// [`RecordOutcome::Duplicate`] and logged at warn level.
    pub async fn record_lead_assigned(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        metadata: LeadMetadata,
    ) -> Result<RecordOutcome> {
        non_negative("premium", metadata.premium)?;
        self.ensure_lead(lead).await?;

        let high_value = metadata.premium > self.book.config().high_value_premium;
        let kind = ActivityKind::LeadAssigned(metadata);
        let outcome = self
            .book
            .update(agent, |state, now| {
                if state.has_assignment(lead) {
                    return Ok(Mutation::Skip(RecordOutcome::Duplicate));
                }
                bump_lead(&mut state.counters, high_value);
                let event = ActivityEvent::new(lead.clone(), now, kind);
                state.events.push(event.clone());
                Ok(Mutation::Commit(RecordOutcome::Recorded(event)))
            })
            .instrument(obs::agent_span(agent.as_str()))
            .await?;

        self.report(agent, lead, &outcome);
        Ok(outcome)
    }

    pub async fn record_call(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        duration_seconds: u64,
        connected: bool,
        notes: Option<String>,
    ) -> Result<RecordOutcome> {
        self.ensure_lead(lead).await?;
        let kind = ActivityKind::CallMade {
            duration_seconds,
            connected,
            notes: notes.unwrap_or_default(),
        };
        self.append(agent, lead, kind, |c| {
            c.call_count = c.call_count.saturating_add(1);
            if connected {
                c.contact_count = c.contact_count.saturating_add(1);
            }
            c.total_call_duration_seconds =
                c.total_call_duration_seconds.saturating_add(duration_seconds);
        })
        .await
    }

    /// Log a pipeline move. A sale or broker `new_stage` bumps that counter.
    pub async fn record_stage_change(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        old_stage: &str,
        new_stage: &str,
    ) -> Result<RecordOutcome> {
        if new_stage.trim().is_empty() {
            return Err(TallyError::InvalidInput(
                "new stage must not be empty".to_string(),
            ));
        }
        self.ensure_lead(lead).await?;

        let rules = &self.book.config().stages;
        let sale = rules.is_sale(new_stage);
        let broker = rules.is_broker(new_stage);
        let kind = ActivityKind::StageChanged {
            old_stage: old_stage.trim().to_string(),
            new_stage: new_stage.trim().to_string(),
        };
        self.append(agent, lead, kind, |c| {
            if sale {
                c.sale_count = c.sale_count.saturating_add(1);
            }
            if broker {
                c.broker_referral_count = c.broker_referral_count.saturating_add(1);
            }
        })
        .await
    }

    pub async fn record_sale(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        amount: f64,
        commission: f64,
    ) -> Result<RecordOutcome> {
        non_negative("amount", amount)?;
        non_negative("commission", commission)?;
        self.ensure_lead(lead).await?;

        let kind = ActivityKind::SaleCompleted { amount, commission };
        self.append(agent, lead, kind, |c| {
            c.sale_count = c.sale_count.saturating_add(1);
        })
        .await
    }

    async fn append<F>(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        kind: ActivityKind,
        bump: F,
    ) -> Result<RecordOutcome>
    where
        F: FnOnce(&mut CounterRecord),
    {
        let outcome = self
            .book
            .update(agent, |state, now| {
                bump(&mut state.counters);
                let event = ActivityEvent::new(lead.clone(), now, kind);
                state.events.push(event.clone());
                Ok(Mutation::Commit(RecordOutcome::Recorded(event)))
            })
            .instrument(obs::agent_span(agent.as_str()))
            .await?;

        self.report(agent, lead, &outcome);
        Ok(outcome)
    }

    async fn ensure_lead(&self, lead: &LeadId) -> Result<()> {
        let Some(leads) = &self.leads else {
            return Ok(());
        };
        match leads.lookup(lead).await? {
            Some(_) => Ok(()),
            None => Err(TallyError::LeadNotFound {
                lead_id: lead.to_string(),
            }),
        }
    }

    fn report(&self, agent: &AgentId, lead: &LeadId, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Recorded(event) => {
                METRICS.inc_activities_recorded();
                obs::emit_activity_recorded(agent.as_str(), event.kind.as_str(), lead.as_str());
            }
            RecordOutcome::Duplicate => {
                METRICS.inc_duplicates_ignored();
                obs::emit_duplicate_ignored(agent.as_str(), lead.as_str());
            }
        }
    }
}

fn bump_lead(counters: &mut CounterRecord, high_value: bool) {
    counters.lead_count = counters.lead_count.saturating_add(1);
    if high_value {
        counters.high_value_lead_count = counters.high_value_lead_count.saturating_add(1);
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TallyError::InvalidInput(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}
