//! Period reset ledger: per-period markers and the full agent reset.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::book::{AgentBook, Mutation};
use crate::domain::{AgentId, CounterRecord, Period, PeriodResetMap};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs;

/// What a full reset did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetOutcome {
    /// Counters, log and markers were cleared.
    Reset,
    /// Nothing to clear; no write was made.
    AlreadyClear,
}

pub struct PeriodResetLedger {
    book: Arc<AgentBook>,
}

impl PeriodResetLedger {
    pub(crate) fn new(book: Arc<AgentBook>) -> Self {
        Self { book }
    }

    /// Move `period`'s marker to now. Counters and other periods are untouched.
    pub async fn reset_period(&self, agent: &AgentId, period: Period) -> Result<DateTime<Utc>> {
        let marker = self
            .book
            .update(agent, |state, now| {
                state.resets.set(period, now);
                Ok(Mutation::Commit(now))
            })
            .instrument(obs::agent_span(agent.as_str()))
            .await?;

        METRICS.inc_resets();
        obs::emit_period_reset(agent.as_str(), period.as_str());
        Ok(marker)
    }

    /// Zero counters, clear the log and all markers, stamp the global reset.
    ///
    /// Destructive. Callers are expected to have confirmed with the operator.
    pub async fn reset_all(&self, agent: &AgentId) -> Result<ResetOutcome> {
        let outcome = self
            .book
            .update(agent, |state, now| {
                if state.is_clear() {
                    return Ok(Mutation::Skip(ResetOutcome::AlreadyClear));
                }
                state.counters = CounterRecord {
                    global_reset_at: Some(now),
                    ..CounterRecord::default()
                };
                state.events.clear();
                state.resets = PeriodResetMap::default();
                Ok(Mutation::Commit(ResetOutcome::Reset))
            })
            .instrument(obs::agent_span(agent.as_str()))
            .await?;

        if outcome == ResetOutcome::Reset {
            METRICS.inc_resets();
        }
        obs::emit_agent_reset(agent.as_str(), outcome == ResetOutcome::Reset);
        Ok(outcome)
    }

    pub async fn markers(&self, agent: &AgentId) -> Result<PeriodResetMap> {
        Ok(self.book.snapshot(agent).await?.resets)
    }
}
