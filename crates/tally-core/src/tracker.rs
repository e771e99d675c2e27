//! Entry point wiring the recorder, reset ledger and aggregator to one store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_state::CounterStore;

use crate::aggregator::{Aggregator, AgentSummary, LifetimeStats, PeriodStats};
use crate::book::AgentBook;
use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::domain::{AgentId, LeadId, LeadMetadata, Period, PeriodResetMap, ReportPeriod};
use crate::error::Result;
use crate::leads::{LeadDirectory, LeadRef};
use crate::ledger::{PeriodResetLedger, ResetOutcome};
use crate::recorder::{ActivityRecorder, RecordOutcome};
use crate::sync::{detect_new_assignments, AssignmentSync, SyncReport};

/// Agent performance tracker over a single counter store.
///
/// All components share one per-agent cache, so a process should hold one
/// `Tracker` per store.
pub struct Tracker {
    book: Arc<AgentBook>,
    recorder: ActivityRecorder,
    ledger: PeriodResetLedger,
    aggregator: Aggregator,
}

pub struct TrackerBuilder {
    store: Arc<dyn CounterStore>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    leads: Option<Arc<dyn LeadDirectory>>,
}

impl TrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check every recorded lead against `leads`; unknown leads are rejected.
    pub fn lead_directory(mut self, leads: Arc<dyn LeadDirectory>) -> Self {
        self.leads = Some(leads);
        self
    }

    pub fn build(self) -> Tracker {
        let book = Arc::new(AgentBook::new(self.store, self.config, self.clock));
        Tracker {
            recorder: ActivityRecorder::new(book.clone(), self.leads),
            ledger: PeriodResetLedger::new(book.clone()),
            aggregator: Aggregator::new(book.clone()),
            book,
        }
    }
}

impl Tracker {
    /// Tracker with default config and the system clock.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: Arc<dyn CounterStore>) -> TrackerBuilder {
        TrackerBuilder {
            store,
            config: TrackerConfig::default(),
            clock: Arc::new(SystemClock),
            leads: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        self.book.config()
    }

    pub fn recorder(&self) -> &ActivityRecorder {
        &self.recorder
    }

    pub fn ledger(&self) -> &PeriodResetLedger {
        &self.ledger
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn record_lead_assigned(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        metadata: LeadMetadata,
    ) -> Result<RecordOutcome> {
        self.recorder
            .record_lead_assigned(agent, lead, metadata)
            .await
    }

    pub async fn record_call(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        duration_seconds: u64,
        connected: bool,
    ) -> Result<RecordOutcome> {
        self.recorder
            .record_call(agent, lead, duration_seconds, connected, None)
            .await
    }

    pub async fn record_stage_change(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        old_stage: &str,
        new_stage: &str,
    ) -> Result<RecordOutcome> {
        self.recorder
            .record_stage_change(agent, lead, old_stage, new_stage)
            .await
    }

    pub async fn record_sale(
        &self,
        agent: &AgentId,
        lead: &LeadId,
        amount: f64,
        commission: f64,
    ) -> Result<RecordOutcome> {
        self.recorder
            .record_sale(agent, lead, amount, commission)
            .await
    }

    pub async fn reset_period(&self, agent: &AgentId, period: Period) -> Result<DateTime<Utc>> {
        self.ledger.reset_period(agent, period).await
    }

    pub async fn reset_all(&self, agent: &AgentId) -> Result<ResetOutcome> {
        self.ledger.reset_all(agent).await
    }

    pub async fn markers(&self, agent: &AgentId) -> Result<PeriodResetMap> {
        self.ledger.markers(agent).await
    }

    pub async fn stats(&self, agent: &AgentId, period: &ReportPeriod) -> Result<PeriodStats> {
        self.aggregator.stats(agent, period).await
    }

    pub async fn summary(&self, agent: &AgentId) -> Result<AgentSummary> {
        self.aggregator.summary(agent).await
    }

    pub async fn lifetime(&self, agent: &AgentId) -> Result<LifetimeStats> {
        self.aggregator.lifetime(agent).await
    }

    /// Every agent in the store, with lifetime totals, ordered by name.
    pub async fn agents(&self) -> Result<Vec<LifetimeStats>> {
        let agents = self.book.list_agents().await?;
        futures::future::try_join_all(agents.iter().map(|agent| self.lifetime(agent))).await
    }

    /// Record assignments that appeared between two lead-list snapshots.
    pub async fn sync_assignments(
        &self,
        previous: &[LeadRef],
        current: &[LeadRef],
    ) -> Result<SyncReport> {
        let changes = detect_new_assignments(previous, current);
        AssignmentSync::new(&self.recorder).apply(&changes).await
    }
}
