//! Agent Tally core
//!
//! Per-agent activity counting with per-period reset semantics:
//! - Activity recorder: typed, deduplicated events plus monotonic counters
//! - Period reset ledger: day/week/month/ytd/custom markers and full reset
//! - Aggregator: pure period reports over the activity log
//! - Assignment sync from lead-list snapshots
//!
//! Layer 1 of the workspace; persistence lives in `tally-state`.

mod book;

pub mod aggregator;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod leads;
pub mod ledger;
pub mod metrics;
pub mod obs;
pub mod recorder;
pub mod sync;
pub mod telemetry;
pub mod tracker;

pub use aggregator::{compute, AgentSummary, Aggregator, LifetimeStats, PeriodStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{normalize_stage, StageRules, TrackerConfig};
pub use domain::{
    ActivityEvent, ActivityKind, AgentId, AgentState, CounterRecord, DateRange, LeadId,
    LeadMetadata, Period, PeriodResetMap, PeriodWindow, ReportPeriod,
};
pub use error::{Result, TallyError};
pub use leads::{InMemoryLeadDirectory, LeadDirectory, LeadRef};
pub use ledger::{PeriodResetLedger, ResetOutcome};
pub use metrics::METRICS;
pub use obs::{
    agent_span, emit_activity_recorded, emit_agent_reset, emit_duplicate_ignored,
    emit_period_reset, emit_persist_failed, emit_stats_computed, AgentSpan,
};
pub use recorder::{ActivityRecorder, RecordOutcome};
pub use sync::{detect_new_assignments, Assignment, AssignmentSync, SyncReport};
pub use telemetry::init_tracing;
pub use tracker::{Tracker, TrackerBuilder};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
