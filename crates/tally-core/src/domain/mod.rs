//! Domain types for agent tallies.

pub mod activity;
pub mod ids;
pub mod period;
pub mod state;

pub use activity::{ActivityEvent, ActivityKind, LeadMetadata};
pub use ids::{AgentId, LeadId};
pub use period::{DateRange, Period, PeriodWindow, ReportPeriod};
pub use state::{AgentState, CounterRecord, PeriodResetMap};
