//! Structured observability hooks for tally lifecycle events.
//!
//! This module provides:
//! - Agent-scoped tracing spans via the `AgentSpan` RAII guard (sync code)
//!   and [`agent_span`] for instrumenting futures
//! - Emission functions for recorded activity, ignored duplicates, resets,
//!   persistence failures and computed reports
//!
//! Events are emitted at `info!` level unless noted. Filter with `RUST_LOG`.

use tracing::{info, warn};

/// RAII guard that enters an agent-scoped span for the duration of a
/// synchronous block.
///
/// # Example
///
/// ```ignore
/// let _span = AgentSpan::enter("Grant");
/// // tracing calls are now associated with agent = "Grant"
/// ```
pub struct AgentSpan {
    _span: tracing::span::EnteredSpan,
}

impl AgentSpan {
    /// Create and enter a span tagged with the agent name.
    pub fn enter(agent: &str) -> Self {
        Self {
            _span: agent_span(agent).entered(),
        }
    }
}

/// Span for one agent; attach to async work with `tracing::Instrument`.
pub fn agent_span(agent: &str) -> tracing::Span {
    tracing::info_span!("tally.agent", agent = %agent)
}

/// Emit event: an activity was appended and counters bumped.
pub fn emit_activity_recorded(agent: &str, kind: &str, lead_id: &str) {
    info!(event = "activity.recorded", agent = %agent, kind = %kind, lead_id = %lead_id);
}

/// Emit event: a repeated lead assignment was ignored (warning level).
pub fn emit_duplicate_ignored(agent: &str, lead_id: &str) {
    warn!(
        event = "activity.duplicate_ignored",
        agent = %agent,
        lead_id = %lead_id,
        "lead already assigned to this agent; not counted again"
    );
}

/// Emit event: one period's reset marker moved.
pub fn emit_period_reset(agent: &str, period: &str) {
    info!(event = "period.reset", agent = %agent, period = %period);
}

/// Emit event: full reset finished, or found nothing to clear.
pub fn emit_agent_reset(agent: &str, cleared: bool) {
    info!(event = "agent.reset", agent = %agent, cleared = cleared);
}

/// Emit event: a store write or read failed or timed out (warning level).
pub fn emit_persist_failed(agent: &str, operation: &str, error: &dyn std::fmt::Display) {
    warn!(event = "persist.failed", agent = %agent, operation = %operation, error = %error);
}

/// Emit event: a period report was computed.
pub fn emit_stats_computed(agent: &str, period: &str, total_leads: u64, total_calls: u64) {
    info!(
        event = "stats.computed",
        agent = %agent,
        period = %period,
        total_leads = total_leads,
        total_calls = total_calls,
    );
}
