//! Period statistics computed from the activity log and reset markers.
//!
//! [`compute`] is pure: same log, markers, period and `now` always give the
//! same report. [`Aggregator`] only snapshots an agent and calls it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::book::AgentBook;
use crate::config::TrackerConfig;
use crate::domain::{
    ActivityEvent, ActivityKind, AgentId, CounterRecord, Period, PeriodResetMap, PeriodWindow,
    ReportPeriod,
};
use crate::error::Result;
use crate::metrics::METRICS;
use crate::obs::{self, AgentSpan};

/// Report for one agent and one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub agent: AgentId,
    pub window: PeriodWindow,
    pub total_leads: u64,
    pub total_calls: u64,
    pub connected_calls: u64,
    pub total_call_duration_minutes: u64,
    pub sales: u64,
    pub broker_referrals: u64,
    pub high_value_leads: u64,
    pub low_value_leads: u64,
    /// Connected calls as a percentage of calls.
    pub contact_rate: f64,
    /// Sales as a percentage of leads.
    pub conversion_rate: f64,
}

/// Day, week, month and year-to-date reports taken at the same instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent: AgentId,
    pub day: PeriodStats,
    pub week: PeriodStats,
    pub month: PeriodStats,
    pub ytd: PeriodStats,
}

/// Totals from the counter record since the last full reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeStats {
    pub agent: AgentId,
    pub since: Option<DateTime<Utc>>,
    pub total_leads: u64,
    pub total_calls: u64,
    pub connected_calls: u64,
    pub total_call_duration_minutes: u64,
    pub sales: u64,
    pub broker_referrals: u64,
    pub high_value_leads: u64,
    pub contact_rate: f64,
    pub conversion_rate: f64,
}

impl LifetimeStats {
    pub fn from_counters(agent: AgentId, counters: &CounterRecord) -> Self {
        Self {
            agent,
            since: counters.global_reset_at,
            total_leads: counters.lead_count,
            total_calls: counters.call_count,
            connected_calls: counters.contact_count,
            total_call_duration_minutes: seconds_to_minutes(counters.total_call_duration_seconds),
            sales: counters.sale_count,
            broker_referrals: counters.broker_referral_count,
            high_value_leads: counters.high_value_lead_count,
            contact_rate: percentage(counters.contact_count, counters.call_count),
            conversion_rate: percentage(counters.sale_count, counters.lead_count),
        }
    }
}

/// Round to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole` as a percentage in `[0, 100]`, one decimal; 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    round1(pct.clamp(0.0, 100.0))
}

pub fn seconds_to_minutes(seconds: u64) -> u64 {
    (seconds as f64 / 60.0).round() as u64
}

/// Reduce `events` to a report for `period` as of `now`.
pub fn compute(
    agent: &AgentId,
    events: &[ActivityEvent],
    resets: &PeriodResetMap,
    period: &ReportPeriod,
    now: DateTime<Utc>,
    config: &TrackerConfig,
) -> PeriodStats {
    let window = PeriodWindow::resolve(period, now, config.utc_offset)
        .clamp_start(resets.get(period.period()));

    let mut stats = PeriodStats {
        agent: agent.clone(),
        window,
        total_leads: 0,
        total_calls: 0,
        connected_calls: 0,
        total_call_duration_minutes: 0,
        sales: 0,
        broker_referrals: 0,
        high_value_leads: 0,
        low_value_leads: 0,
        contact_rate: 0.0,
        conversion_rate: 0.0,
    };
    let mut call_seconds: u64 = 0;

    for event in events.iter().filter(|e| window.contains(e.timestamp)) {
        match &event.kind {
            ActivityKind::LeadAssigned(lead) => {
                stats.total_leads += 1;
                if lead.premium > config.high_value_premium {
                    stats.high_value_leads += 1;
                } else if lead.premium < config.low_value_premium {
                    stats.low_value_leads += 1;
                }
            }
            ActivityKind::CallMade {
                duration_seconds,
                connected,
                ..
            } => {
                stats.total_calls += 1;
                if *connected {
                    stats.connected_calls += 1;
                }
                call_seconds = call_seconds.saturating_add(*duration_seconds);
            }
            ActivityKind::StageChanged { new_stage, .. } => {
                if config.stages.is_sale(new_stage) {
                    stats.sales += 1;
                }
                if config.stages.is_broker(new_stage) {
                    stats.broker_referrals += 1;
                }
            }
            ActivityKind::SaleCompleted { .. } => stats.sales += 1,
        }
    }

    stats.total_call_duration_minutes = seconds_to_minutes(call_seconds);
    stats.contact_rate = percentage(stats.connected_calls, stats.total_calls);
    stats.conversion_rate = percentage(stats.sales, stats.total_leads);
    stats
}

/// Read side: snapshots an agent and reports on it. Never writes.
pub struct Aggregator {
    book: Arc<AgentBook>,
}

impl Aggregator {
    pub(crate) fn new(book: Arc<AgentBook>) -> Self {
        Self { book }
    }

    pub async fn stats(&self, agent: &AgentId, period: &ReportPeriod) -> Result<PeriodStats> {
        let state = self.book.snapshot(agent).await?;
        let now = self.book.now();

        let _span = AgentSpan::enter(agent.as_str());
        let stats = compute(
            agent,
            &state.events,
            &state.resets,
            period,
            now,
            self.book.config(),
        );
        report(&stats);
        Ok(stats)
    }

    pub async fn summary(&self, agent: &AgentId) -> Result<AgentSummary> {
        let state = self.book.snapshot(agent).await?;
        let now = self.book.now();

        let _span = AgentSpan::enter(agent.as_str());
        let at = |period: ReportPeriod| {
            let stats = compute(
                agent,
                &state.events,
                &state.resets,
                &period,
                now,
                self.book.config(),
            );
            report(&stats);
            stats
        };
        Ok(AgentSummary {
            agent: agent.clone(),
            day: at(ReportPeriod::Day),
            week: at(ReportPeriod::Week),
            month: at(ReportPeriod::Month),
            ytd: at(ReportPeriod::Ytd),
        })
    }

    pub async fn lifetime(&self, agent: &AgentId) -> Result<LifetimeStats> {
        let state = self.book.snapshot(agent).await?;
        Ok(LifetimeStats::from_counters(agent.clone(), &state.counters))
    }
}

fn report(stats: &PeriodStats) {
    METRICS.inc_stats_computed();
    obs::emit_stats_computed(
        stats.agent.as_str(),
        stats.window.period.as_str(),
        stats.total_leads,
        stats.total_calls,
    );
}

impl PeriodStats {
    pub fn period(&self) -> Period {
        self.window.period
    }
}
