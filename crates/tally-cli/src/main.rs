//! Agent Tally CLI
//!
//! The `tally` command records agent activity and reports per-period
//! performance over a filesystem or SurrealDB counter store.
//!
//! ## Commands
//!
//! - `lead`, `call`, `stage`, `sale`: record activity for an agent
//! - `reset-period`: move one period's reset marker to now
//! - `reset-all`: clear an agent's counters, log and markers (needs `--yes`)
//! - `stats`, `summary`: period reports
//! - `agents`: every known agent with lifetime totals

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tally_core::{
    AgentId, AgentSummary, DateRange, LeadId, LeadMetadata, LifetimeStats, Period, PeriodStats,
    RecordOutcome, ReportPeriod, ResetOutcome, Tracker, TrackerConfig, METRICS,
};
use tally_state::StoreConfig;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "tally")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent performance counters with per-period resets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory for the filesystem store
    #[arg(long, global = true, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// SurrealDB URL (mem://, surrealkv://path, ws://host:port); overrides --data-dir
    #[arg(long, global = true, env = "SURREALDB_URL")]
    surreal_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a lead assignment
    Lead {
        agent: String,
        lead_id: String,

        /// Lead or business name
        #[arg(long)]
        name: Option<String>,

        /// Quoted premium
        #[arg(long, default_value_t = 0.0)]
        premium: f64,

        /// Where the lead came from
        #[arg(long)]
        source: Option<String>,

        /// Pipeline stage at assignment time
        #[arg(long)]
        stage: Option<String>,
    },

    /// Record a call
    Call {
        agent: String,
        lead_id: String,

        /// Call length in seconds
        #[arg(long)]
        duration: u64,

        /// The call reached the contact
        #[arg(long)]
        connected: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a pipeline stage change
    Stage {
        agent: String,
        lead_id: String,
        old_stage: String,
        new_stage: String,
    },

    /// Record a completed sale
    Sale {
        agent: String,
        lead_id: String,

        #[arg(long, default_value_t = 0.0)]
        amount: f64,

        #[arg(long, default_value_t = 0.0)]
        commission: f64,
    },

    /// Reset one period (day, week, month, ytd, custom) for an agent
    ResetPeriod {
        agent: String,

        #[arg(value_parser = parse_period)]
        period: Period,
    },

    /// Clear every counter, the activity log and all period markers
    ResetAll {
        agent: String,

        /// Confirm the destructive reset
        #[arg(long)]
        yes: bool,
    },

    /// Report one period
    Stats {
        agent: String,

        #[arg(value_parser = parse_period)]
        period: Period,

        /// Custom period start (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_instant)]
        start: Option<DateTime<Utc>>,

        /// Custom period end, exclusive (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_instant)]
        end: Option<DateTime<Utc>>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Report day, week, month and year to date
    Summary {
        agent: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List known agents with lifetime totals
    Agents {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_period(raw: &str) -> std::result::Result<Period, String> {
    raw.parse().map_err(|e: tally_core::TallyError| e.to_string())
}

/// Accept RFC 3339 timestamps or bare dates (midnight UTC).
fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| format!("expected RFC 3339 timestamp or YYYY-MM-DD, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tally_core::init_tracing(cli.json, level);

    let store_config = store_config(cli.surreal_url, cli.data_dir);
    debug!(?store_config, "opening counter store");
    let store = store_config
        .open()
        .await
        .context("Failed to open counter store")?;
    let config = TrackerConfig::from_env().context("Invalid TALLY_* configuration")?;
    let tracker = Tracker::builder(store).config(config).build();

    let result = run(&tracker, cli.command).await;
    METRICS.flush();
    result
}

fn store_config(surreal_url: Option<String>, data_dir: Option<PathBuf>) -> StoreConfig {
    match (surreal_url, data_dir) {
        (Some(url), _) => StoreConfig::surreal(url),
        (None, Some(root)) => StoreConfig::Fs { root },
        (None, None) => StoreConfig::from_env(),
    }
}

async fn run(tracker: &Tracker, command: Commands) -> Result<()> {
    match command {
        Commands::Lead {
            agent,
            lead_id,
            name,
            premium,
            source,
            stage,
        } => {
            let metadata = LeadMetadata {
                name,
                premium,
                source,
                stage,
            };
            cmd_lead(tracker, &agent, &lead_id, metadata).await
        }
        Commands::Call {
            agent,
            lead_id,
            duration,
            connected,
            notes,
        } => cmd_call(tracker, &agent, &lead_id, duration, connected, notes).await,
        Commands::Stage {
            agent,
            lead_id,
            old_stage,
            new_stage,
        } => cmd_stage(tracker, &agent, &lead_id, &old_stage, &new_stage).await,
        Commands::Sale {
            agent,
            lead_id,
            amount,
            commission,
        } => cmd_sale(tracker, &agent, &lead_id, amount, commission).await,
        Commands::ResetPeriod { agent, period } => cmd_reset_period(tracker, &agent, period).await,
        Commands::ResetAll { agent, yes } => cmd_reset_all(tracker, &agent, yes).await,
        Commands::Stats {
            agent,
            period,
            start,
            end,
            format,
        } => cmd_stats(tracker, &agent, period, start, end, format).await,
        Commands::Summary { agent, format } => cmd_summary(tracker, &agent, format).await,
        Commands::Agents { format } => cmd_agents(tracker, format).await,
    }
}

fn parse_ids(agent: &str, lead_id: &str) -> Result<(AgentId, LeadId)> {
    let agent = AgentId::parse(agent).context("Invalid agent name")?;
    let lead = LeadId::parse(lead_id).context("Invalid lead id")?;
    Ok((agent, lead))
}

fn print_outcome(agent: &AgentId, lead: &LeadId, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Recorded(event) => println!(
            "Recorded {} for {} (lead {}) at {}",
            event.kind.as_str(),
            agent,
            lead,
            event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        RecordOutcome::Duplicate => {
            println!("Lead {lead} is already assigned to {agent}; not counted again")
        }
    }
}

async fn cmd_lead(
    tracker: &Tracker,
    agent: &str,
    lead_id: &str,
    metadata: LeadMetadata,
) -> Result<()> {
    let (agent, lead) = parse_ids(agent, lead_id)?;
    let outcome = tracker
        .record_lead_assigned(&agent, &lead, metadata)
        .await
        .context("Failed to record lead assignment")?;
    print_outcome(&agent, &lead, &outcome);
    Ok(())
}

async fn cmd_call(
    tracker: &Tracker,
    agent: &str,
    lead_id: &str,
    duration: u64,
    connected: bool,
    notes: Option<String>,
) -> Result<()> {
    let (agent, lead) = parse_ids(agent, lead_id)?;
    let outcome = tracker
        .recorder()
        .record_call(&agent, &lead, duration, connected, notes)
        .await
        .context("Failed to record call")?;
    print_outcome(&agent, &lead, &outcome);
    Ok(())
}

async fn cmd_stage(
    tracker: &Tracker,
    agent: &str,
    lead_id: &str,
    old_stage: &str,
    new_stage: &str,
) -> Result<()> {
    let (agent, lead) = parse_ids(agent, lead_id)?;
    let outcome = tracker
        .record_stage_change(&agent, &lead, old_stage, new_stage)
        .await
        .context("Failed to record stage change")?;
    print_outcome(&agent, &lead, &outcome);
    Ok(())
}

async fn cmd_sale(
    tracker: &Tracker,
    agent: &str,
    lead_id: &str,
    amount: f64,
    commission: f64,
) -> Result<()> {
    let (agent, lead) = parse_ids(agent, lead_id)?;
    let outcome = tracker
        .record_sale(&agent, &lead, amount, commission)
        .await
        .context("Failed to record sale")?;
    print_outcome(&agent, &lead, &outcome);
    Ok(())
}

async fn cmd_reset_period(tracker: &Tracker, agent: &str, period: Period) -> Result<()> {
    let agent = AgentId::parse(agent).context("Invalid agent name")?;
    let marker = tracker
        .reset_period(&agent, period)
        .await
        .context(format!("Failed to reset {period} for {agent}"))?;
    println!(
        "Reset {} for {}; activity up to {} no longer counts toward it",
        period,
        agent,
        marker.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

async fn cmd_reset_all(tracker: &Tracker, agent: &str, yes: bool) -> Result<()> {
    let agent = AgentId::parse(agent).context("Invalid agent name")?;
    if !yes {
        bail!("Refusing to clear all counters for {agent} without --yes");
    }
    let outcome = tracker
        .reset_all(&agent)
        .await
        .context(format!("Failed to reset {agent}"))?;
    match outcome {
        ResetOutcome::Reset => println!("Cleared all counters, activity and markers for {agent}"),
        ResetOutcome::AlreadyClear => println!("Nothing to reset for {agent}"),
    }
    Ok(())
}

async fn cmd_stats(
    tracker: &Tracker,
    agent: &str,
    period: Period,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> Result<()> {
    let agent = AgentId::parse(agent).context("Invalid agent name")?;
    let range = match (start, end) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
        (None, None) => None,
        _ => bail!("--start and --end must be given together"),
    };
    let period = ReportPeriod::new(period, range)?;
    let stats = tracker
        .stats(&agent, &period)
        .await
        .context("Failed to compute stats")?;
    emit(format, &stats, render_stats)
}

async fn cmd_summary(tracker: &Tracker, agent: &str, format: OutputFormat) -> Result<()> {
    let agent = AgentId::parse(agent).context("Invalid agent name")?;
    let summary = tracker
        .summary(&agent)
        .await
        .context("Failed to compute summary")?;
    emit(format, &summary, render_summary)
}

async fn cmd_agents(tracker: &Tracker, format: OutputFormat) -> Result<()> {
    let agents = tracker.agents().await.context("Failed to list agents")?;
    emit(format, &agents, |agents| render_agents(agents))
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl Fn(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", text(value)),
    }
    Ok(())
}

fn render_stats(stats: &PeriodStats) -> String {
    format!(
        "{} {} ({} to {})\n\
         \x20 leads             {} (high-value {}, low-value {})\n\
         \x20 calls             {} (connected {}, {} min)\n\
         \x20 sales             {}\n\
         \x20 broker referrals  {}\n\
         \x20 contact rate      {:.1}%\n\
         \x20 conversion rate   {:.1}%\n",
        stats.agent,
        stats.window.period,
        stats.window.start.format("%Y-%m-%d %H:%M"),
        stats.window.end.format("%Y-%m-%d %H:%M"),
        stats.total_leads,
        stats.high_value_leads,
        stats.low_value_leads,
        stats.total_calls,
        stats.connected_calls,
        stats.total_call_duration_minutes,
        stats.sales,
        stats.broker_referrals,
        stats.contact_rate,
        stats.conversion_rate,
    )
}

fn render_summary(summary: &AgentSummary) -> String {
    let mut out = format!(
        "{}\n{:<8} {:>6} {:>6} {:>9} {:>5} {:>6} {:>9} {:>10}\n",
        summary.agent, "period", "leads", "calls", "connected", "min", "sales", "contact%", "convert%"
    );
    for stats in [&summary.day, &summary.week, &summary.month, &summary.ytd] {
        out.push_str(&format!(
            "{:<8} {:>6} {:>6} {:>9} {:>5} {:>6} {:>9.1} {:>10.1}\n",
            stats.window.period.as_str(),
            stats.total_leads,
            stats.total_calls,
            stats.connected_calls,
            stats.total_call_duration_minutes,
            stats.sales,
            stats.contact_rate,
            stats.conversion_rate,
        ));
    }
    out
}

fn render_agents(agents: &[LifetimeStats]) -> String {
    if agents.is_empty() {
        return "No agents recorded yet\n".to_string();
    }
    let mut out = format!(
        "{:<20} {:>6} {:>6} {:>6} {:>9}  {}\n",
        "agent", "leads", "calls", "sales", "contact%", "since"
    );
    for a in agents {
        let since = a
            .since
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<20} {:>6} {:>6} {:>6} {:>9.1}  {}\n",
            a.agent.as_str(),
            a.total_leads,
            a.total_calls,
            a.sales,
            a.contact_rate,
            since
        ));
    }
    out
}
