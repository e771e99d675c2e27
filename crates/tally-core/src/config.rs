//! Tracker configuration: thresholds, stage classification, timeouts, local offset.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tally_state::DEFAULT_HIGH_VALUE_PREMIUM;

use crate::error::{Result, TallyError};

/// Default bound on a single persistence call.
pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Premiums below this count as low-value leads.
pub const DEFAULT_LOW_VALUE_PREMIUM: f64 = 1000.0;

pub const DEFAULT_SALE_STAGES: &[&str] = &["closed_won", "sale", "sold"];
pub const DEFAULT_BROKER_STAGES: &[&str] = &["sent_to_broker", "broker", "app_sent_broker"];

/// Canonical stage key: trimmed, lowercase, spaces and hyphens as underscores.
pub fn normalize_stage(stage: &str) -> String {
    stage
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Which pipeline stages count as a sale or a broker referral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRules {
    sale: Vec<String>,
    broker: Vec<String>,
}

impl StageRules {
    pub fn new<S: AsRef<str>>(sale: &[S], broker: &[S]) -> Self {
        Self {
            sale: sale.iter().map(|s| normalize_stage(s.as_ref())).collect(),
            broker: broker.iter().map(|s| normalize_stage(s.as_ref())).collect(),
        }
    }

    pub fn is_sale(&self, stage: &str) -> bool {
        self.sale.contains(&normalize_stage(stage))
    }

    pub fn is_broker(&self, stage: &str) -> bool {
        self.broker.contains(&normalize_stage(stage))
    }
}

impl Default for StageRules {
    fn default() -> Self {
        Self::new(DEFAULT_SALE_STAGES, DEFAULT_BROKER_STAGES)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub persist_timeout: Duration,
    pub high_value_premium: f64,
    pub low_value_premium: f64,
    pub stages: StageRules,
    /// Offset used for day, month and year boundaries.
    pub utc_offset: FixedOffset,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
            high_value_premium: DEFAULT_HIGH_VALUE_PREMIUM,
            low_value_premium: DEFAULT_LOW_VALUE_PREMIUM,
            stages: StageRules::default(),
            utc_offset: Utc.fix(),
        }
    }
}

impl TrackerConfig {
    /// Create from environment variables
    ///
    /// Reads (all optional):
    /// - TALLY_PERSIST_TIMEOUT_MS (default: 5000)
    /// - TALLY_HIGH_VALUE_PREMIUM (default: 5000)
    /// - TALLY_LOW_VALUE_PREMIUM (default: 1000)
    /// - TALLY_SALE_STAGES (comma-separated, default: closed_won,sale,sold)
    /// - TALLY_BROKER_STAGES (comma-separated, default: sent_to_broker,broker,app_sent_broker)
    /// - TALLY_UTC_OFFSET_MINUTES (default: 0)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrackerConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("TALLY_PERSIST_TIMEOUT_MS") {
            let ms: u64 = parse_var("TALLY_PERSIST_TIMEOUT_MS", &raw)?;
            if ms == 0 {
                return Err(TallyError::InvalidInput(
                    "TALLY_PERSIST_TIMEOUT_MS must be greater than zero".to_string(),
                ));
            }
            config.persist_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("TALLY_HIGH_VALUE_PREMIUM") {
            config.high_value_premium = parse_var("TALLY_HIGH_VALUE_PREMIUM", &raw)?;
        }
        if let Some(raw) = lookup("TALLY_LOW_VALUE_PREMIUM") {
            config.low_value_premium = parse_var("TALLY_LOW_VALUE_PREMIUM", &raw)?;
        }

        let sale = lookup("TALLY_SALE_STAGES").map(|raw| split_list(&raw));
        let broker = lookup("TALLY_BROKER_STAGES").map(|raw| split_list(&raw));
        if sale.is_some() || broker.is_some() {
            let default_list = |d: &[&str]| d.iter().map(|s| s.to_string()).collect::<Vec<_>>();
            let sale = sale.unwrap_or_else(|| default_list(DEFAULT_SALE_STAGES));
            let broker = broker.unwrap_or_else(|| default_list(DEFAULT_BROKER_STAGES));
            config.stages = StageRules::new(sale.as_slice(), broker.as_slice());
        }

        if let Some(raw) = lookup("TALLY_UTC_OFFSET_MINUTES") {
            let minutes: i32 = parse_var("TALLY_UTC_OFFSET_MINUTES", &raw)?;
            config.utc_offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| {
                    TallyError::InvalidInput(format!(
                        "TALLY_UTC_OFFSET_MINUTES out of range: {minutes}"
                    ))
                })?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| TallyError::InvalidInput(format!("{key}={raw}: {e}")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn stage_matching_is_normalized() {
        let rules = StageRules::default();
        assert!(rules.is_sale("Closed Won"));
        assert!(rules.is_sale("closed-won"));
        assert!(rules.is_broker("Sent To Broker"));
        assert!(!rules.is_sale("quoted"));
    }

    #[test]
    fn classification_ignores_the_old_stage() {
        let rules = StageRules::default();
        assert!(rules.is_sale("closed_won"));
        assert!(rules.is_broker("app_sent_broker"));
        assert!(!rules.is_broker("sold"));
    }

    #[test]
    fn defaults_without_env() {
        let config = TrackerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.persist_timeout, Duration::from_secs(5));
        assert_eq!(config.high_value_premium, 5000.0);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn env_overrides() {
        let config = TrackerConfig::from_lookup(lookup(&[
            ("TALLY_PERSIST_TIMEOUT_MS", "250"),
            ("TALLY_HIGH_VALUE_PREMIUM", "7500"),
            ("TALLY_SALE_STAGES", "bound, issued"),
            ("TALLY_UTC_OFFSET_MINUTES", "-300"),
        ]))
        .unwrap();
        assert_eq!(config.persist_timeout, Duration::from_millis(250));
        assert_eq!(config.high_value_premium, 7500.0);
        assert!(config.stages.is_sale("Issued"));
        assert!(!config.stages.is_sale("sold"));
        assert!(config.stages.is_broker("broker"));
        assert_eq!(config.utc_offset.local_minus_utc(), -300 * 60);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = TrackerConfig::from_lookup(lookup(&[("TALLY_PERSIST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, TallyError::InvalidInput(_)));

        assert!(TrackerConfig::from_lookup(lookup(&[("TALLY_UTC_OFFSET_MINUTES", "5000")])).is_err());
        assert!(TrackerConfig::from_lookup(lookup(&[("TALLY_PERSIST_TIMEOUT_MS", "0")])).is_err());
    }
}
