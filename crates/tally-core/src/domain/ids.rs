//! Agent and lead identifiers.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Sales agent key. Agents are identified by name.
///
/// Surrounding whitespace is trimmed; empty names are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TallyError::InvalidInput(
                "agent name must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AgentId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Lead key as issued by the lead data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(String);

impl LeadId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TallyError::InvalidInput(
                "lead id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LeadId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<u64> for LeadId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_names_are_trimmed() {
        assert_eq!(AgentId::parse("  Grant ").unwrap().as_str(), "Grant");
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(matches!(
            AgentId::parse("   "),
            Err(TallyError::InvalidInput(_))
        ));
        assert!(LeadId::parse("").is_err());
    }

    #[test]
    fn numeric_lead_ids() {
        assert_eq!(LeadId::from(42).as_str(), "42");
        assert_eq!(LeadId::from(42), "42".parse().unwrap());
    }
}
