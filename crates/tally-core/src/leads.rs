//! Read-only view of the external lead data source.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AgentId, LeadId, LeadMetadata};
use crate::error::Result;

/// A lead as the data source knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRef {
    pub lead_id: LeadId,
    #[serde(default)]
    pub assigned_to: Option<AgentId>,
    #[serde(default)]
    pub premium: f64,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl LeadRef {
    pub fn new(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            assigned_to: None,
            premium: 0.0,
            stage: None,
            name: None,
            source: None,
        }
    }

    pub fn assigned_to(mut self, agent: AgentId) -> Self {
        self.assigned_to = Some(agent);
        self
    }

    pub fn with_premium(mut self, premium: f64) -> Self {
        self.premium = premium;
        self
    }

    /// Fields recorded on a `lead_assigned` event.
    pub fn metadata(&self) -> LeadMetadata {
        LeadMetadata {
            name: self.name.clone(),
            premium: self.premium,
            source: self.source.clone(),
            stage: self.stage.clone(),
        }
    }
}

/// Lookup of leads by id.
#[async_trait]
pub trait LeadDirectory: Send + Sync {
    /// `None` when the lead does not exist.
    async fn lookup(&self, lead_id: &LeadId) -> Result<Option<LeadRef>>;
}

/// In-memory lead directory.
#[derive(Debug, Default)]
pub struct InMemoryLeadDirectory {
    leads: RwLock<BTreeMap<LeadId, LeadRef>>,
}

impl InMemoryLeadDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_leads(leads: impl IntoIterator<Item = LeadRef>) -> Self {
        let dir = Self::new();
        for lead in leads {
            dir.upsert(lead);
        }
        dir
    }

    pub fn upsert(&self, lead: LeadRef) {
        self.leads
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(lead.lead_id.clone(), lead);
    }

    pub fn remove(&self, lead_id: &LeadId) -> Option<LeadRef> {
        self.leads
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(lead_id)
    }
}

#[async_trait]
impl LeadDirectory for InMemoryLeadDirectory {
    async fn lookup(&self, lead_id: &LeadId) -> Result<Option<LeadRef>> {
        Ok(self
            .leads
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(lead_id)
            .cloned())
    }
}
