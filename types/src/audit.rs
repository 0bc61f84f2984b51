//! Audit trail events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ActorId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AssetCreated,
    StageTransition,
    DueDiligenceUpdated,
    RoiUpdated,
    BidPlaced,
    DocumentGeneration,
    ValidationEnforced,
    RuleSuggestion,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssetCreated => "asset_created",
            Self::StageTransition => "stage_transition",
            Self::DueDiligenceUpdated => "due_diligence_updated",
            Self::RoiUpdated => "roi_updated",
            Self::BidPlaced => "bid_placed",
            Self::DocumentGeneration => "document_generation",
            Self::ValidationEnforced => "validation_enforced",
            Self::RuleSuggestion => "rule_suggestion",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::AssetCreated,
            Self::StageTransition,
            Self::DueDiligenceUpdated,
            Self::RoiUpdated,
            Self::BidPlaced,
            Self::DocumentGeneration,
            Self::ValidationEnforced,
            Self::RuleSuggestion,
        ]
        .into_iter()
        .find(|action| action.as_str() == value)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Succeeded,
    Refused,
    Failed,
    Noted,
}

impl AuditOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Refused => "refused",
            Self::Failed => "failed",
            Self::Noted => "noted",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(Self::Succeeded),
            "refused" => Some(Self::Refused),
            "failed" => Some(Self::Failed),
            "noted" => Some(Self::Noted),
            _ => None,
        }
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub created_at: String,
}
