//! Auction assets and bids.

use serde::{Deserialize, Serialize};

use crate::due_diligence::{DueDiligenceChecklist, RiskAssessment, RiskLevel, RiskScore};
use crate::input::{InputError, non_blank, positive};
use crate::stage::Stage;
use crate::{AssetId, BidId, DocumentId, TenantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionAsset {
    pub id: AssetId,
    pub tenant_id: TenantId,
    pub reference: Option<String>,
    pub title: String,
    pub current_stage: Stage,
    pub due_diligence_checklist: DueDiligenceChecklist,
    pub risk_score: RiskScore,
    pub linked_document_ids: Vec<DocumentId>,
    pub created_at: String,
    pub updated_at: String,
}

impl AuctionAsset {
    /// A fresh asset: stage `F0`, every checklist item pending, unscored.
    #[must_use]
    pub fn new(id: AssetId, tenant_id: TenantId, draft: NewAsset, now: &str) -> Self {
        Self {
            id,
            tenant_id,
            reference: draft.reference,
            title: draft.title.trim().to_owned(),
            current_stage: Stage::INITIAL,
            due_diligence_checklist: DueDiligenceChecklist::default(),
            risk_score: RiskScore::ZERO,
            linked_document_ids: draft.linked_document_ids,
            created_at: now.to_owned(),
            updated_at: now.to_owned(),
        }
    }

    #[must_use]
    pub fn risk_assessment(&self) -> RiskAssessment {
        RiskAssessment::from(self.risk_score)
    }

    /// Replace the checklist and recompute the score from it.
    pub fn apply_checklist(&mut self, checklist: DueDiligenceChecklist) {
        self.risk_score = checklist.risk_score();
        self.due_diligence_checklist = checklist;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewAsset {
    pub title: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub linked_document_ids: Vec<DocumentId>,
}

impl NewAsset {
    pub fn validate(&self) -> Result<(), InputError> {
        non_blank("title", &self.title)
    }
}

/// An asset together with its derived risk fields, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetView {
    #[serde(flatten)]
    pub asset: AuctionAsset,
    pub risk_level: RiskLevel,
    pub bidding_disabled: bool,
}

impl From<AuctionAsset> for AssetView {
    fn from(asset: AuctionAsset) -> Self {
        let RiskAssessment {
            risk_level,
            bidding_disabled,
            ..
        } = asset.risk_assessment();
        Self {
            asset,
            risk_level,
            bidding_disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageChange {
    pub asset: AuctionAsset,
    pub previous_stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub asset_id: AssetId,
    pub tenant_id: TenantId,
    pub bidder: String,
    pub amount: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewBid {
    pub amount: f64,
    /// Defaults to the acting user when absent.
    #[serde(default)]
    pub bidder: Option<String>,
}

impl NewBid {
    pub fn validate(&self) -> Result<(), InputError> {
        positive("amount", self.amount)?;
        if let Some(bidder) = &self.bidder {
            non_blank("bidder", bidder)?;
        }
        Ok(())
    }
}

/// Offset paging. `limit` is clamped by the caller's configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;

    #[must_use]
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    #[must_use]
    pub fn clamped(self, max_limit: u32) -> Self {
        let limit = match self.limit {
            0 => Self::DEFAULT_LIMIT.min(max_limit),
            limit => limit.min(max_limit),
        };
        Self {
            limit,
            offset: self.offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}
