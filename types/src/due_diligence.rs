//! Due-diligence checklist and risk scoring.
//!
//! The risk score is a pure function of the four checklist categories and
//! [`RiskLevel::from_score`] is the only place the LOW/MEDIUM/HIGH boundary
//! lives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DueDiligenceStatus {
    Ok,
    #[default]
    Pending,
    Risk,
}

impl DueDiligenceStatus {
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Pending => 15,
            Self::Risk => 25,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Pending => "pending",
            Self::Risk => "risk",
        }
    }
}

impl fmt::Display for DueDiligenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown due-diligence status '{0}' (expected ok, pending or risk)")]
pub struct UnknownStatus(pub String);

impl FromStr for DueDiligenceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "pending" => Ok(Self::Pending),
            "risk" => Ok(Self::Risk),
            _ => Err(UnknownStatus(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDiligenceItem {
    pub status: DueDiligenceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DueDiligenceItem {
    #[must_use]
    pub fn new(status: DueDiligenceStatus) -> Self {
        Self {
            status,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueDiligenceCategory {
    Occupancy,
    Debts,
    LegalRisks,
    Zoning,
}

impl DueDiligenceCategory {
    pub const ALL: [DueDiligenceCategory; 4] = [
        Self::Occupancy,
        Self::Debts,
        Self::LegalRisks,
        Self::Zoning,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Occupancy => "occupancy",
            Self::Debts => "debts",
            Self::LegalRisks => "legal_risks",
            Self::Zoning => "zoning",
        }
    }
}

impl fmt::Display for DueDiligenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDiligenceChecklist {
    pub occupancy: DueDiligenceItem,
    pub debts: DueDiligenceItem,
    pub legal_risks: DueDiligenceItem,
    pub zoning: DueDiligenceItem,
}

impl DueDiligenceChecklist {
    /// Every category in the same status. Mostly useful in tests.
    #[must_use]
    pub fn uniform(status: DueDiligenceStatus) -> Self {
        Self {
            occupancy: DueDiligenceItem::new(status),
            debts: DueDiligenceItem::new(status),
            legal_risks: DueDiligenceItem::new(status),
            zoning: DueDiligenceItem::new(status),
        }
    }

    #[must_use]
    pub fn item(&self, category: DueDiligenceCategory) -> &DueDiligenceItem {
        match category {
            DueDiligenceCategory::Occupancy => &self.occupancy,
            DueDiligenceCategory::Debts => &self.debts,
            DueDiligenceCategory::LegalRisks => &self.legal_risks,
            DueDiligenceCategory::Zoning => &self.zoning,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = (DueDiligenceCategory, &DueDiligenceItem)> {
        DueDiligenceCategory::ALL
            .into_iter()
            .map(|category| (category, self.item(category)))
    }

    /// Categories still `pending` or flagged `risk`, in checklist order.
    #[must_use]
    pub fn open_categories(&self) -> Vec<DueDiligenceCategory> {
        self.items()
            .filter(|(_, item)| item.status != DueDiligenceStatus::Ok)
            .map(|(category, _)| category)
            .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.open_categories().is_empty()
    }

    /// Overlay the supplied categories; absent ones keep their prior value.
    #[must_use]
    pub fn merged(&self, patch: ChecklistPatch) -> Self {
        Self {
            occupancy: patch.occupancy.unwrap_or_else(|| self.occupancy.clone()),
            debts: patch.debts.unwrap_or_else(|| self.debts.clone()),
            legal_risks: patch.legal_risks.unwrap_or_else(|| self.legal_risks.clone()),
            zoning: patch.zoning.unwrap_or_else(|| self.zoning.clone()),
        }
    }

    #[must_use]
    pub fn risk_score(&self) -> RiskScore {
        RiskScore::of(self)
    }
}

/// Partial checklist update. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecklistPatch {
    pub occupancy: Option<DueDiligenceItem>,
    pub debts: Option<DueDiligenceItem>,
    pub legal_risks: Option<DueDiligenceItem>,
    pub zoning: Option<DueDiligenceItem>,
}

impl ChecklistPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupancy.is_none()
            && self.debts.is_none()
            && self.legal_risks.is_none()
            && self.zoning.is_none()
    }

    #[must_use]
    pub fn set(mut self, category: DueDiligenceCategory, item: DueDiligenceItem) -> Self {
        let slot = match category {
            DueDiligenceCategory::Occupancy => &mut self.occupancy,
            DueDiligenceCategory::Debts => &mut self.debts,
            DueDiligenceCategory::LegalRisks => &mut self.legal_risks,
            DueDiligenceCategory::Zoning => &mut self.zoning,
        };
        *slot = Some(item);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("risk score {0} is outside 0..=100")]
pub struct RiskScoreOutOfRange(pub i64);

/// Risk score in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RiskScore(u8);

impl RiskScore {
    pub const ZERO: RiskScore = RiskScore(0);
    pub const MAX: RiskScore = RiskScore(100);

    /// Recompute from scratch: `min(100, Σ weight(status))`.
    #[must_use]
    pub fn of(checklist: &DueDiligenceChecklist) -> Self {
        let total: u32 = checklist.items().map(|(_, item)| item.status.weight()).sum();
        Self(total.min(100) as u8)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn level(self) -> RiskLevel {
        RiskLevel::from_score(self)
    }
}

impl TryFrom<i64> for RiskScore {
    type Error = RiskScoreOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(score) if score <= 100 => Ok(Self(score)),
            _ => Err(RiskScoreOutOfRange(value)),
        }
    }
}

impl From<RiskScore> for u8 {
    fn from(value: RiskScore) -> Self {
        value.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    const HIGH_FROM: u8 = 70;
    const MEDIUM_FROM: u8 = 40;

    #[must_use]
    pub const fn from_score(score: RiskScore) -> Self {
        if score.0 >= Self::HIGH_FROM {
            Self::High
        } else if score.0 >= Self::MEDIUM_FROM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub const fn bidding_disabled(self) -> bool {
        matches!(self, Self::High)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The derived risk view exposed alongside an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: RiskScore,
    pub risk_level: RiskLevel,
    pub bidding_disabled: bool,
}

impl From<RiskScore> for RiskAssessment {
    fn from(score: RiskScore) -> Self {
        let level = RiskLevel::from_score(score);
        Self {
            risk_score: score,
            risk_level: level,
            bidding_disabled: level.bidding_disabled(),
        }
    }
}
