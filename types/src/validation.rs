//! Validation requests and their categorized results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finding::{Finding, FindingCategory, FindingCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Document,
    AuctionAsset,
    AuctionAssetRoi,
}

impl ResourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::AuctionAsset => "auction_asset",
            Self::AuctionAssetRoi => "auction_asset_roi",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for ResourceType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "document" => Ok(Self::Document),
            "auction_asset" => Ok(Self::AuctionAsset),
            "auction_asset_roi" => Ok(Self::AuctionAssetRoi),
            other => Err(UnknownVariant {
                kind: "resource type",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    General,
    GenerateDocument,
    PlaceBid,
    Transition,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::GenerateDocument => "generate_document",
            Self::PlaceBid => "place_bid",
            Self::Transition => "transition",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "general" => Ok(Self::General),
            "generate_document" => Ok(Self::GenerateDocument),
            "place_bid" => Ok(Self::PlaceBid),
            "transition" => Ok(Self::Transition),
            other => Err(UnknownVariant {
                kind: "operation",
                value: other.to_owned(),
            }),
        }
    }
}

/// What to validate. The tenant comes from the request context, not from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationTarget {
    pub resource_type: ResourceType,
    pub resource_id: String,
    #[serde(default)]
    pub operation: Operation,
}

impl ValidationTarget {
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            operation,
        }
    }
}

/// Findings bucketed by category. `allowed` is true iff there are no violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    allowed: bool,
    violations: Vec<Finding>,
    suggestions: Vec<Finding>,
    completeness: Vec<Finding>,
    inconsistencies: Vec<Finding>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            allowed: true,
            violations: Vec::new(),
            suggestions: Vec::new(),
            completeness: Vec::new(),
            inconsistencies: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn from_findings(findings: impl IntoIterator<Item = Finding>) -> Self {
        let mut result = Self::default();
        for finding in findings {
            result.push(finding);
        }
        result
    }

    pub fn push(&mut self, finding: Finding) {
        match finding.code().category() {
            FindingCategory::Violation => {
                self.allowed = false;
                self.violations.push(finding);
            }
            FindingCategory::Suggestion => self.suggestions.push(finding),
            FindingCategory::Completeness => self.completeness.push(finding),
            FindingCategory::Inconsistency => self.inconsistencies.push(finding),
        }
    }

    #[must_use]
    pub const fn allowed(&self) -> bool {
        self.allowed
    }

    #[must_use]
    pub fn violations(&self) -> &[Finding] {
        &self.violations
    }

    #[must_use]
    pub fn suggestions(&self) -> &[Finding] {
        &self.suggestions
    }

    #[must_use]
    pub fn completeness(&self) -> &[Finding] {
        &self.completeness
    }

    #[must_use]
    pub fn inconsistencies(&self) -> &[Finding] {
        &self.inconsistencies
    }

    #[must_use]
    pub fn has_code(&self, code: FindingCode) -> bool {
        self.findings().any(|finding| finding.code() == code)
    }

    /// All findings: violations, completeness, inconsistencies, suggestions.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.violations
            .iter()
            .chain(&self.completeness)
            .chain(&self.inconsistencies)
            .chain(&self.suggestions)
    }

    #[must_use]
    pub fn codes(&self) -> Vec<FindingCode> {
        self.findings().map(Finding::code).collect()
    }

    /// Violation messages joined for a refusal.
    #[must_use]
    pub fn violation_summary(&self) -> String {
        self.violations
            .iter()
            .map(Finding::message)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The non-blocking part of the result.
    #[must_use]
    pub fn into_advisory(self) -> Advisory {
        Advisory {
            suggestions: self.suggestions,
            completeness: self.completeness,
            inconsistencies: self.inconsistencies,
        }
    }
}

/// Read-only guidance: never carries violations and never blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub suggestions: Vec<Finding>,
    pub completeness: Vec<Finding>,
    pub inconsistencies: Vec<Finding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation() -> Finding {
        Finding::new(
            FindingCode::ViolationCpoNotApproved,
            [("document_id", "d-1"), ("cpo_status", "pending")],
        )
    }

    #[test]
    fn empty_result_is_allowed() {
        let result = ValidationResult::default();
        assert!(result.allowed());
        assert_eq!(result.violation_summary(), "");
    }

    #[test]
    fn any_violation_disallows() {
        let result = ValidationResult::from_findings([
            Finding::new(FindingCode::SuggestLinkDocuments, [("asset_id", "a-1")]),
            violation(),
        ]);
        assert!(!result.allowed());
        assert_eq!(result.violations().len(), 1);
        assert_eq!(result.suggestions().len(), 1);
        assert_eq!(
            result.violation_summary(),
            "Document d-1 is not approved by quality control (CPO status 'pending')."
        );
    }

    #[test]
    fn inconsistencies_are_bucketed_separately_from_suggestions() {
        let result = ValidationResult::from_findings([Finding::new(
            FindingCode::InconsistentRoiNegativeProfit,
            [("asset_id", "a-1"), ("net_profit", "-10")],
        )]);
        assert!(result.allowed());
        assert!(result.suggestions().is_empty());
        assert_eq!(result.inconsistencies().len(), 1);
    }

    #[test]
    fn advisory_drops_violations() {
        let advisory = ValidationResult::from_findings([violation()]).into_advisory();
        let json = serde_json::to_value(&advisory).unwrap();
        assert!(json.get("violations").is_none());
        assert!(json.get("allowed").is_none());
    }

    #[test]
    fn target_defaults_to_general_operation() {
        let target: ValidationTarget =
            serde_json::from_str(r#"{"resource_type":"auction_asset","resource_id":"a-1"}"#)
                .unwrap();
        assert_eq!(target.operation, Operation::General);
        assert_eq!("place_bid".parse::<Operation>().unwrap(), Operation::PlaceBid);
        assert!("delete".parse::<Operation>().is_err());
    }
}
