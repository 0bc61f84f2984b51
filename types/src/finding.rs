//! The fixed rule catalogue.
//!
//! Every finding is a [`FindingCode`] plus string parameters; its message is
//! rendered from the code's template and nothing else, so identical inputs
//! always produce byte-identical findings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Suggestion,
    Violation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Completeness,
    Inconsistency,
    Suggestion,
    Violation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    IncompleteDocument,
    IncompleteRoiInputs,
    IncompleteDueDiligence,
    InconsistentDocumentCpo,
    InconsistentRoiNegativeProfit,
    SuggestAddBreakEvenDate,
    SuggestCompleteDueDiligence,
    SuggestLinkDocuments,
    ViolationCpoNotApproved,
    ViolationRiskBlockActive,
    ViolationWorkflowBlockActive,
}

impl FindingCode {
    pub const ALL: [FindingCode; 11] = [
        Self::IncompleteDocument,
        Self::IncompleteRoiInputs,
        Self::IncompleteDueDiligence,
        Self::InconsistentDocumentCpo,
        Self::InconsistentRoiNegativeProfit,
        Self::SuggestAddBreakEvenDate,
        Self::SuggestCompleteDueDiligence,
        Self::SuggestLinkDocuments,
        Self::ViolationCpoNotApproved,
        Self::ViolationRiskBlockActive,
        Self::ViolationWorkflowBlockActive,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncompleteDocument => "INCOMPLETE_DOCUMENT",
            Self::IncompleteRoiInputs => "INCOMPLETE_ROI_INPUTS",
            Self::IncompleteDueDiligence => "INCOMPLETE_DUE_DILIGENCE",
            Self::InconsistentDocumentCpo => "INCONSISTENT_DOCUMENT_CPO",
            Self::InconsistentRoiNegativeProfit => "INCONSISTENT_ROI_NEGATIVE_PROFIT",
            Self::SuggestAddBreakEvenDate => "SUGGEST_ADD_BREAK_EVEN_DATE",
            Self::SuggestCompleteDueDiligence => "SUGGEST_COMPLETE_DUE_DILIGENCE",
            Self::SuggestLinkDocuments => "SUGGEST_LINK_DOCUMENTS",
            Self::ViolationCpoNotApproved => "VIOLATION_CPO_NOT_APPROVED",
            Self::ViolationRiskBlockActive => "VIOLATION_RISK_BLOCK_ACTIVE",
            Self::ViolationWorkflowBlockActive => "VIOLATION_WORKFLOW_BLOCK_ACTIVE",
        }
    }

    #[must_use]
    pub const fn category(self) -> FindingCategory {
        match self {
            Self::IncompleteDocument | Self::IncompleteRoiInputs | Self::IncompleteDueDiligence => {
                FindingCategory::Completeness
            }
            Self::InconsistentDocumentCpo | Self::InconsistentRoiNegativeProfit => {
                FindingCategory::Inconsistency
            }
            Self::SuggestAddBreakEvenDate
            | Self::SuggestCompleteDueDiligence
            | Self::SuggestLinkDocuments => FindingCategory::Suggestion,
            Self::ViolationCpoNotApproved
            | Self::ViolationRiskBlockActive
            | Self::ViolationWorkflowBlockActive => FindingCategory::Violation,
        }
    }

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self.category() {
            FindingCategory::Completeness => Severity::Info,
            FindingCategory::Inconsistency | FindingCategory::Suggestion => Severity::Suggestion,
            FindingCategory::Violation => Severity::Violation,
        }
    }

    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::IncompleteDocument => "Document {document_id} is missing required field '{field}'.",
            Self::IncompleteRoiInputs => {
                "ROI for asset {asset_id} is missing required inputs: {fields}."
            }
            Self::IncompleteDueDiligence => {
                "Due diligence for asset {asset_id} has open items: {categories}."
            }
            Self::InconsistentDocumentCpo => {
                "Document {document_id} is marked approved but its CPO status is '{cpo_status}'."
            }
            Self::InconsistentRoiNegativeProfit => {
                "ROI for asset {asset_id} projects a negative net profit of {net_profit}."
            }
            Self::SuggestAddBreakEvenDate => {
                "Add an expected resale date to asset {asset_id} so a break-even date can be computed."
            }
            Self::SuggestCompleteDueDiligence => {
                "Complete the due-diligence checklist for asset {asset_id} before bidding or advancing."
            }
            Self::SuggestLinkDocuments => "Link supporting documents to asset {asset_id}.",
            Self::ViolationCpoNotApproved => {
                "Document {document_id} is not approved by quality control (CPO status '{cpo_status}')."
            }
            Self::ViolationRiskBlockActive => {
                "Bidding is blocked for asset {asset_id}: risk score {risk_score} is {risk_level}."
            }
            Self::ViolationWorkflowBlockActive => {
                "A workflow block is active for {resource_type} {resource_id}."
            }
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deterministic rule outcome.
///
/// Fields are private: the only way to build one is [`Finding::new`], which
/// renders the code's template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    code: FindingCode,
    severity: Severity,
    message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

impl Finding {
    pub fn new<K, V>(code: FindingCode, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let params: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let message = render(code.template(), &params);
        Self {
            code,
            severity: code.severity(),
            message,
            params,
        }
    }

    #[must_use]
    pub const fn code(&self) -> FindingCode {
        self.code
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Substitute `{name}` placeholders. Unknown placeholders are kept verbatim.
fn render(template: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match params.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
