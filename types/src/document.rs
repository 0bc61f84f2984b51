//! Read-only views of collaborator state: document approval and workflow gates.

use serde::{Deserialize, Serialize};

use crate::DocumentId;

/// Quality-control status of a document, owned by the document subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub id: DocumentId,
    pub title: Option<String>,
    /// The document's own "approved" flag.
    pub is_approved: bool,
    /// The CPO (quality-control) marker.
    pub cpo_status: String,
}

impl DocumentStatus {
    pub const CPO_APPROVED: &'static str = "approved";

    #[must_use]
    pub fn is_cpo_approved(&self) -> bool {
        self.cpo_status.trim().eq_ignore_ascii_case(Self::CPO_APPROVED)
    }

    #[must_use]
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// A workflow gate as reported by the workflow subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowBlock {
    pub blocked: bool,
    pub reason: Option<String>,
}
