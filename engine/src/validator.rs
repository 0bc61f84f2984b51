//! Deterministic, read-only rule engine.
//!
//! Rules run in a fixed order and every finding is built from its code's
//! template, so identical state always yields an identical result. Nothing in
//! this module writes: approval status, workflow blocks and risk scores are
//! owned elsewhere and can only be observed.

use gavel_types::{
    AssetId, AuctionAsset, DocumentId, DocumentStatus, DueDiligenceCategory, Finding, FindingCode,
    Operation,
    ResourceType, RoiInputs, RoiRecord, TenantId, ValidationResult, ValidationTarget,
};

use crate::collaborators::{AssetRecords, DocumentDirectory, WorkflowGate};
use crate::error::{GavelError, Result};

pub struct Validator<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S> Validator<'a, S>
where
    S: AssetRecords + DocumentDirectory + ?Sized,
{
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    pub fn validate(&self, tenant: &TenantId, target: &ValidationTarget) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();
        match target.resource_type {
            ResourceType::Document => {
                let document_id = DocumentId::new(target.resource_id.as_str())?;
                let document = self
                    .source
                    .document_status(tenant, &document_id)?
                    .ok_or_else(|| GavelError::not_found("document", document_id.as_str()))?;
                document_rules(&document, target.operation, &mut result);
            }
            ResourceType::AuctionAsset => {
                let asset = self.asset(tenant, &target.resource_id)?;
                let roi = self.source.find_roi(tenant, &asset.id)?;
                asset_rules(&asset, target.operation, &mut result);
                roi_rules(&asset.id, roi.as_ref(), &mut result);
                if asset.linked_document_ids.is_empty() {
                    result.push(Finding::new(
                        FindingCode::SuggestLinkDocuments,
                        [("asset_id", asset.id.as_str())],
                    ));
                }
            }
            ResourceType::AuctionAssetRoi => {
                let asset = self.asset(tenant, &target.resource_id)?;
                let roi = self.source.find_roi(tenant, &asset.id)?;
                roi_rules(&asset.id, roi.as_ref(), &mut result);
            }
        }
        Ok(result)
    }

    fn asset(&self, tenant: &TenantId, raw_id: &str) -> Result<AuctionAsset> {
        let asset_id = AssetId::new(raw_id)?;
        self.source
            .find_asset(tenant, &asset_id)?
            .ok_or_else(|| GavelError::not_found("asset", asset_id.as_str()))
    }
}

fn document_rules(document: &DocumentStatus, operation: Operation, result: &mut ValidationResult) {
    let id = document.id.as_str();
    if !document.has_title() {
        result.push(Finding::new(
            FindingCode::IncompleteDocument,
            [("document_id", id), ("field", "title")],
        ));
    }
    if document.is_approved && !document.is_cpo_approved() {
        result.push(Finding::new(
            FindingCode::InconsistentDocumentCpo,
            [("document_id", id), ("cpo_status", document.cpo_status.as_str())],
        ));
    }
    if operation == Operation::GenerateDocument && !document.is_cpo_approved() {
        result.push(Finding::new(
            FindingCode::ViolationCpoNotApproved,
            [("document_id", id), ("cpo_status", document.cpo_status.as_str())],
        ));
    }
}

fn asset_rules(asset: &AuctionAsset, operation: Operation, result: &mut ValidationResult) {
    let id = asset.id.as_str();
    let open = asset.due_diligence_checklist.open_categories();
    if !open.is_empty() {
        let categories = open
            .into_iter()
            .map(DueDiligenceCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        result.push(Finding::new(
            FindingCode::IncompleteDueDiligence,
            [("asset_id", id), ("categories", categories.as_str())],
        ));
        result.push(Finding::new(
            FindingCode::SuggestCompleteDueDiligence,
            [("asset_id", id)],
        ));
    }

    let assessment = asset.risk_assessment();
    if operation == Operation::PlaceBid && assessment.bidding_disabled {
        let score = assessment.risk_score.to_string();
        result.push(Finding::new(
            FindingCode::ViolationRiskBlockActive,
            [
                ("asset_id", id),
                ("risk_score", score.as_str()),
                ("risk_level", assessment.risk_level.as_str()),
            ],
        ));
    }
}

/// A missing ROI row is judged as all-zero inputs.
fn roi_rules(asset_id: &AssetId, roi: Option<&RoiRecord>, result: &mut ValidationResult) {
    let id = asset_id.as_str();
    let defaults = RoiInputs::default();
    let inputs = roi.map_or(&defaults, |roi| &roi.inputs);

    let missing = inputs.missing_required();
    if !missing.is_empty() {
        let fields = missing.join(", ");
        result.push(Finding::new(
            FindingCode::IncompleteRoiInputs,
            [("asset_id", id), ("fields", fields.as_str())],
        ));
    }
    if let Some(roi) = roi
        && roi.outputs.net_profit < 0.0
    {
        let net_profit = format!("{:.2}", roi.outputs.net_profit);
        result.push(Finding::new(
            FindingCode::InconsistentRoiNegativeProfit,
            [("asset_id", id), ("net_profit", net_profit.as_str())],
        ));
    }
    if !inputs.has_resale_date() {
        result.push(Finding::new(
            FindingCode::SuggestAddBreakEvenDate,
            [("asset_id", id)],
        ));
    }
}

/// Add `VIOLATION_WORKFLOW_BLOCK_ACTIVE` when the workflow subsystem reports
/// the target as blocked. Only observes the gate.
pub fn with_workflow_gate<G>(
    mut result: ValidationResult,
    gate: &G,
    tenant: &TenantId,
    target: &ValidationTarget,
) -> Result<ValidationResult>
where
    G: WorkflowGate + ?Sized,
{
    let blocked = gate
        .gate_status(tenant, target.resource_type, &target.resource_id)?
        .is_some_and(|block| block.blocked);
    if blocked {
        result.push(Finding::new(
            FindingCode::ViolationWorkflowBlockActive,
            [
                ("resource_type", target.resource_type.as_str()),
                ("resource_id", target.resource_id.as_str()),
            ],
        ));
    }
    Ok(result)
}

/// Validator plus the workflow gate: the evaluation every gated operation uses.
pub fn evaluate<S>(source: &S, tenant: &TenantId, target: &ValidationTarget) -> Result<ValidationResult>
where
    S: AssetRecords + DocumentDirectory + WorkflowGate + ?Sized,
{
    let result = Validator::new(source).validate(tenant, target)?;
    with_workflow_gate(result, source, tenant, target)
}
