//! Narrow read interfaces to state owned elsewhere, plus the external
//! document generation step.
//!
//! The rule engine reads assets, ROI rows, document approval and workflow
//! gates only through these traits. Both [`AuctionStore`] and an open
//! [`StoreTx`] implement them, so a gated mutation can evaluate its rules
//! inside the same transaction that performs the write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gavel_store::{AuctionStore, StoreError, StoreTx};
use gavel_types::{
    AssetId, AuctionAsset, DocumentId, DocumentStatus, ResourceType, RoiRecord, TenantId,
    WorkflowBlock,
};

pub trait AssetRecords {
    fn find_asset(
        &self,
        tenant: &TenantId,
        asset_id: &AssetId,
    ) -> Result<Option<AuctionAsset>, StoreError>;

    fn find_roi(&self, tenant: &TenantId, asset_id: &AssetId)
    -> Result<Option<RoiRecord>, StoreError>;
}

/// Read-only view of the document subsystem's quality-control status.
pub trait DocumentDirectory {
    fn document_status(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
    ) -> Result<Option<DocumentStatus>, StoreError>;
}

/// Read-only view of the workflow subsystem's block flags.
pub trait WorkflowGate {
    fn gate_status(
        &self,
        tenant: &TenantId,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Option<WorkflowBlock>, StoreError>;
}

macro_rules! store_backed {
    ($ty:ty) => {
        impl AssetRecords for $ty {
            fn find_asset(
                &self,
                tenant: &TenantId,
                asset_id: &AssetId,
            ) -> Result<Option<AuctionAsset>, StoreError> {
                self.asset(tenant, asset_id)
            }

            fn find_roi(
                &self,
                tenant: &TenantId,
                asset_id: &AssetId,
            ) -> Result<Option<RoiRecord>, StoreError> {
                self.roi(tenant, asset_id)
            }
        }

        impl DocumentDirectory for $ty {
            fn document_status(
                &self,
                tenant: &TenantId,
                document_id: &DocumentId,
            ) -> Result<Option<DocumentStatus>, StoreError> {
                self.document(tenant, document_id)
            }
        }

        impl WorkflowGate for $ty {
            fn gate_status(
                &self,
                tenant: &TenantId,
                resource_type: ResourceType,
                resource_id: &str,
            ) -> Result<Option<WorkflowBlock>, StoreError> {
                self.workflow_block(tenant, resource_type, resource_id)
            }
        }
    };
}

store_backed!(AuctionStore);
store_backed!(StoreTx<'_>);

/// Request for the external generation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationRequest {
    pub source_document_ids: Vec<DocumentId>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub id: String,
    pub source_document_ids: Vec<DocumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document generation failed: {0}")]
pub struct GeneratorError(pub String);

/// The document generation collaborator. Called only after every source
/// document has passed validation.
pub trait DocumentGenerator: Send + Sync {
    fn generate(
        &self,
        tenant: &TenantId,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument, GeneratorError>;
}

/// Used when no generator is wired in; every call fails.
#[derive(Debug, Default)]
pub struct UnconfiguredGenerator;

impl DocumentGenerator for UnconfiguredGenerator {
    fn generate(
        &self,
        _tenant: &TenantId,
        _request: &GenerationRequest,
    ) -> Result<GeneratedDocument, GeneratorError> {
        Err(GeneratorError("no document generator is configured".to_owned()))
    }
}
