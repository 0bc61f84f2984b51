//! Core domain types for Gavel.
//!
//! Pure types and functions with no IO and no async: the auction stage state
//! machine, due-diligence risk scoring, the ROI calculation and the rule
//! catalogue. Everything here can be used from any layer.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod asset;
mod audit;
mod document;
mod due_diligence;
mod finding;
mod ids;
mod input;
mod request;
mod roi;
mod stage;
mod validation;

pub use asset::{AssetView, AuctionAsset, Bid, NewAsset, NewBid, Page, StageChange};
pub use audit::{AuditAction, AuditEvent, AuditOutcome};
pub use document::{DocumentStatus, WorkflowBlock};
pub use due_diligence::{
    ChecklistPatch, DueDiligenceCategory, DueDiligenceChecklist, DueDiligenceItem,
    DueDiligenceStatus, RiskAssessment, RiskLevel, RiskScore, RiskScoreOutOfRange, UnknownStatus,
};
pub use finding::{Finding, FindingCategory, FindingCode, Severity};
pub use ids::{ActorId, AssetId, BidId, DocumentId, EmptyIdError, TenantId};
pub use input::InputError;
pub use request::{Actor, RequestContext, TenantRequired};
pub use roi::{
    RoiInputs, RoiInputsPatch, RoiOutputs, RoiRecord, RoiUpdate, RoiVersion, calculate, round2,
};
pub use stage::{InvalidTransition, Stage, UnknownStage};
pub use validation::{
    Advisory, Operation, ResourceType, UnknownVariant, ValidationResult, ValidationTarget,
};
