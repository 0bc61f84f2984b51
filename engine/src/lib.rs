//! Gavel engine: asset lifecycle, versioned ROI, the rule engine and the
//! gated orchestration that ties them to the store.
//!
//! [`Gavel`] is the synchronous service; [`GavelApi`] wraps it in an async,
//! HTTP-shaped facade with bounded operation time.

mod api;
mod audit;
mod cancel;
mod collaborators;
mod config;
mod error;
pub mod lifecycle;
mod orchestrator;
pub mod roi;
mod validator;

pub use api::{ApiResponse, GavelApi};
pub use audit::{
    AUDIT_QUEUE_CAPACITY, AuditEntry, AuditSink, AuditSinkError, Auditor, OPS_TARGET,
    SqliteAuditSink, TracingAuditSink,
};
pub use cancel::Cancellation;
pub use collaborators::{
    AssetRecords, DocumentDirectory, DocumentGenerator, GeneratedDocument, GenerationRequest,
    GeneratorError, UnconfiguredGenerator, WorkflowGate,
};
pub use config::{
    ApiConfig, AppConfig, AuditConfig, ConfigError, Environment, GavelConfig, Settings,
    StoreConfig, config_path, expand_env_vars, gavel_dir,
};
pub use error::{GavelError, Result};
pub use orchestrator::Gavel;
pub use validator::{Validator, evaluate, with_workflow_gate};

pub use gavel_store::{AuctionStore, StoreError, StoreOptions, StoredAuditEvent};
pub use gavel_types as types;
