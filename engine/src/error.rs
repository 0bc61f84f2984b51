use thiserror::Error;

use gavel_store::StoreError;
use gavel_types::{
    EmptyIdError, FindingCode, InputError, InvalidTransition, TenantRequired, UnknownStage,
    UnknownVariant, ValidationResult,
};

use crate::collaborators::GeneratorError;

#[derive(Debug, Error)]
pub enum GavelError {
    /// Malformed input, rejected before any read or write.
    #[error("invalid input: {0}")]
    Validation(#[from] InputError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The rule engine refused the operation. `message` joins the violation
    /// messages in evaluation order.
    #[error("operation refused: {message}")]
    Authorization {
        message: String,
        codes: Vec<FindingCode>,
    },

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error(transparent)]
    TenantRequired(#[from] TenantRequired),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GeneratorError),

    #[error("{operation} did not complete within {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The caller gave up before the commit point; nothing was written.
    #[error("operation cancelled before commit")]
    Cancelled,

    #[error("{operation} was aborted: {reason}")]
    Aborted {
        operation: &'static str,
        reason: String,
    },
}

impl GavelError {
    pub(crate) fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation(InputError::Invalid {
            field,
            reason: reason.into(),
        })
    }

    /// A refusal built from a result with at least one violation.
    pub(crate) fn refused(result: &ValidationResult) -> Self {
        Self::Authorization {
            message: result.violation_summary(),
            codes: result.violations().iter().map(|v| v.code()).collect(),
        }
    }

    /// Short machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Authorization { .. } => "authorization_error",
            Self::NotFound { .. } => "not_found",
            Self::TenantRequired(_) => "tenant_required",
            Self::Store(StoreError::Conflict { .. }) => "conflict",
            Self::Store(err) if err.is_busy() => "store_busy",
            Self::Store(_) => "store_error",
            Self::Generation(_) => "generation_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// HTTP-shaped status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidTransition(_) | Self::TenantRequired(_) => 400,
            Self::Authorization { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Store(StoreError::Conflict { .. }) => 409,
            Self::Store(err) if err.is_busy() => 503,
            Self::Store(_) | Self::Aborted { .. } => 500,
            Self::Generation(_) => 502,
            Self::Timeout { .. } | Self::Cancelled => 504,
        }
    }
}

impl From<EmptyIdError> for GavelError {
    fn from(err: EmptyIdError) -> Self {
        Self::Validation(InputError::Empty { field: err.kind })
    }
}

impl From<UnknownStage> for GavelError {
    fn from(err: UnknownStage) -> Self {
        Self::invalid("to_stage", err.to_string())
    }
}

impl From<UnknownVariant> for GavelError {
    fn from(err: UnknownVariant) -> Self {
        Self::invalid("target", err.to_string())
    }
}

pub type Result<T, E = GavelError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::Stage;

    #[test]
    fn status_codes_follow_taxonomy() {
        let transition = Stage::F0.advance_to(Stage::F2).unwrap_err();
        assert_eq!(GavelError::from(transition).status_code(), 400);
        assert_eq!(GavelError::from(TenantRequired).status_code(), 400);
        assert_eq!(GavelError::not_found("asset", "a-1").status_code(), 404);
        assert_eq!(
            GavelError::Store(StoreError::Conflict {
                entity: "roi",
                id: "a-1".to_owned()
            })
            .status_code(),
            409
        );
        assert_eq!(
            GavelError::Timeout {
                operation: "place_bid",
                timeout_ms: 10
            }
            .status_code(),
            504
        );
    }

    #[test]
    fn empty_id_maps_to_validation() {
        let err = GavelError::from(EmptyIdError { kind: "asset id" });
        assert_eq!(err.kind(), "validation_error");
        assert_eq!(err.to_string(), "invalid input: asset id must not be empty");
    }
}
