//! HTTP-shaped async facade.
//!
//! Each call takes the request context and a JSON body, runs the blocking
//! store work on the blocking pool under the configured operation timeout and
//! returns a status code with a JSON body. A call that times out before its
//! commit point writes nothing. Routing and transport belong to
//! whatever server embeds this.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use gavel_types::{
    AssetId, AssetView, ChecklistPatch, DocumentStatus, NewAsset, NewBid, Page, RequestContext,
    ResourceType, RoiInputsPatch, Stage, ValidationTarget, WorkflowBlock,
};

use crate::audit::OPS_TARGET;
use crate::cancel::Cancellation;
use crate::collaborators::GenerationRequest;
use crate::config::Settings;
use crate::error::{GavelError, Result};
use crate::orchestrator::Gavel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn error(err: &GavelError) -> Self {
        let mut body = json!({
            "error": err.kind(),
            "message": err.to_string(),
        });
        if let Some(map) = body.as_object_mut() {
            match err {
                GavelError::InvalidTransition(transition) => {
                    map.insert("from".to_owned(), json!(transition.from()));
                    map.insert("to".to_owned(), json!(transition.to()));
                }
                GavelError::Authorization { codes, .. } => {
                    map.insert("violations".to_owned(), json!(codes));
                }
                _ => {}
            }
        }
        Self {
            status: err.status_code(),
            body,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransitionBody {
    to_stage: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DueDiligenceBody {
    items: ChecklistPatch,
}

#[derive(Debug, Serialize)]
struct TransitionReply {
    asset: AssetView,
    previous_stage: Stage,
    to_stage: Stage,
}

#[derive(Debug, Serialize)]
struct BidReply {
    id: String,
    amount: f64,
}

pub struct GavelApi {
    gavel: Arc<Gavel>,
    timeout: Duration,
}

impl GavelApi {
    pub fn new(gavel: Gavel, timeout: Duration) -> Self {
        Self {
            gavel: Arc::new(gavel),
            timeout,
        }
    }

    pub fn open(settings: &Settings) -> Result<Self> {
        Ok(Self::new(Gavel::open(settings)?, settings.operation_timeout))
    }

    pub fn gavel(&self) -> &Gavel {
        &self.gavel
    }

    /// `POST /assets` → 201 with the asset and its risk fields.
    pub async fn create_asset(&self, ctx: RequestContext, body: Value) -> ApiResponse {
        self.call("create_asset", 201, move |gavel| {
            let draft: NewAsset = parse_body(body)?;
            gavel.create_asset(&ctx, draft)
        })
        .await
    }

    /// `GET /assets/:id`
    pub async fn get_asset(&self, ctx: RequestContext, asset_id: &str) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("get_asset", 200, move |gavel| {
            gavel.get_asset(&ctx, &AssetId::new(asset_id)?)
        })
        .await
    }

    /// `GET /assets`
    pub async fn list_assets(&self, ctx: RequestContext, page: Page) -> ApiResponse {
        self.call("list_assets", 200, move |gavel| gavel.list_assets(&ctx, page))
            .await
    }

    /// `POST /assets/:id/transition {to_stage}` → 200 or 400 `InvalidTransition`.
    pub async fn transition(&self, ctx: RequestContext, asset_id: &str, body: Value) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("transition_stage", 200, move |gavel| {
            let TransitionBody { to_stage } = parse_body(body)?;
            let to: Stage = to_stage.parse()?;
            let change = gavel.transition_stage(&ctx, &AssetId::new(asset_id)?, to)?;
            Ok(TransitionReply {
                previous_stage: change.previous_stage,
                to_stage: change.asset.current_stage,
                asset: change.asset.into(),
            })
        })
        .await
    }

    /// `PUT /assets/:id/due-diligence {items}` → 200 with the recomputed score.
    pub async fn update_due_diligence(
        &self,
        ctx: RequestContext,
        asset_id: &str,
        body: Value,
    ) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("update_due_diligence", 200, move |gavel| {
            let DueDiligenceBody { items } = parse_body(body)?;
            gavel.update_due_diligence(&ctx, &AssetId::new(asset_id)?, items)
        })
        .await
    }

    /// `GET /assets/:id/risk`
    pub async fn risk(&self, ctx: RequestContext, asset_id: &str) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("risk", 200, move |gavel| {
            gavel.risk(&ctx, &AssetId::new(asset_id)?)
        })
        .await
    }

    /// `POST /assets/:id/bids {amount}` → 201 `{id, amount}` or 403.
    pub async fn place_bid(&self, ctx: RequestContext, asset_id: &str, body: Value) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("place_bid", 201, move |gavel| {
            let bid: NewBid = parse_body(body)?;
            let placed = gavel.place_bid(&ctx, &AssetId::new(asset_id)?, bid)?;
            Ok(BidReply {
                id: placed.id.into(),
                amount: placed.amount,
            })
        })
        .await
    }

    /// `GET /assets/:id/bids`
    pub async fn list_bids(&self, ctx: RequestContext, asset_id: &str, page: Page) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("list_bids", 200, move |gavel| {
            gavel.list_bids(&ctx, &AssetId::new(asset_id)?, page)
        })
        .await
    }

    /// `GET /assets/:id/roi`
    pub async fn get_roi(&self, ctx: RequestContext, asset_id: &str) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("get_roi", 200, move |gavel| {
            gavel.get_roi(&ctx, &AssetId::new(asset_id)?)
        })
        .await
    }

    /// `PUT /assets/:id/roi` → `{roi, is_new}`.
    pub async fn update_roi(&self, ctx: RequestContext, asset_id: &str, body: Value) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("update_roi", 200, move |gavel| {
            let patch: RoiInputsPatch = parse_body(body)?;
            gavel.update_roi(&ctx, &AssetId::new(asset_id)?, &patch)
        })
        .await
    }

    /// `GET /assets/:id/roi/versions`, newest first.
    pub async fn roi_versions(&self, ctx: RequestContext, asset_id: &str, page: Page) -> ApiResponse {
        let asset_id = asset_id.to_owned();
        self.call("roi_versions", 200, move |gavel| {
            gavel.roi_versions(&ctx, &AssetId::new(asset_id)?, page)
        })
        .await
    }

    /// `POST /intelligence/validate` → the full result, never a refusal.
    pub async fn validate(&self, ctx: RequestContext, body: Value) -> ApiResponse {
        self.call("validate", 200, move |gavel| {
            let target: ValidationTarget = parse_body(body)?;
            gavel.validate(&ctx, &target)
        })
        .await
    }

    /// `POST /intelligence/validate-and-enforce` → 403 when not allowed.
    pub async fn validate_and_enforce(&self, ctx: RequestContext, body: Value) -> ApiResponse {
        self.call("validate_and_enforce", 200, move |gavel| {
            let target: ValidationTarget = parse_body(body)?;
            gavel.validate_and_enforce(&ctx, &target)
        })
        .await
    }

    /// `GET /intelligence/suggestions/:type/:id`
    pub async fn suggestions(
        &self,
        ctx: RequestContext,
        resource_type: &str,
        resource_id: &str,
    ) -> ApiResponse {
        let resource_type = resource_type.to_owned();
        let resource_id = resource_id.to_owned();
        self.call("suggestions", 200, move |gavel| {
            let resource_type: ResourceType = resource_type.parse()?;
            gavel.suggestions(&ctx, resource_type, &resource_id)
        })
        .await
    }

    /// `POST /documents/generate`
    pub async fn generate_document(&self, ctx: RequestContext, body: Value) -> ApiResponse {
        self.call("generate_document", 201, move |gavel| {
            let request: GenerationRequest = parse_body(body)?;
            gavel.generate_document(&ctx, &request)
        })
        .await
    }

    /// Record a document's approval status on behalf of the document
    /// subsystem. Used by seed tooling.
    pub async fn register_document(&self, ctx: RequestContext, body: Value) -> ApiResponse {
        self.call("register_document", 200, move |gavel| {
            let document: DocumentStatus = parse_body(body)?;
            gavel.register_document(&ctx, &document)?;
            Ok(document)
        })
        .await
    }

    /// Set or clear a workflow block on behalf of the workflow subsystem.
    pub async fn set_workflow_block(
        &self,
        ctx: RequestContext,
        resource_type: &str,
        resource_id: &str,
        body: Value,
    ) -> ApiResponse {
        let resource_type = resource_type.to_owned();
        let resource_id = resource_id.to_owned();
        self.call("set_workflow_block", 200, move |gavel| {
            let parsed: ResourceType = resource_type.parse()?;
            let block: WorkflowBlock = parse_body(body)?;
            gavel.set_workflow_block(&ctx, parsed, &resource_id, &block)?;
            Ok(json!({
                "resource_type": parsed,
                "resource_id": resource_id,
                "blocked": block.blocked,
                "reason": block.reason,
            }))
        })
        .await
    }

    /// `GET /audit/:type/:id`
    pub async fn audit_events(
        &self,
        ctx: RequestContext,
        resource_type: &str,
        resource_id: &str,
        page: Page,
    ) -> ApiResponse {
        let resource_type = resource_type.to_owned();
        let resource_id = resource_id.to_owned();
        self.call("audit_events", 200, move |gavel| {
            let resource_type: ResourceType = resource_type.parse()?;
            gavel.audit_events(&ctx, resource_type, &resource_id, page)
        })
        .await
    }

    async fn call<T, F>(&self, operation: &'static str, success: u16, f: F) -> ApiResponse
    where
        F: FnOnce(&Gavel) -> Result<T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let cancel = Cancellation::new();
        let gavel = self.gavel.with_cancellation(cancel.clone());
        let mut task = tokio::task::spawn_blocking(move || f(&gavel));
        let outcome = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined_outcome(operation, joined),
            Err(_) if cancel.cancel() => {
                // The worker rolls back when it reaches its commit point.
                tracing::warn!(
                    target: OPS_TARGET,
                    operation,
                    timeout_ms = duration_ms(self.timeout),
                    "operation timed out"
                );
                Err(GavelError::Timeout {
                    operation,
                    timeout_ms: duration_ms(self.timeout),
                })
            }
            Err(_) => {
                // Already committing: report what actually happened.
                tracing::debug!(target: OPS_TARGET, operation, "deadline passed during commit");
                joined_outcome(operation, task.await)
            }
        };

        match outcome.and_then(|value| {
            serde_json::to_value(value).map_err(|e| GavelError::Aborted {
                operation,
                reason: format!("failed to encode response: {e}"),
            })
        }) {
            Ok(body) => ApiResponse {
                status: success,
                body,
            },
            Err(err) => {
                if err.status_code() >= 500 {
                    tracing::warn!(operation, error = %err, "request failed");
                } else {
                    tracing::debug!(operation, error = %err, "request rejected");
                }
                ApiResponse::error(&err)
            }
        }
    }
}

fn joined_outcome<T>(
    operation: &'static str,
    joined: std::result::Result<Result<T>, tokio::task::JoinError>,
) -> Result<T> {
    joined.unwrap_or_else(|join| {
        tracing::error!(target: OPS_TARGET, operation, error = %join, "operation task failed");
        Err(GavelError::Aborted {
            operation,
            reason: join.to_string(),
        })
    })
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| GavelError::invalid("body", e.to_string()))
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
