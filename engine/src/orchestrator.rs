//! Gated mutations over the store.
//!
//! Each mutation is one immediate transaction: rules are evaluated inside the
//! same transaction that writes, so the decision and the write see the same
//! state. Audit events are queued after the store lock is released and
//! never affect the outcome.
//!
//! A [`Gavel`] bound to a [`Cancellation`] checks it once, immediately before
//! anything becomes visible; a cancelled operation rolls back.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use uuid::Uuid;

use gavel_store::{AuctionStore, StoreOptions, StoreTx, StoredAuditEvent, now_timestamp};
use gavel_types::{
    Advisory, AssetId, AssetView, AuctionAsset, AuditAction, AuditOutcome, Bid, BidId, ChecklistPatch,
    DocumentStatus, NewAsset, NewBid, Operation, Page, RequestContext, ResourceType,
    RiskAssessment, RoiInputsPatch, RoiRecord, RoiUpdate, RoiVersion, Stage, StageChange,
    TenantId, ValidationResult, ValidationTarget, WorkflowBlock,
};

use crate::audit::{AuditEntry, Auditor, OPS_TARGET, SqliteAuditSink};
use crate::cancel::Cancellation;
use crate::collaborators::{
    DocumentGenerator, GeneratedDocument, GenerationRequest, UnconfiguredGenerator,
};
use crate::config::Settings;
use crate::error::{GavelError, Result};
use crate::validator::{self, Validator};
use crate::{lifecycle, roi};

const ASSET: &str = "auction_asset";
const DOCUMENT: &str = "document";

#[derive(Debug, Clone, Copy)]
struct PageLimits {
    default_size: u32,
    max_size: u32,
}

impl PageLimits {
    fn apply(self, page: Page) -> Page {
        let page = if page.limit == 0 {
            Page::new(self.default_size, page.offset)
        } else {
            page
        };
        page.clamped(self.max_size)
    }
}

impl From<&Settings> for PageLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            default_size: settings.default_page_size,
            max_size: settings.max_page_size,
        }
    }
}

/// The Gavel service: asset lifecycle, ROI, bids and the rule engine behind
/// one tenant-scoped API. Every operation takes the caller's
/// [`RequestContext`] and fails with [`GavelError::TenantRequired`] before
/// touching the store when it carries no tenant.
pub struct Gavel {
    store: Arc<Mutex<AuctionStore>>,
    auditor: Auditor,
    generator: Arc<dyn DocumentGenerator>,
    pages: PageLimits,
    cancel: Option<Cancellation>,
}

impl Gavel {
    /// Service over `store`, auditing into the same database.
    pub fn new(store: AuctionStore) -> Self {
        Self::with_settings(store, &Settings::default())
    }

    pub fn with_settings(store: AuctionStore, settings: &Settings) -> Self {
        let store = Arc::new(Mutex::new(store));
        let auditor = if settings.audit_enabled {
            Auditor::new(Arc::new(SqliteAuditSink::new(Arc::clone(&store))))
        } else {
            Auditor::disabled()
        };
        Self {
            store,
            auditor,
            generator: Arc::new(UnconfiguredGenerator),
            pages: PageLimits::from(settings),
            cancel: None,
        }
    }

    /// Open the configured database file.
    pub fn open(settings: &Settings) -> Result<Self> {
        let store = AuctionStore::open(
            &settings.db_path,
            StoreOptions {
                busy_timeout: settings.busy_timeout,
            },
        )?;
        tracing::info!(
            path = %settings.db_path.display(),
            env = settings.environment.as_str(),
            "store opened"
        );
        Ok(Self::with_settings(store, settings))
    }

    #[must_use]
    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// A handle on the same store whose operations roll back once `cancel`
    /// is cancelled before their commit point.
    #[must_use]
    pub fn with_cancellation(&self, cancel: Cancellation) -> Self {
        Self {
            store: Arc::clone(&self.store),
            auditor: self.auditor.clone(),
            generator: Arc::clone(&self.generator),
            pages: self.pages,
            cancel: Some(cancel),
        }
    }

    // ── Assets ───────────────────────────────────────────────

    pub fn create_asset(&self, ctx: &RequestContext, draft: NewAsset) -> Result<AssetView> {
        let tenant = ctx.require_tenant()?;
        draft.validate()?;
        let asset_id = AssetId::new(Uuid::new_v4().to_string())?;

        let result = self.write(|tx| lifecycle::create(tx, tenant, asset_id.clone(), draft));
        self.audit(
            ctx,
            tenant,
            AuditAction::AssetCreated,
            &result,
            ASSET,
            asset_id.as_str(),
            json!({}),
        );
        let asset = result?;
        tracing::info!(tenant = %tenant, asset = %asset.id, "asset created");
        Ok(AssetView::from(asset))
    }

    pub fn get_asset(&self, ctx: &RequestContext, asset_id: &AssetId) -> Result<AssetView> {
        let tenant = ctx.require_tenant()?;
        self.read(|store| existing_asset(store, tenant, asset_id))
            .map(AssetView::from)
    }

    pub fn list_assets(&self, ctx: &RequestContext, page: Page) -> Result<Vec<AssetView>> {
        let tenant = ctx.require_tenant()?;
        let page = self.pages.apply(page);
        let assets = self.read(|store| Ok(store.assets(tenant, page)?))?;
        Ok(assets.into_iter().map(AssetView::from).collect())
    }

    /// Advance an asset by exactly one stage. Every attempt is audited with
    /// its `from` and `to` stages.
    pub fn transition_stage(
        &self,
        ctx: &RequestContext,
        asset_id: &AssetId,
        to: Stage,
    ) -> Result<StageChange> {
        let tenant = ctx.require_tenant()?;
        let target =
            ValidationTarget::new(ResourceType::AuctionAsset, asset_id.as_str(), Operation::Transition);

        let mut from = None;
        let mut findings = None;
        let result = self.write(|tx| {
            let asset = lifecycle::load(tx, tenant, asset_id)?;
            from = Some(asset.current_stage);
            asset.current_stage.advance_to(to)?;
            let evaluation = findings.insert(validator::evaluate(tx, tenant, &target)?);
            if !evaluation.allowed() {
                return Err(GavelError::refused(evaluation));
            }
            lifecycle::transition(tx, asset, to)
        });

        if let Some(findings) = &findings {
            self.note_suggestions(ctx, tenant, &target, findings);
        }
        self.audit(
            ctx,
            tenant,
            AuditAction::StageTransition,
            &result,
            ASSET,
            asset_id.as_str(),
            json!({ "from": from.map(Stage::as_str), "to": to.as_str() }),
        );
        match &result {
            Ok(change) => tracing::info!(
                tenant = %tenant,
                asset = %asset_id,
                from = change.previous_stage.as_str(),
                to = to.as_str(),
                "stage advanced"
            ),
            Err(err) => tracing::info!(
                tenant = %tenant,
                asset = %asset_id,
                to = to.as_str(),
                error = %err,
                "stage transition rejected"
            ),
        }
        result
    }

    pub fn update_due_diligence(
        &self,
        ctx: &RequestContext,
        asset_id: &AssetId,
        patch: ChecklistPatch,
    ) -> Result<AssetView> {
        let tenant = ctx.require_tenant()?;
        let result = self.write(|tx| {
            let asset = lifecycle::load(tx, tenant, asset_id)?;
            lifecycle::update_due_diligence(tx, asset, patch)
        });

        let details = match &result {
            Ok(asset) => {
                let assessment = asset.risk_assessment();
                json!({
                    "risk_score": assessment.risk_score,
                    "risk_level": assessment.risk_level,
                })
            }
            Err(_) => json!({}),
        };
        self.audit(
            ctx,
            tenant,
            AuditAction::DueDiligenceUpdated,
            &result,
            ASSET,
            asset_id.as_str(),
            details,
        );
        result.map(AssetView::from)
    }

    pub fn risk(&self, ctx: &RequestContext, asset_id: &AssetId) -> Result<RiskAssessment> {
        let tenant = ctx.require_tenant()?;
        self.read(|store| existing_asset(store, tenant, asset_id))
            .map(|asset| asset.risk_assessment())
    }

    // ── Bids ─────────────────────────────────────────────────

    /// Place a bid if the rule engine allows it. A refused bid writes no row.
    pub fn place_bid(&self, ctx: &RequestContext, asset_id: &AssetId, bid: NewBid) -> Result<Bid> {
        let tenant = ctx.require_tenant()?;
        bid.validate()?;
        let bidder = bid
            .bidder
            .map_or_else(|| ctx.actor.id.to_string(), |b| b.trim().to_owned());
        let target =
            ValidationTarget::new(ResourceType::AuctionAsset, asset_id.as_str(), Operation::PlaceBid);

        let mut findings = None;
        let result = self.write(|tx| {
            let evaluation = findings.insert(validator::evaluate(tx, tenant, &target)?);
            if !evaluation.allowed() {
                return Err(GavelError::refused(evaluation));
            }
            let placed = Bid {
                id: BidId::new(Uuid::new_v4().to_string())?,
                asset_id: asset_id.clone(),
                tenant_id: tenant.clone(),
                bidder,
                amount: bid.amount,
                created_at: now_timestamp(),
            };
            tx.insert_bid(&placed)?;
            Ok(placed)
        });

        if let Some(findings) = &findings {
            self.note_suggestions(ctx, tenant, &target, findings);
        }
        let details = match &result {
            Ok(placed) => json!({ "bid_id": placed.id, "amount": placed.amount }),
            Err(_) => json!({ "amount": bid.amount }),
        };
        self.audit(
            ctx,
            tenant,
            AuditAction::BidPlaced,
            &result,
            ASSET,
            asset_id.as_str(),
            details,
        );
        result
    }

    pub fn list_bids(&self, ctx: &RequestContext, asset_id: &AssetId, page: Page) -> Result<Vec<Bid>> {
        let tenant = ctx.require_tenant()?;
        let page = self.pages.apply(page);
        self.read(|store| {
            existing_asset(store, tenant, asset_id)?;
            Ok(store.bids(tenant, asset_id, page)?)
        })
    }

    // ── ROI ──────────────────────────────────────────────────

    /// The current calculation. `NotFound` until the first update.
    pub fn get_roi(&self, ctx: &RequestContext, asset_id: &AssetId) -> Result<RoiRecord> {
        let tenant = ctx.require_tenant()?;
        self.read(|store| {
            existing_asset(store, tenant, asset_id)?;
            store
                .roi(tenant, asset_id)?
                .ok_or_else(|| GavelError::not_found("roi", asset_id.as_str()))
        })
    }

    pub fn update_roi(
        &self,
        ctx: &RequestContext,
        asset_id: &AssetId,
        patch: &RoiInputsPatch,
    ) -> Result<RoiUpdate> {
        let tenant = ctx.require_tenant()?;
        let result = self.write(|tx| roi::update_inputs(tx, tenant, asset_id, patch));

        let details = match &result {
            Ok(update) => json!({
                "version_number": update.roi.version_number,
                "is_new": update.is_new,
                "roi_percentage": update.roi.outputs.roi_percentage,
            }),
            Err(_) => json!({}),
        };
        self.audit(
            ctx,
            tenant,
            AuditAction::RoiUpdated,
            &result,
            ASSET,
            asset_id.as_str(),
            details,
        );
        result
    }

    /// Snapshots newest first.
    pub fn roi_versions(
        &self,
        ctx: &RequestContext,
        asset_id: &AssetId,
        page: Page,
    ) -> Result<Vec<RoiVersion>> {
        let tenant = ctx.require_tenant()?;
        let page = self.pages.apply(page);
        self.read(|store| {
            existing_asset(store, tenant, asset_id)?;
            Ok(store.roi_versions(tenant, asset_id, page)?)
        })
    }

    // ── Rule engine ──────────────────────────────────────────

    /// Full evaluation including the workflow gate. Read-only.
    pub fn validate(&self, ctx: &RequestContext, target: &ValidationTarget) -> Result<ValidationResult> {
        let tenant = ctx.require_tenant()?;
        let result = self.read(|store| validator::evaluate(store, tenant, target))?;
        self.note_suggestions(ctx, tenant, target, &result);
        Ok(result)
    }

    /// Like [`Gavel::validate`], but any violation becomes an
    /// [`GavelError::Authorization`] refusal.
    pub fn validate_and_enforce(
        &self,
        ctx: &RequestContext,
        target: &ValidationTarget,
    ) -> Result<ValidationResult> {
        let tenant = ctx.require_tenant()?;
        let result = self.validate(ctx, target).and_then(|result| {
            if result.allowed() {
                Ok(result)
            } else {
                Err(GavelError::refused(&result))
            }
        });
        self.audit(
            ctx,
            tenant,
            AuditAction::ValidationEnforced,
            &result,
            resource_label(target.resource_type),
            &target.resource_id,
            json!({ "operation": target.operation }),
        );
        result
    }

    /// Non-blocking guidance for a resource: never violations, never a refusal.
    pub fn suggestions(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Advisory> {
        let tenant = ctx.require_tenant()?;
        let target = ValidationTarget::new(resource_type, resource_id, Operation::General);
        let result = self.read(|store| Validator::new(store).validate(tenant, &target))?;
        self.note_suggestions(ctx, tenant, &target, &result);
        Ok(result.into_advisory())
    }

    /// Validate every source document for generation, stopping at the first
    /// violation, then hand off to the generator.
    pub fn generate_document(
        &self,
        ctx: &RequestContext,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument> {
        let tenant = ctx.require_tenant()?;
        let Some(first) = request.source_document_ids.first() else {
            return Err(GavelError::invalid(
                "source_document_ids",
                "at least one source document is required",
            ));
        };

        let mut evaluated = Vec::new();
        let mut refused_at = first.as_str();
        let gate = self.read(|store| {
            for document_id in &request.source_document_ids {
                refused_at = document_id.as_str();
                let target = ValidationTarget::new(
                    ResourceType::Document,
                    document_id.as_str(),
                    Operation::GenerateDocument,
                );
                let result = validator::evaluate(store, tenant, &target)?;
                let refusal = (!result.allowed()).then(|| GavelError::refused(&result));
                evaluated.push((target, result));
                if let Some(refusal) = refusal {
                    return Err(refusal);
                }
            }
            Ok(())
        });
        for (target, result) in &evaluated {
            self.note_suggestions(ctx, tenant, target, result);
        }

        let sources = json!({ "source_document_ids": request.source_document_ids });
        if let Err(err) = gate {
            let result = Err(err);
            self.audit(
                ctx,
                tenant,
                AuditAction::DocumentGeneration,
                &result,
                DOCUMENT,
                refused_at,
                sources,
            );
            return result;
        }

        // Generation writes nothing here, so it only refuses to start late; a
        // generator already running is not waited on by a timed-out caller.
        let result = self
            .ensure_live()
            .and_then(|()| self.generator.generate(tenant, request).map_err(GavelError::from));
        let resource_id = match &result {
            Ok(generated) => generated.id.as_str(),
            Err(_) => first.as_str(),
        };
        self.audit(
            ctx,
            tenant,
            AuditAction::DocumentGeneration,
            &result,
            DOCUMENT,
            resource_id,
            sources,
        );
        result
    }

    // ── Collaborator-owned state ─────────────────────────────

    /// Record a document's approval status as reported by the document
    /// subsystem. The rule engine never calls this.
    pub fn register_document(&self, ctx: &RequestContext, document: &DocumentStatus) -> Result<()> {
        let tenant = ctx.require_tenant()?;
        self.write(|tx| Ok(tx.upsert_document(tenant, document)?))
    }

    /// Record a workflow gate as reported by the workflow subsystem.
    pub fn set_workflow_block(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: &str,
        block: &WorkflowBlock,
    ) -> Result<()> {
        let tenant = ctx.require_tenant()?;
        if resource_id.trim().is_empty() {
            return Err(GavelError::invalid("resource_id", "must not be empty"));
        }
        self.write(|tx| Ok(tx.set_workflow_block(tenant, resource_type, resource_id, block)?))
    }

    // ── Audit trail ──────────────────────────────────────────

    pub fn audit_events(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: &str,
        page: Page,
    ) -> Result<Vec<StoredAuditEvent>> {
        let tenant = ctx.require_tenant()?;
        let page = self.pages.apply(page);
        // Read-your-writes for this handle's own queued events.
        self.auditor.flush();
        self.read(|store| {
            Ok(store.audit_events(tenant, resource_label(resource_type), resource_id, page)?)
        })
    }

    // ── Plumbing ─────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, AuctionStore> {
        self.store.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(target: OPS_TARGET, "store mutex poisoned; continuing");
            poisoned.into_inner()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&AuctionStore) -> Result<T>) -> Result<T> {
        let store = self.lock();
        f(&store)
    }

    /// Run `f` in one immediate transaction, committing only if it succeeds
    /// and the operation has not been cancelled.
    fn write<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T>) -> Result<T> {
        let mut store = self.lock();
        let tx = store.begin()?;
        let value = f(&tx)?;
        // Returning early drops `tx`, which rolls back.
        self.commit_point()?;
        tx.commit()?;
        Ok(value)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(Cancellation::is_cancelled) {
            return Err(GavelError::Cancelled);
        }
        Ok(())
    }

    /// Past this point the operation runs to completion.
    fn commit_point(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) if !cancel.begin_commit() => {
                tracing::warn!(target: OPS_TARGET, "operation cancelled before commit; rolled back");
                Err(GavelError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    fn note_suggestions(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        target: &ValidationTarget,
        result: &ValidationResult,
    ) {
        let suggestions = result.suggestions();
        if suggestions.is_empty() {
            return;
        }
        for finding in suggestions {
            tracing::info!(
                tenant = %tenant,
                resource_type = target.resource_type.as_str(),
                resource_id = %target.resource_id,
                operation = target.operation.as_str(),
                code = finding.code().as_str(),
                "{}",
                finding.message()
            );
        }
        let codes: Vec<&str> = suggestions.iter().map(|f| f.code().as_str()).collect();
        self.auditor.record(
            ctx,
            tenant,
            AuditEntry {
                action: AuditAction::RuleSuggestion,
                outcome: AuditOutcome::Noted,
                resource_type: resource_label(target.resource_type),
                resource_id: &target.resource_id,
                details: json!({ "operation": target.operation, "codes": codes }),
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn audit<T>(
        &self,
        ctx: &RequestContext,
        tenant: &TenantId,
        action: AuditAction,
        result: &Result<T>,
        resource_type: &str,
        resource_id: &str,
        mut details: serde_json::Value,
    ) {
        let outcome = match result {
            Ok(_) => AuditOutcome::Succeeded,
            Err(GavelError::Authorization { .. } | GavelError::InvalidTransition(_)) => {
                AuditOutcome::Refused
            }
            Err(_) => AuditOutcome::Failed,
        };
        if let (Err(err), Some(map)) = (result, details.as_object_mut()) {
            map.insert("error".to_owned(), json!(err.to_string()));
            if let GavelError::Authorization { codes, .. } = err {
                map.insert("violations".to_owned(), json!(codes));
            }
        }
        self.auditor.record(
            ctx,
            tenant,
            AuditEntry {
                action,
                outcome,
                resource_type,
                resource_id,
                details,
            },
        );
    }
}

fn existing_asset(
    store: &AuctionStore,
    tenant: &TenantId,
    asset_id: &AssetId,
) -> Result<AuctionAsset> {
    store
        .asset(tenant, asset_id)?
        .ok_or_else(|| GavelError::not_found("asset", asset_id.as_str()))
}

const fn resource_label(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Document => DOCUMENT,
        ResourceType::AuctionAsset | ResourceType::AuctionAssetRoi => ASSET,
    }
}
