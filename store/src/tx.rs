use rusqlite::{Transaction, params};

use gavel_types::{
    AssetId, AuctionAsset, Bid, DocumentId, DocumentStatus, ResourceType, RoiRecord, RoiVersion,
    Stage, TenantId, WorkflowBlock,
};

use crate::error::{Result, StoreError, is_key_conflict};
use crate::rows;
use crate::sqlite_util::now_timestamp;

/// A write transaction holding the database write lock.
///
/// Writes are compare-and-set against the state the caller read inside the
/// same transaction, so a lost race surfaces as [`StoreError::Conflict`]
/// rather than a silent overwrite.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl<'a> StoreTx<'a> {
    pub(crate) fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn asset(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<Option<AuctionAsset>> {
        rows::load_asset(&self.tx, tenant, asset_id)
    }

    pub fn insert_asset(&self, asset: &AuctionAsset) -> Result<()> {
        let checklist = rows::encode("due diligence checklist", &asset.due_diligence_checklist)?;
        let linked = rows::encode("linked document ids", &asset.linked_document_ids)?;
        self.tx
            .execute(
                "INSERT INTO auction_assets
                    (id, tenant_id, reference, title, current_stage, checklist_json,
                     risk_score, linked_document_ids_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    asset.id.as_str(),
                    asset.tenant_id.as_str(),
                    asset.reference.as_deref(),
                    &asset.title,
                    asset.current_stage.as_str(),
                    checklist,
                    i64::from(asset.risk_score.value()),
                    linked,
                    &asset.created_at,
                    &asset.updated_at,
                ],
            )
            .map_err(|e| conflict_or("asset", asset.id.as_str(), e))?;
        Ok(())
    }

    /// Move `asset_id` from `from` to `to`. Fails with a conflict if the
    /// stored stage is no longer `from`.
    pub fn update_stage(
        &self,
        tenant: &TenantId,
        asset_id: &AssetId,
        from: Stage,
        to: Stage,
        updated_at: &str,
    ) -> Result<()> {
        let changed = self.tx.execute(
            "UPDATE auction_assets SET current_stage = ?1, updated_at = ?2
             WHERE tenant_id = ?3 AND id = ?4 AND current_stage = ?5",
            params![
                to.as_str(),
                updated_at,
                tenant.as_str(),
                asset_id.as_str(),
                from.as_str()
            ],
        )?;
        expect_one(changed, "asset", asset_id.as_str())
    }

    /// Persist the checklist and its derived score together.
    pub fn update_checklist(&self, asset: &AuctionAsset) -> Result<()> {
        let checklist = rows::encode("due diligence checklist", &asset.due_diligence_checklist)?;
        let changed = self.tx.execute(
            "UPDATE auction_assets SET checklist_json = ?1, risk_score = ?2, updated_at = ?3
             WHERE tenant_id = ?4 AND id = ?5",
            params![
                checklist,
                i64::from(asset.risk_score.value()),
                &asset.updated_at,
                asset.tenant_id.as_str(),
                asset.id.as_str(),
            ],
        )?;
        expect_one(changed, "asset", asset.id.as_str())
    }

    pub fn roi(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<Option<RoiRecord>> {
        rows::load_roi(&self.tx, tenant, asset_id)
    }

    /// Write the current ROI row. `previous_version` is the version read
    /// earlier in this transaction, or `None` when no row existed.
    pub fn upsert_roi(
        &self,
        tenant: &TenantId,
        record: &RoiRecord,
        previous_version: Option<u32>,
    ) -> Result<()> {
        let RoiRecord {
            asset_id,
            inputs,
            outputs,
            version_number,
            updated_at,
        } = record;
        let Some(previous) = previous_version else {
            self.tx
                .execute(
                    "INSERT INTO roi_records
                        (asset_id, tenant_id, acquisition_price, taxes, legal_costs,
                         renovation_estimate, expected_resale_value, expected_resale_date,
                         total_cost, net_profit, roi_percentage, break_even_date,
                         version_number, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    params![
                        asset_id.as_str(),
                        tenant.as_str(),
                        inputs.acquisition_price,
                        inputs.taxes,
                        inputs.legal_costs,
                        inputs.renovation_estimate,
                        inputs.expected_resale_value,
                        inputs.expected_resale_date.as_deref(),
                        outputs.total_cost,
                        outputs.net_profit,
                        outputs.roi_percentage,
                        outputs.break_even_date.as_deref(),
                        i64::from(*version_number),
                        updated_at,
                    ],
                )
                .map_err(|e| conflict_or("roi", asset_id.as_str(), e))?;
            return Ok(());
        };

        let changed = self.tx.execute(
            "UPDATE roi_records SET
                acquisition_price = ?1, taxes = ?2, legal_costs = ?3,
                renovation_estimate = ?4, expected_resale_value = ?5,
                expected_resale_date = ?6, total_cost = ?7, net_profit = ?8,
                roi_percentage = ?9, break_even_date = ?10,
                version_number = ?11, updated_at = ?12
             WHERE tenant_id = ?13 AND asset_id = ?14 AND version_number = ?15",
            params![
                inputs.acquisition_price,
                inputs.taxes,
                inputs.legal_costs,
                inputs.renovation_estimate,
                inputs.expected_resale_value,
                inputs.expected_resale_date.as_deref(),
                outputs.total_cost,
                outputs.net_profit,
                outputs.roi_percentage,
                outputs.break_even_date.as_deref(),
                i64::from(*version_number),
                updated_at,
                tenant.as_str(),
                asset_id.as_str(),
                i64::from(previous),
            ],
        )?;
        expect_one(changed, "roi", asset_id.as_str())
    }

    pub fn append_roi_version(&self, tenant: &TenantId, version: &RoiVersion) -> Result<()> {
        let inputs = rows::encode("roi inputs", &version.inputs_snapshot)?;
        let outputs = rows::encode("roi outputs", &version.outputs)?;
        self.tx
            .execute(
                "INSERT INTO roi_versions
                    (asset_id, tenant_id, version_number, inputs_json, outputs_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    version.asset_id.as_str(),
                    tenant.as_str(),
                    i64::from(version.version_number),
                    inputs,
                    outputs,
                    &version.created_at,
                ],
            )
            .map_err(|e| conflict_or("roi version", version.asset_id.as_str(), e))?;
        Ok(())
    }

    pub fn insert_bid(&self, bid: &Bid) -> Result<()> {
        self.tx.execute(
            "INSERT INTO bids (id, asset_id, tenant_id, bidder, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bid.id.as_str(),
                bid.asset_id.as_str(),
                bid.tenant_id.as_str(),
                &bid.bidder,
                bid.amount,
                &bid.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn bid_count(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<u64> {
        rows::count_bids(&self.tx, tenant, asset_id)
    }

    pub fn document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
    ) -> Result<Option<DocumentStatus>> {
        rows::load_document(&self.tx, tenant, document_id)
    }

    pub fn workflow_block(
        &self,
        tenant: &TenantId,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Option<WorkflowBlock>> {
        rows::load_workflow_block(&self.tx, tenant, resource_type, resource_id)
    }

    pub fn upsert_document(&self, tenant: &TenantId, document: &DocumentStatus) -> Result<()> {
        self.tx.execute(
            "INSERT INTO documents (tenant_id, id, title, is_approved, cpo_status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (tenant_id, id) DO UPDATE SET
                title = excluded.title,
                is_approved = excluded.is_approved,
                cpo_status = excluded.cpo_status",
            params![
                tenant.as_str(),
                document.id.as_str(),
                document.title.as_deref(),
                i64::from(document.is_approved),
                &document.cpo_status,
            ],
        )?;
        Ok(())
    }

    pub fn set_workflow_block(
        &self,
        tenant: &TenantId,
        resource_type: ResourceType,
        resource_id: &str,
        block: &WorkflowBlock,
    ) -> Result<()> {
        self.tx.execute(
            "INSERT INTO workflow_blocks (tenant_id, resource_type, resource_id, blocked, reason, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (tenant_id, resource_type, resource_id) DO UPDATE SET
                blocked = excluded.blocked,
                reason = excluded.reason,
                updated_at = excluded.updated_at",
            params![
                tenant.as_str(),
                resource_type.as_str(),
                resource_id,
                i64::from(block.blocked),
                block.reason.as_deref(),
                now_timestamp(),
            ],
        )?;
        Ok(())
    }
}

fn expect_one(changed: usize, entity: &'static str, id: &str) -> Result<()> {
    if changed == 1 {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            entity,
            id: id.to_owned(),
        })
    }
}

fn conflict_or(entity: &'static str, id: &str, err: rusqlite::Error) -> StoreError {
    if is_key_conflict(&err) {
        StoreError::Conflict {
            entity,
            id: id.to_owned(),
        }
    } else {
        StoreError::from(err)
    }
}
