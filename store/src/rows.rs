//! Row mapping shared by plain reads and in-transaction reads.

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use gavel_types::{
    AssetId, AuctionAsset, Bid, BidId, DocumentId, DocumentStatus, Page, ResourceType, RiskScore,
    RoiInputs, RoiOutputs, RoiRecord, Stage, TenantId, WorkflowBlock,
};

use crate::error::{Result, StoreError};

pub(crate) fn encode<T: Serialize>(what: &'static str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { what, source })
}

fn decode<T: DeserializeOwned>(table: &'static str, column: &'static str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| StoreError::corrupt(table, column, e))
}

fn id<T>(table: &'static str, column: &'static str, raw: String) -> Result<T>
where
    T: TryFrom<String>,
    T::Error: ToString,
{
    T::try_from(raw).map_err(|e| StoreError::corrupt(table, column, e))
}

pub(crate) fn page_params(page: Page) -> (i64, i64) {
    (i64::from(page.limit), i64::from(page.offset))
}

pub(crate) fn version_from_sql(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|e| StoreError::corrupt("roi_records", "version_number", e))
}

// ── Assets ───────────────────────────────────────────────────

const ASSET_COLUMNS: &str = "id, tenant_id, reference, title, current_stage, checklist_json, \
     risk_score, linked_document_ids_json, created_at, updated_at";

struct AssetRow {
    id: String,
    tenant_id: String,
    reference: Option<String>,
    title: String,
    current_stage: String,
    checklist_json: String,
    risk_score: i64,
    linked_json: String,
    created_at: String,
    updated_at: String,
}

impl AssetRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            reference: row.get(2)?,
            title: row.get(3)?,
            current_stage: row.get(4)?,
            checklist_json: row.get(5)?,
            risk_score: row.get(6)?,
            linked_json: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_asset(self) -> Result<AuctionAsset> {
        const TABLE: &str = "auction_assets";
        let current_stage: Stage = self
            .current_stage
            .parse()
            .map_err(|e| StoreError::corrupt(TABLE, "current_stage", e))?;
        let risk_score = RiskScore::try_from(self.risk_score)
            .map_err(|e| StoreError::corrupt(TABLE, "risk_score", e))?;
        let linked_document_ids: Vec<DocumentId> =
            decode(TABLE, "linked_document_ids_json", &self.linked_json)?;
        Ok(AuctionAsset {
            id: id(TABLE, "id", self.id)?,
            tenant_id: id(TABLE, "tenant_id", self.tenant_id)?,
            reference: self.reference,
            title: self.title,
            current_stage,
            due_diligence_checklist: decode(TABLE, "checklist_json", &self.checklist_json)?,
            risk_score,
            linked_document_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn load_asset(
    db: &Connection,
    tenant: &TenantId,
    asset_id: &AssetId,
) -> Result<Option<AuctionAsset>> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM auction_assets WHERE tenant_id = ?1 AND id = ?2");
    let row = db
        .query_row(&sql, params![tenant.as_str(), asset_id.as_str()], AssetRow::read)
        .optional()?;
    row.map(AssetRow::into_asset).transpose()
}

pub(crate) fn list_assets(db: &Connection, tenant: &TenantId, page: Page) -> Result<Vec<AuctionAsset>> {
    let (limit, offset) = page_params(page);
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM auction_assets WHERE tenant_id = ?1
         ORDER BY created_at DESC, id ASC LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = db.prepare(&sql)?;
    let rows = stmt.query_map(params![tenant.as_str(), limit, offset], AssetRow::read)?;
    let mut assets = Vec::new();
    for row in rows {
        assets.push(row?.into_asset()?);
    }
    Ok(assets)
}

// ── ROI ──────────────────────────────────────────────────────

pub(crate) fn load_roi(
    db: &Connection,
    tenant: &TenantId,
    asset_id: &AssetId,
) -> Result<Option<RoiRecord>> {
    let row = db
        .query_row(
            "SELECT acquisition_price, taxes, legal_costs, renovation_estimate,
                    expected_resale_value, expected_resale_date,
                    total_cost, net_profit, roi_percentage, break_even_date,
                    version_number, updated_at
             FROM roi_records WHERE tenant_id = ?1 AND asset_id = ?2",
            params![tenant.as_str(), asset_id.as_str()],
            |row| {
                let inputs = RoiInputs {
                    acquisition_price: row.get(0)?,
                    taxes: row.get(1)?,
                    legal_costs: row.get(2)?,
                    renovation_estimate: row.get(3)?,
                    expected_resale_value: row.get(4)?,
                    expected_resale_date: row.get(5)?,
                };
                let outputs = RoiOutputs {
                    total_cost: row.get(6)?,
                    net_profit: row.get(7)?,
                    roi_percentage: row.get(8)?,
                    break_even_date: row.get(9)?,
                };
                let version: i64 = row.get(10)?;
                let updated_at: String = row.get(11)?;
                Ok((inputs, outputs, version, updated_at))
            },
        )
        .optional()?;

    let Some((inputs, outputs, version, updated_at)) = row else {
        return Ok(None);
    };
    Ok(Some(RoiRecord {
        asset_id: asset_id.clone(),
        inputs,
        outputs,
        version_number: version_from_sql(version)?,
        updated_at,
    }))
}

pub(crate) fn decode_inputs(raw: &str) -> Result<RoiInputs> {
    decode("roi_versions", "inputs_json", raw)
}

pub(crate) fn decode_outputs(raw: &str) -> Result<RoiOutputs> {
    decode("roi_versions", "outputs_json", raw)
}

// ── Bids ─────────────────────────────────────────────────────

pub(crate) fn count_bids(db: &Connection, tenant: &TenantId, asset_id: &AssetId) -> Result<u64> {
    let count: i64 = db.query_row(
        "SELECT COUNT(*) FROM bids WHERE tenant_id = ?1 AND asset_id = ?2",
        params![tenant.as_str(), asset_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

pub(crate) fn list_bids(
    db: &Connection,
    tenant: &TenantId,
    asset_id: &AssetId,
    page: Page,
) -> Result<Vec<Bid>> {
    let (limit, offset) = page_params(page);
    let mut stmt = db.prepare(
        "SELECT id, bidder, amount, created_at FROM bids
         WHERE tenant_id = ?1 AND asset_id = ?2
         ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4",
    )?;
    let rows = stmt.query_map(
        params![tenant.as_str(), asset_id.as_str(), limit, offset],
        |row| {
            let id: String = row.get(0)?;
            let bidder: String = row.get(1)?;
            let amount: f64 = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok((id, bidder, amount, created_at))
        },
    )?;
    let mut bids = Vec::new();
    for row in rows {
        let (bid_id, bidder, amount, created_at) = row?;
        bids.push(Bid {
            id: id::<BidId>("bids", "id", bid_id)?,
            asset_id: asset_id.clone(),
            tenant_id: tenant.clone(),
            bidder,
            amount,
            created_at,
        });
    }
    Ok(bids)
}

// ── Collaborator state ───────────────────────────────────────

pub(crate) fn load_document(
    db: &Connection,
    tenant: &TenantId,
    document_id: &DocumentId,
) -> Result<Option<DocumentStatus>> {
    let row = db
        .query_row(
            "SELECT title, is_approved, cpo_status FROM documents
             WHERE tenant_id = ?1 AND id = ?2",
            params![tenant.as_str(), document_id.as_str()],
            |row| {
                let title: Option<String> = row.get(0)?;
                let approved: i64 = row.get(1)?;
                let cpo_status: String = row.get(2)?;
                Ok((title, approved != 0, cpo_status))
            },
        )
        .optional()?;
    Ok(row.map(|(title, is_approved, cpo_status)| DocumentStatus {
        id: document_id.clone(),
        title,
        is_approved,
        cpo_status,
    }))
}

pub(crate) fn load_workflow_block(
    db: &Connection,
    tenant: &TenantId,
    resource_type: ResourceType,
    resource_id: &str,
) -> Result<Option<WorkflowBlock>> {
    let row = db
        .query_row(
            "SELECT blocked, reason FROM workflow_blocks
             WHERE tenant_id = ?1 AND resource_type = ?2 AND resource_id = ?3",
            params![tenant.as_str(), resource_type.as_str(), resource_id],
            |row| {
                let blocked: i64 = row.get(0)?;
                let reason: Option<String> = row.get(1)?;
                Ok(WorkflowBlock {
                    blocked: blocked != 0,
                    reason,
                })
            },
        )
        .optional()?;
    Ok(row)
}
