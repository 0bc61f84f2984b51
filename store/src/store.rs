use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior, params};
use serde::Serialize;

use gavel_types::{
    AssetId, AuctionAsset, AuditAction, AuditEvent, AuditOutcome, Bid, DocumentId,
    DocumentStatus, Page, ResourceType, RoiRecord, RoiVersion, TenantId, WorkflowBlock,
};

use crate::error::{Result, StoreError};
use crate::rows;
use crate::sqlite_util::prepare_db_path;
use crate::tx::StoreTx;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a writer waits on a locked database before failing with
    /// [`StoreError::Busy`].
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Stored audit row with its sequence number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAuditEvent {
    pub id: i64,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Tenant-scoped relational store for auction assets and their history.
///
/// Reads take `&self`. Every mutation of asset, ROI or bid rows goes through
/// [`AuctionStore::begin`], which holds the SQLite write lock for the whole
/// transaction.
pub struct AuctionStore {
    pub(crate) db: Connection,
}

impl AuctionStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS auction_assets (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            reference TEXT,
            title TEXT NOT NULL,
            current_stage TEXT NOT NULL,
            checklist_json TEXT NOT NULL,
            risk_score INTEGER NOT NULL CHECK (risk_score BETWEEN 0 AND 100),
            linked_document_ids_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS roi_records (
            asset_id TEXT PRIMARY KEY REFERENCES auction_assets(id),
            tenant_id TEXT NOT NULL,
            acquisition_price REAL NOT NULL,
            taxes REAL NOT NULL,
            legal_costs REAL NOT NULL,
            renovation_estimate REAL NOT NULL,
            expected_resale_value REAL NOT NULL,
            expected_resale_date TEXT,
            total_cost REAL NOT NULL,
            net_profit REAL NOT NULL,
            roi_percentage REAL NOT NULL,
            break_even_date TEXT,
            version_number INTEGER NOT NULL CHECK (version_number >= 1),
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS roi_versions (
            asset_id TEXT NOT NULL REFERENCES auction_assets(id),
            tenant_id TEXT NOT NULL,
            version_number INTEGER NOT NULL CHECK (version_number >= 1),
            inputs_json TEXT NOT NULL,
            outputs_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (asset_id, version_number)
        );

        CREATE TABLE IF NOT EXISTS bids (
            id TEXT PRIMARY KEY,
            asset_id TEXT NOT NULL REFERENCES auction_assets(id),
            tenant_id TEXT NOT NULL,
            bidder TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_events (
            id INTEGER PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            action TEXT NOT NULL,
            outcome TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            details_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        -- Owned by the document subsystem; read here for CPO status.
        CREATE TABLE IF NOT EXISTS documents (
            tenant_id TEXT NOT NULL,
            id TEXT NOT NULL,
            title TEXT,
            is_approved INTEGER NOT NULL DEFAULT 0,
            cpo_status TEXT NOT NULL DEFAULT 'pending',
            PRIMARY KEY (tenant_id, id)
        );

        -- Owned by the workflow subsystem; read here for the block flag.
        CREATE TABLE IF NOT EXISTS workflow_blocks (
            tenant_id TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            blocked INTEGER NOT NULL,
            reason TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tenant_id, resource_type, resource_id)
        );

        CREATE INDEX IF NOT EXISTS idx_assets_tenant
        ON auction_assets(tenant_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_roi_versions_order
        ON roi_versions(asset_id, created_at, version_number);

        CREATE INDEX IF NOT EXISTS idx_bids_asset
        ON bids(tenant_id, asset_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_audit_resource
        ON audit_events(tenant_id, resource_type, resource_id, id);

        CREATE TRIGGER IF NOT EXISTS auction_assets_no_delete
        BEFORE DELETE ON auction_assets
        BEGIN SELECT RAISE(ABORT, 'auction assets are never deleted'); END;

        CREATE TRIGGER IF NOT EXISTS roi_versions_no_update
        BEFORE UPDATE ON roi_versions
        BEGIN SELECT RAISE(ABORT, 'roi_versions is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS roi_versions_no_delete
        BEFORE DELETE ON roi_versions
        BEGIN SELECT RAISE(ABORT, 'roi_versions is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS bids_no_update
        BEFORE UPDATE ON bids
        BEGIN SELECT RAISE(ABORT, 'bids are insert-only'); END;

        CREATE TRIGGER IF NOT EXISTS bids_no_delete
        BEFORE DELETE ON bids
        BEGIN SELECT RAISE(ABORT, 'bids are insert-only'); END;

        CREATE TRIGGER IF NOT EXISTS audit_events_no_update
        BEFORE UPDATE ON audit_events
        BEGIN SELECT RAISE(ABORT, 'audit_events is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS audit_events_no_delete
        BEFORE DELETE ON audit_events
        BEGIN SELECT RAISE(ABORT, 'audit_events is append-only'); END;
    ";

    /// Open or create the store at `path`.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        prepare_db_path(path)?;
        let db = Connection::open(path)?;
        Self::initialize(db, options, true)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Self::initialize(db, StoreOptions::default(), false)
    }

    fn initialize(db: Connection, options: StoreOptions, wal: bool) -> Result<Self> {
        db.busy_timeout(options.busy_timeout)?;
        if wal {
            db.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        db.execute_batch("PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;")?;
        db.execute_batch(Self::SCHEMA)?;
        tracing::debug!(
            busy_timeout_ms = u64::try_from(options.busy_timeout.as_millis()).unwrap_or(u64::MAX),
            "store initialized"
        );
        Ok(Self { db })
    }

    /// Start a write transaction. The write lock is taken immediately, so
    /// concurrent writers queue here instead of racing on stale reads.
    /// Dropping the handle without [`StoreTx::commit`] rolls back.
    pub fn begin(&mut self) -> Result<StoreTx<'_>> {
        let tx = self
            .db
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTx::new(tx))
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn asset(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<Option<AuctionAsset>> {
        rows::load_asset(&self.db, tenant, asset_id)
    }

    pub fn assets(&self, tenant: &TenantId, page: Page) -> Result<Vec<AuctionAsset>> {
        rows::list_assets(&self.db, tenant, page)
    }

    pub fn roi(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<Option<RoiRecord>> {
        rows::load_roi(&self.db, tenant, asset_id)
    }

    /// Snapshots newest first: `created_at DESC, version_number DESC`.
    pub fn roi_versions(
        &self,
        tenant: &TenantId,
        asset_id: &AssetId,
        page: Page,
    ) -> Result<Vec<RoiVersion>> {
        let (limit, offset) = rows::page_params(page);
        let mut stmt = self.db.prepare(
            "SELECT version_number, inputs_json, outputs_json, created_at
             FROM roi_versions WHERE tenant_id = ?1 AND asset_id = ?2
             ORDER BY created_at DESC, version_number DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let mapped = stmt.query_map(
            params![tenant.as_str(), asset_id.as_str(), limit, offset],
            |row| {
                let version: i64 = row.get(0)?;
                let inputs: String = row.get(1)?;
                let outputs: String = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok((version, inputs, outputs, created_at))
            },
        )?;
        let mut versions = Vec::new();
        for row in mapped {
            let (version, inputs, outputs, created_at) = row?;
            versions.push(RoiVersion {
                asset_id: asset_id.clone(),
                version_number: rows::version_from_sql(version)?,
                inputs_snapshot: rows::decode_inputs(&inputs)?,
                outputs: rows::decode_outputs(&outputs)?,
                created_at,
            });
        }
        Ok(versions)
    }

    pub fn bids(&self, tenant: &TenantId, asset_id: &AssetId, page: Page) -> Result<Vec<Bid>> {
        rows::list_bids(&self.db, tenant, asset_id, page)
    }

    pub fn bid_count(&self, tenant: &TenantId, asset_id: &AssetId) -> Result<u64> {
        rows::count_bids(&self.db, tenant, asset_id)
    }

    pub fn document(
        &self,
        tenant: &TenantId,
        document_id: &DocumentId,
    ) -> Result<Option<DocumentStatus>> {
        rows::load_document(&self.db, tenant, document_id)
    }

    pub fn workflow_block(
        &self,
        tenant: &TenantId,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Option<WorkflowBlock>> {
        rows::load_workflow_block(&self.db, tenant, resource_type, resource_id)
    }

    // ── Collaborator-owned rows ──────────────────────────────
    //
    // The document and workflow subsystems own these tables. The methods
    // exist for seeding and tests; the rule engine only reads.

    /// Single-statement convenience over [`StoreTx::upsert_document`].
    pub fn upsert_document(&mut self, tenant: &TenantId, document: &DocumentStatus) -> Result<()> {
        let tx = self.begin()?;
        tx.upsert_document(tenant, document)?;
        tx.commit()
    }

    pub fn set_workflow_block(
        &mut self,
        tenant: &TenantId,
        resource_type: ResourceType,
        resource_id: &str,
        block: &WorkflowBlock,
    ) -> Result<()> {
        let tx = self.begin()?;
        tx.set_workflow_block(tenant, resource_type, resource_id, block)?;
        tx.commit()
    }

    // ── Audit trail ──────────────────────────────────────────

    pub fn append_audit_event(&self, event: &AuditEvent) -> Result<i64> {
        let details = rows::encode("audit details", &event.details)?;
        self.db.execute(
            "INSERT INTO audit_events
                (tenant_id, actor_id, action, outcome, resource_type, resource_id, details_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.tenant_id.as_str(),
                event.actor_id.as_str(),
                event.action.as_str(),
                event.outcome.as_str(),
                &event.resource_type,
                &event.resource_id,
                details,
                &event.created_at,
            ],
        )?;
        Ok(self.db.last_insert_rowid())
    }

    /// Audit rows for one resource, newest first.
    pub fn audit_events(
        &self,
        tenant: &TenantId,
        resource_type: &str,
        resource_id: &str,
        page: Page,
    ) -> Result<Vec<StoredAuditEvent>> {
        const TABLE: &str = "audit_events";
        let (limit, offset) = rows::page_params(page);
        let mut stmt = self.db.prepare(
            "SELECT id, actor_id, action, outcome, details_json, created_at
             FROM audit_events
             WHERE tenant_id = ?1 AND resource_type = ?2 AND resource_id = ?3
             ORDER BY id DESC LIMIT ?4 OFFSET ?5",
        )?;
        let mapped = stmt.query_map(
            params![tenant.as_str(), resource_type, resource_id, limit, offset],
            |row| {
                let id: i64 = row.get(0)?;
                let actor: String = row.get(1)?;
                let action: String = row.get(2)?;
                let outcome: String = row.get(3)?;
                let details: String = row.get(4)?;
                let created_at: String = row.get(5)?;
                Ok((id, actor, action, outcome, details, created_at))
            },
        )?;
        let mut events = Vec::new();
        for row in mapped {
            let (id, actor, action, outcome, details, created_at) = row?;
            let action = AuditAction::parse(&action)
                .ok_or_else(|| StoreError::corrupt(TABLE, "action", &action))?;
            let outcome = AuditOutcome::parse(&outcome)
                .ok_or_else(|| StoreError::corrupt(TABLE, "outcome", &outcome))?;
            let details = serde_json::from_str(&details)
                .map_err(|e| StoreError::corrupt(TABLE, "details_json", e))?;
            let actor_id =
                actor.try_into().map_err(|e| StoreError::corrupt(TABLE, "actor_id", e))?;
            events.push(StoredAuditEvent {
                id,
                event: AuditEvent {
                    tenant_id: tenant.clone(),
                    actor_id,
                    action,
                    outcome,
                    resource_type: resource_type.to_owned(),
                    resource_id: resource_id.to_owned(),
                    details,
                    created_at,
                },
            });
        }
        Ok(events)
    }
}
