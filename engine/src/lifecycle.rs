//! Asset lifecycle: creation, stage transitions and due-diligence updates.
//!
//! Every function runs inside the caller's [`StoreTx`]; nothing here commits.

use gavel_store::{StoreTx, now_timestamp};
use gavel_types::{
    AssetId, AuctionAsset, ChecklistPatch, NewAsset, Stage, StageChange, TenantId,
};

use crate::error::{GavelError, Result};

pub fn create(
    tx: &StoreTx<'_>,
    tenant: &TenantId,
    asset_id: AssetId,
    draft: NewAsset,
) -> Result<AuctionAsset> {
    draft.validate()?;
    let asset = AuctionAsset::new(asset_id, tenant.clone(), draft, &now_timestamp());
    tx.insert_asset(&asset)?;
    Ok(asset)
}

pub fn load(tx: &StoreTx<'_>, tenant: &TenantId, asset_id: &AssetId) -> Result<AuctionAsset> {
    tx.asset(tenant, asset_id)?
        .ok_or_else(|| GavelError::not_found("asset", asset_id.as_str()))
}

/// Advance `asset` to `to`, which must be the immediate successor of its
/// current stage.
pub fn transition(tx: &StoreTx<'_>, asset: AuctionAsset, to: Stage) -> Result<StageChange> {
    let previous_stage = asset.current_stage;
    let to = previous_stage.advance_to(to)?;
    let updated_at = now_timestamp();
    tx.update_stage(&asset.tenant_id, &asset.id, previous_stage, to, &updated_at)?;
    Ok(StageChange {
        asset: AuctionAsset {
            current_stage: to,
            updated_at,
            ..asset
        },
        previous_stage,
    })
}

/// Merge `patch` over the stored checklist and recompute the risk score.
pub fn update_due_diligence(
    tx: &StoreTx<'_>,
    mut asset: AuctionAsset,
    patch: ChecklistPatch,
) -> Result<AuctionAsset> {
    if patch.is_empty() {
        return Err(GavelError::invalid(
            "items",
            "at least one checklist category is required",
        ));
    }
    let checklist = asset.due_diligence_checklist.merged(patch);
    asset.apply_checklist(checklist);
    asset.updated_at = now_timestamp();
    tx.update_checklist(&asset)?;
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_store::AuctionStore;
    use gavel_types::{
        DueDiligenceCategory, DueDiligenceItem, DueDiligenceStatus, RiskLevel,
    };

    fn tenant() -> TenantId {
        TenantId::new("t-1").unwrap()
    }

    fn seeded(store: &mut AuctionStore) -> AuctionAsset {
        let tx = store.begin().unwrap();
        let asset = create(
            &tx,
            &tenant(),
            AssetId::new("a-1").unwrap(),
            NewAsset {
                title: "Apartment 4B".to_owned(),
                ..NewAsset::default()
            },
        )
        .unwrap();
        tx.commit().unwrap();
        asset
    }

    #[test]
    fn create_rejects_blank_title() {
        let mut store = AuctionStore::open_in_memory().unwrap();
        let tx = store.begin().unwrap();
        let err = create(
            &tx,
            &tenant(),
            AssetId::new("a-1").unwrap(),
            NewAsset::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GavelError::Validation(_)));
    }

    #[test]
    fn walks_every_stage_to_terminal() {
        let mut store = AuctionStore::open_in_memory().unwrap();
        let mut asset = seeded(&mut store);
        for next in Stage::ALL.into_iter().skip(1) {
            let tx = store.begin().unwrap();
            let change = transition(&tx, asset, next).unwrap();
            tx.commit().unwrap();
            assert_eq!(change.asset.current_stage, next);
            asset = change.asset;
        }

        let tx = store.begin().unwrap();
        let err = transition(&tx, asset, Stage::F9).unwrap_err();
        assert!(matches!(
            err,
            GavelError::InvalidTransition(gavel_types::InvalidTransition::Terminal { .. })
        ));
    }

    #[test]
    fn skip_and_backward_are_rejected_without_writes() {
        let mut store = AuctionStore::open_in_memory().unwrap();
        let asset = seeded(&mut store);

        let tx = store.begin().unwrap();
        for to in [Stage::F0, Stage::F2, Stage::F9] {
            let err = transition(&tx, asset.clone(), to).unwrap_err();
            let GavelError::InvalidTransition(err) = err else {
                panic!("expected InvalidTransition, got {err:?}");
            };
            assert_eq!(err.from(), Stage::F0);
            assert_eq!(err.to(), to);
        }
        drop(tx);

        let stored = store.asset(&tenant(), &asset.id).unwrap().unwrap();
        assert_eq!(stored.current_stage, Stage::F0);
    }

    #[test]
    fn due_diligence_merges_and_rescores() {
        let mut store = AuctionStore::open_in_memory().unwrap();
        let asset = seeded(&mut store);

        let tx = store.begin().unwrap();
        let patch = ChecklistPatch::default()
            .set(
                DueDiligenceCategory::Occupancy,
                DueDiligenceItem::new(DueDiligenceStatus::Ok),
            )
            .set(
                DueDiligenceCategory::Debts,
                DueDiligenceItem::new(DueDiligenceStatus::Risk).with_notes("IPTU arrears"),
            );
        let updated = update_due_diligence(&tx, asset, patch).unwrap();
        tx.commit().unwrap();

        // ok(0) + risk(25) + pending(15) + pending(15)
        assert_eq!(updated.risk_score.value(), 55);
        assert_eq!(updated.risk_assessment().risk_level, RiskLevel::Medium);

        let stored = store.asset(&tenant(), &updated.id).unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(
            stored
                .due_diligence_checklist
                .item(DueDiligenceCategory::Debts)
                .notes
                .as_deref(),
            Some("IPTU arrears")
        );
    }

    #[test]
    fn empty_patch_is_rejected() {
        let mut store = AuctionStore::open_in_memory().unwrap();
        let asset = seeded(&mut store);
        let tx = store.begin().unwrap();
        let err = update_due_diligence(&tx, asset, ChecklistPatch::default()).unwrap_err();
        assert!(matches!(err, GavelError::Validation(_)));
    }
}
