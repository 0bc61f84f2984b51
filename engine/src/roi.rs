//! Versioned ROI persistence.

use gavel_store::{StoreTx, now_timestamp};
use gavel_types::{
    AssetId, RoiInputs, RoiInputsPatch, RoiRecord, RoiUpdate, RoiVersion, TenantId, calculate,
};

use crate::error::{GavelError, Result};

/// Merge `patch` over the current inputs (or zero defaults), recalculate,
/// write the current row and append exactly one snapshot.
///
/// The version check in [`StoreTx::upsert_roi`] guarantees two concurrent
/// updates never both claim the same next version.
pub fn update_inputs(
    tx: &StoreTx<'_>,
    tenant: &TenantId,
    asset_id: &AssetId,
    patch: &RoiInputsPatch,
) -> Result<RoiUpdate> {
    patch.validate()?;
    if tx.asset(tenant, asset_id)?.is_none() {
        return Err(GavelError::not_found("asset", asset_id.as_str()));
    }

    let current = tx.roi(tenant, asset_id)?;
    let previous_version = current.as_ref().map(|roi| roi.version_number);
    let base = current.map(|roi| roi.inputs).unwrap_or_else(RoiInputs::default);
    let inputs = base.merged(patch);
    let outputs = calculate(&inputs);
    if !outputs.is_finite() {
        return Err(GavelError::invalid(
            "roi inputs",
            "amounts are too large to total",
        ));
    }
    let version_number = previous_version.map_or(1, |v| v + 1);
    let now = now_timestamp();

    let roi = RoiRecord {
        asset_id: asset_id.clone(),
        inputs,
        outputs,
        version_number,
        updated_at: now.clone(),
    };
    tx.upsert_roi(tenant, &roi, previous_version)?;
    tx.append_roi_version(
        tenant,
        &RoiVersion {
            asset_id: asset_id.clone(),
            version_number,
            inputs_snapshot: roi.inputs.clone(),
            outputs: roi.outputs.clone(),
            created_at: now,
        },
    )?;

    tracing::debug!(
        tenant = %tenant,
        asset = %asset_id,
        version = version_number,
        roi_percentage = roi.outputs.roi_percentage,
        "roi recalculated"
    );
    Ok(RoiUpdate {
        is_new: previous_version.is_none(),
        roi,
    })
}
