//! Return-on-investment inputs, outputs and the pure calculation.

use serde::{Deserialize, Serialize};

use crate::AssetId;
use crate::input::{InputError, non_negative};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiInputs {
    pub acquisition_price: f64,
    pub taxes: f64,
    pub legal_costs: f64,
    pub renovation_estimate: f64,
    pub expected_resale_value: f64,
    pub expected_resale_date: Option<String>,
}

impl RoiInputs {
    /// Overlay the supplied fields. An empty resale date clears it.
    #[must_use]
    pub fn merged(&self, patch: &RoiInputsPatch) -> Self {
        let expected_resale_date = match &patch.expected_resale_date {
            Some(date) if date.trim().is_empty() => None,
            Some(date) => Some(date.trim().to_owned()),
            None => self.expected_resale_date.clone(),
        };
        Self {
            acquisition_price: patch.acquisition_price.unwrap_or(self.acquisition_price),
            taxes: patch.taxes.unwrap_or(self.taxes),
            legal_costs: patch.legal_costs.unwrap_or(self.legal_costs),
            renovation_estimate: patch.renovation_estimate.unwrap_or(self.renovation_estimate),
            expected_resale_value: patch
                .expected_resale_value
                .unwrap_or(self.expected_resale_value),
            expected_resale_date,
        }
    }

    /// Required inputs that still hold their zero default.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.acquisition_price <= 0.0 {
            missing.push("acquisition_price");
        }
        if self.expected_resale_value <= 0.0 {
            missing.push("expected_resale_value");
        }
        missing
    }

    #[must_use]
    pub fn has_resale_date(&self) -> bool {
        self.expected_resale_date
            .as_deref()
            .is_some_and(|date| !date.trim().is_empty())
    }
}

/// Partial ROI update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoiInputsPatch {
    pub acquisition_price: Option<f64>,
    pub taxes: Option<f64>,
    pub legal_costs: Option<f64>,
    pub renovation_estimate: Option<f64>,
    pub expected_resale_value: Option<f64>,
    pub expected_resale_date: Option<String>,
}

impl RoiInputsPatch {
    pub fn validate(&self) -> Result<(), InputError> {
        let amounts = [
            ("acquisition_price", self.acquisition_price),
            ("taxes", self.taxes),
            ("legal_costs", self.legal_costs),
            ("renovation_estimate", self.renovation_estimate),
            ("expected_resale_value", self.expected_resale_value),
        ];
        for (field, value) in amounts {
            if let Some(value) = value {
                non_negative(field, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiOutputs {
    pub total_cost: f64,
    pub net_profit: f64,
    pub roi_percentage: f64,
    pub break_even_date: Option<String>,
}

impl RoiOutputs {
    /// False when the inputs, each finite on its own, total past `f64::MAX`.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.total_cost.is_finite() && self.net_profit.is_finite() && self.roi_percentage.is_finite()
    }
}

#[must_use]
pub fn calculate(inputs: &RoiInputs) -> RoiOutputs {
    let total_cost = inputs.acquisition_price
        + inputs.taxes
        + inputs.legal_costs
        + inputs.renovation_estimate;
    let net_profit = inputs.expected_resale_value - total_cost;
    let roi_percentage = if total_cost > 0.0 {
        round2(net_profit / total_cost * 100.0)
    } else {
        0.0
    };
    let break_even_date = if inputs.has_resale_date() {
        inputs.expected_resale_date.clone()
    } else {
        None
    };
    RoiOutputs {
        total_cost,
        net_profit,
        roi_percentage,
        break_even_date,
    }
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Current ROI row for an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiRecord {
    pub asset_id: AssetId,
    #[serde(flatten)]
    pub inputs: RoiInputs,
    #[serde(flatten)]
    pub outputs: RoiOutputs,
    pub version_number: u32,
    pub updated_at: String,
}

/// Immutable snapshot appended on every recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiVersion {
    pub asset_id: AssetId,
    pub version_number: u32,
    pub inputs_snapshot: RoiInputs,
    pub outputs: RoiOutputs,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiUpdate {
    pub roi: RoiRecord,
    pub is_new: bool,
}
