//! ROI calculation and version history.

use serde_json::json;

use gavel_engine::types::{Page, RoiInputs, calculate};

use crate::common::{create_asset, ctx, memory_api};

#[test]
fn reference_calculation() {
    let outputs = calculate(&RoiInputs {
        acquisition_price: 100_000.0,
        taxes: 5_000.0,
        legal_costs: 3_000.0,
        renovation_estimate: 12_000.0,
        expected_resale_value: 150_000.0,
        expected_resale_date: None,
    });
    assert_eq!(outputs.total_cost, 120_000.0);
    assert_eq!(outputs.net_profit, 30_000.0);
    assert_eq!(outputs.roi_percentage, 25.0);
    assert_eq!(outputs.break_even_date, None);
}

#[tokio::test]
async fn every_update_appends_one_snapshot() {
    let api = memory_api();
    let id = create_asset(&api, "Lot 44").await;

    let patches = [
        json!({ "acquisition_price": 100000, "taxes": 5000 }),
        json!({ "legal_costs": 3000, "renovation_estimate": 12000 }),
        json!({ "expected_resale_value": 150000, "expected_resale_date": "2027-03-31" }),
        json!({ "taxes": 6000 }),
    ];
    for (index, patch) in patches.into_iter().enumerate() {
        let response = api.update_roi(ctx(), &id, patch).await;
        assert_eq!(response.status, 200, "{}", response.body);
        assert_eq!(response.body["roi"]["version_number"], index + 1);
        assert_eq!(response.body["is_new"], index == 0);
    }

    let current = api.get_roi(ctx(), &id).await;
    assert_eq!(current.body["acquisition_price"], 100_000.0);
    assert_eq!(current.body["taxes"], 6_000.0);
    assert_eq!(current.body["total_cost"], 121_000.0);
    assert_eq!(current.body["net_profit"], 29_000.0);
    assert_eq!(current.body["roi_percentage"], 23.97);
    assert_eq!(current.body["break_even_date"], "2027-03-31");

    let versions = api.roi_versions(ctx(), &id, Page::default()).await;
    let versions = versions.body.as_array().unwrap().clone();
    let numbers: Vec<u64> = versions
        .iter()
        .map(|v| v["version_number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![4, 3, 2, 1]);

    let latest = &versions[0]["inputs_snapshot"];
    for field in [
        "acquisition_price",
        "taxes",
        "legal_costs",
        "renovation_estimate",
        "expected_resale_value",
        "expected_resale_date",
    ] {
        assert_eq!(latest[field], current.body[field], "{field}");
    }
    assert_eq!(versions[3]["inputs_snapshot"]["legal_costs"], 0.0);
}

#[tokio::test]
async fn versions_page_newest_first() {
    let api = memory_api();
    let id = create_asset(&api, "Lot 45").await;
    for price in [1000, 2000, 3000] {
        api.update_roi(ctx(), &id, json!({ "acquisition_price": price }))
            .await;
    }
    let page = api.roi_versions(ctx(), &id, Page::new(1, 1)).await;
    let page = page.body.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["version_number"], 2);
}

#[tokio::test]
async fn invalid_amounts_are_rejected_without_a_version() {
    let api = memory_api();
    let id = create_asset(&api, "Lot 46").await;

    let negative = api
        .update_roi(ctx(), &id, json!({ "taxes": -1 }))
        .await;
    assert_eq!(negative.status, 400);
    let unknown = api
        .update_roi(ctx(), &id, json!({ "discount": 10 }))
        .await;
    assert_eq!(unknown.status, 400);
    // Each amount is finite; their total is not.
    let overflowing = api
        .update_roi(ctx(), &id, json!({ "acquisition_price": 1e308, "taxes": 1e308 }))
        .await;
    assert_eq!(overflowing.status, 400, "{}", overflowing.body);
    assert_eq!(overflowing.body["error"], "validation_error");

    assert_eq!(api.get_roi(ctx(), &id).await.status, 404);
    assert_eq!(
        api.roi_versions(ctx(), &id, Page::default()).await.body,
        json!([])
    );
}

#[tokio::test]
async fn roi_for_unknown_asset_is_not_found() {
    let api = memory_api();
    let response = api
        .update_roi(ctx(), "no-such-asset", json!({ "taxes": 1 }))
        .await;
    assert_eq!(response.status, 404);
}
