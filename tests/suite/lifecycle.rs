//! Stage state machine and due-diligence risk, end to end through the API.

use serde_json::json;

use gavel_engine::types::{Page, Stage};

use crate::common::{create_asset, ctx, ctx_for, memory_api, set_checklist};

#[tokio::test]
async fn walks_every_stage_in_order() {
    let api = memory_api();
    let id = create_asset(&api, "Apartment 302").await;

    for pair in Stage::ALL.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let response = api
            .transition(ctx(), &id, json!({ "to_stage": to.as_str() }))
            .await;
        assert_eq!(response.status, 200, "{}", response.body);
        assert_eq!(response.body["previous_stage"], from.as_str());
        assert_eq!(response.body["to_stage"], to.as_str());
    }

    let shown = api.get_asset(ctx(), &id).await;
    assert_eq!(shown.body["current_stage"], "F9");
}

#[tokio::test]
async fn only_the_successor_is_reachable() {
    let api = memory_api();
    let id = create_asset(&api, "House").await;

    for to in Stage::ALL.into_iter().filter(|s| *s != Stage::F1) {
        let response = api
            .transition(ctx(), &id, json!({ "to_stage": to.as_str() }))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "invalid_transition");
        assert_eq!(response.body["from"], "F0");
        assert_eq!(response.body["to"], to.as_str());
    }

    let shown = api.get_asset(ctx(), &id).await;
    assert_eq!(shown.body["current_stage"], "F0");
}

#[tokio::test]
async fn terminal_stage_rejects_everything() {
    let api = memory_api();
    let id = create_asset(&api, "Plot").await;
    for to in Stage::ALL.into_iter().skip(1) {
        let response = api
            .transition(ctx(), &id, json!({ "to_stage": to.as_str() }))
            .await;
        assert_eq!(response.status, 200);
    }

    for to in Stage::ALL {
        let response = api
            .transition(ctx(), &id, json!({ "to_stage": to.as_str() }))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["from"], "F9");
    }
}

#[tokio::test]
async fn checklist_drives_risk() {
    let api = memory_api();
    let id = create_asset(&api, "Store front").await;

    let created = api.risk(ctx(), &id).await;
    assert_eq!(
        created.body,
        json!({ "risk_score": 0, "risk_level": "LOW", "bidding_disabled": false })
    );

    let all_ok = set_checklist(&api, &id, "ok").await;
    assert_eq!(all_ok["risk_score"], 0);
    assert_eq!(all_ok["risk_level"], "LOW");
    assert_eq!(all_ok["bidding_disabled"], false);

    let all_risk = set_checklist(&api, &id, "risk").await;
    assert_eq!(all_risk["risk_score"], 100);
    assert_eq!(all_risk["risk_level"], "HIGH");
    assert_eq!(all_risk["bidding_disabled"], true);

    let partial = api
        .update_due_diligence(
            ctx(),
            &id,
            json!({ "items": { "occupancy": { "status": "ok" }, "debts": { "status": "pending" } } }),
        )
        .await;
    // ok + pending + risk + risk
    assert_eq!(partial.body["risk_score"], 65);
    assert_eq!(partial.body["risk_level"], "MEDIUM");
    assert_eq!(partial.body["due_diligence_checklist"]["zoning"]["status"], "risk");
}

#[tokio::test]
async fn empty_checklist_update_is_rejected() {
    let api = memory_api();
    let id = create_asset(&api, "Garage").await;
    let response = api
        .update_due_diligence(ctx(), &id, json!({ "items": {} }))
        .await;
    assert_eq!(response.status, 400);

    let unknown = api
        .update_due_diligence(ctx(), &id, json!({ "items": { "roof": { "status": "ok" } } }))
        .await;
    assert_eq!(unknown.status, 400);
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let api = memory_api();
    let id = create_asset(&api, "Warehouse").await;

    let other = ctx_for("tenant-b");
    assert_eq!(api.get_asset(other.clone(), &id).await.status, 404);
    assert_eq!(
        api.transition(other.clone(), &id, json!({ "to_stage": "F1" }))
            .await
            .status,
        404
    );
    let listed = api.list_assets(other, Page::default()).await;
    assert_eq!(listed.body, json!([]));

    let own = api.list_assets(ctx(), Page::default()).await;
    assert_eq!(own.body.as_array().unwrap().len(), 1);
}
