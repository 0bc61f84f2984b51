//! Rule engine enforcement: bids, document generation, workflow gates and
//! advisory suggestions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use gavel_engine::types::{Page, TenantId};
use gavel_engine::{
    AuctionStore, DocumentGenerator, Gavel, GavelApi, GeneratedDocument, GenerationRequest,
    GeneratorError,
};

use crate::common::{create_asset, ctx, memory_api, set_checklist};

#[derive(Default)]
struct CountingGenerator(AtomicUsize);

impl DocumentGenerator for CountingGenerator {
    fn generate(
        &self,
        _tenant: &TenantId,
        request: &GenerationRequest,
    ) -> Result<GeneratedDocument, GeneratorError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedDocument {
            id: format!("generated-{n}"),
            source_document_ids: request.source_document_ids.clone(),
        })
    }
}

fn codes(findings: &Value) -> Vec<String> {
    findings
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["code"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn high_risk_blocks_bids_without_writing() {
    let api = memory_api();
    let id = create_asset(&api, "Penthouse").await;

    let first = api.place_bid(ctx(), &id, json!({ "amount": 90000 })).await;
    assert_eq!(first.status, 201, "{}", first.body);

    set_checklist(&api, &id, "risk").await;
    let refused = api.place_bid(ctx(), &id, json!({ "amount": 95000 })).await;
    assert_eq!(refused.status, 403);
    assert_eq!(refused.body["violations"], json!(["VIOLATION_RISK_BLOCK_ACTIVE"]));

    let bids = api.list_bids(ctx(), &id, Page::default()).await;
    assert_eq!(bids.body.as_array().unwrap().len(), 1);

    let report = api
        .validate(
            ctx(),
            json!({ "resource_type": "auction_asset", "resource_id": id, "operation": "place_bid" }),
        )
        .await;
    assert_eq!(report.body["allowed"], false);
    assert_eq!(codes(&report.body["violations"]), ["VIOLATION_RISK_BLOCK_ACTIVE"]);

    let audit = api
        .audit_events(ctx(), "auction_asset", &id, Page::default())
        .await;
    let refusals: Vec<&Value> = audit
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["action"] == "bid_placed" && e["outcome"] == "refused")
        .collect();
    assert_eq!(refusals.len(), 1);
    assert_eq!(refusals[0]["actor_id"], "analyst-1");
}

#[tokio::test]
async fn medium_risk_allows_bids() {
    let api = memory_api();
    let id = create_asset(&api, "Duplex").await;
    // Fresh checklist is all pending: 60, MEDIUM.
    api.update_due_diligence(ctx(), &id, json!({ "items": { "zoning": { "status": "pending" } } }))
        .await;
    let risk = api.risk(ctx(), &id).await;
    assert_eq!(risk.body["risk_level"], "MEDIUM");

    let placed = api.place_bid(ctx(), &id, json!({ "amount": 1 })).await;
    assert_eq!(placed.status, 201);
}

#[tokio::test]
async fn validate_is_idempotent() {
    let api = memory_api();
    let id = create_asset(&api, "Cottage").await;
    api.update_roi(ctx(), &id, json!({ "acquisition_price": 200000, "expected_resale_value": 150000 }))
        .await;
    let body = json!({ "resource_type": "auction_asset", "resource_id": id });

    let first = api.validate(ctx(), body.clone()).await;
    let second = api.validate(ctx(), body).await;
    assert_eq!(first, second);
    assert_eq!(first.body["allowed"], true);
    assert_eq!(
        codes(&first.body["completeness"]),
        ["INCOMPLETE_DUE_DILIGENCE"]
    );
    assert_eq!(
        codes(&first.body["inconsistencies"]),
        ["INCONSISTENT_ROI_NEGATIVE_PROFIT"]
    );
    assert_eq!(
        first.body["inconsistencies"][0]["params"]["net_profit"],
        "-50000.00"
    );
}

#[tokio::test]
async fn unapproved_source_stops_generation() {
    let generator = Arc::new(CountingGenerator::default());
    let gavel =
        Gavel::new(AuctionStore::open_in_memory().unwrap()).with_generator(generator.clone());
    let api = GavelApi::new(gavel, Duration::from_secs(10));

    let register = |id: &str, cpo: &str| {
        json!({ "id": id, "title": "Edital", "is_approved": cpo == "approved", "cpo_status": cpo })
    };
    assert_eq!(api.register_document(ctx(), register("doc-1", "pending")).await.status, 200);
    assert_eq!(api.register_document(ctx(), register("doc-2", "approved")).await.status, 200);

    let refused = api
        .generate_document(ctx(), json!({ "source_document_ids": ["doc-2", "doc-1"] }))
        .await;
    assert_eq!(refused.status, 403);
    assert_eq!(refused.body["violations"], json!(["VIOLATION_CPO_NOT_APPROVED"]));
    assert_eq!(generator.0.load(Ordering::SeqCst), 0);

    let generated = api
        .generate_document(ctx(), json!({ "source_document_ids": ["doc-2"] }))
        .await;
    assert_eq!(generated.status, 201);
    assert_eq!(generated.body["id"], "generated-0");
    assert_eq!(generator.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn workflow_block_gates_until_cleared() {
    let api = memory_api();
    let id = create_asset(&api, "Barn").await;

    let blocked = api
        .set_workflow_block(
            ctx(),
            "auction_asset",
            &id,
            json!({ "blocked": true, "reason": "court suspension" }),
        )
        .await;
    assert_eq!(blocked.status, 200);

    let refused = api.transition(ctx(), &id, json!({ "to_stage": "F1" })).await;
    assert_eq!(refused.status, 403);
    assert_eq!(refused.body["violations"], json!(["VIOLATION_WORKFLOW_BLOCK_ACTIVE"]));
    let bid = api.place_bid(ctx(), &id, json!({ "amount": 10 })).await;
    assert_eq!(bid.status, 403);

    api.set_workflow_block(ctx(), "auction_asset", &id, json!({ "blocked": false, "reason": null }))
        .await;
    let advanced = api.transition(ctx(), &id, json!({ "to_stage": "F1" })).await;
    assert_eq!(advanced.status, 200);
}

#[tokio::test]
async fn suggestions_are_advisory_only() {
    let api = memory_api();
    let id = create_asset(&api, "Kiosk").await;
    set_checklist(&api, &id, "risk").await;
    api.set_workflow_block(ctx(), "auction_asset", &id, json!({ "blocked": true, "reason": null }))
        .await;

    let response = api.suggestions(ctx(), "auction_asset", &id).await;
    assert_eq!(response.status, 200);
    let body = response.body.as_object().unwrap();
    assert!(!body.contains_key("violations"));
    assert!(!body.contains_key("allowed"));
    assert_eq!(
        codes(&response.body["suggestions"]),
        [
            "SUGGEST_COMPLETE_DUE_DILIGENCE",
            "SUGGEST_ADD_BREAK_EVEN_DATE",
            "SUGGEST_LINK_DOCUMENTS"
        ]
    );

    let enforced = api
        .validate_and_enforce(
            ctx(),
            json!({ "resource_type": "auction_asset", "resource_id": id }),
        )
        .await;
    assert_eq!(enforced.status, 403);
    assert_eq!(enforced.body["violations"], json!(["VIOLATION_WORKFLOW_BLOCK_ACTIVE"]));
}
