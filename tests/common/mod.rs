//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};

use gavel_engine::types::{Actor, ActorId, RequestContext, TenantId};
use gavel_engine::{AuctionStore, Gavel, GavelApi, Settings};

pub const TENANT: &str = "tenant-a";

pub fn ctx_for(tenant: &str) -> RequestContext {
    RequestContext::new(
        Actor::new(ActorId::new("analyst-1").unwrap()),
        TenantId::new(tenant).unwrap(),
    )
}

pub fn ctx() -> RequestContext {
    ctx_for(TENANT)
}

/// API over a fresh in-memory store.
pub fn memory_api() -> GavelApi {
    GavelApi::new(
        Gavel::new(AuctionStore::open_in_memory().unwrap()),
        Duration::from_secs(10),
    )
}

/// Settings pointing at a database inside `dir`.
pub fn file_settings(dir: &Path) -> Settings {
    Settings {
        db_path: dir.join("data").join("gavel.db"),
        ..Settings::default()
    }
}

/// Create an asset through the API and return its id.
pub async fn create_asset(api: &GavelApi, title: &str) -> String {
    let response = api.create_asset(ctx(), json!({ "title": title })).await;
    assert_eq!(response.status, 201, "{}", response.body);
    response.body["id"].as_str().unwrap().to_owned()
}

/// Set every checklist category to `status`.
pub async fn set_checklist(api: &GavelApi, asset_id: &str, status: &str) -> Value {
    let item = json!({ "status": status });
    let response = api
        .update_due_diligence(
            ctx(),
            asset_id,
            json!({ "items": {
                "occupancy": item,
                "debts": item,
                "legal_risks": item,
                "zoning": item,
            }}),
        )
        .await;
    assert_eq!(response.status, 200, "{}", response.body);
    response.body
}
