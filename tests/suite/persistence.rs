//! On-disk stores: durability across reopen and concurrent writers.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use gavel_engine::types::{
    AssetId, AuditAction, AuditOutcome, NewAsset, Page, ResourceType, RoiInputsPatch, Stage,
};
use gavel_engine::{AuctionStore, Gavel, GavelApi, StoreOptions};

use crate::common::{ctx, file_settings};

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let settings = file_settings(dir.path());

    let asset_id = {
        let gavel = Gavel::open(&settings).unwrap();
        let view = gavel
            .create_asset(
                &ctx(),
                NewAsset {
                    title: "Riverside lot".to_owned(),
                    ..NewAsset::default()
                },
            )
            .unwrap();
        gavel.transition_stage(&ctx(), &view.asset.id, Stage::F1).unwrap();
        view.asset.id
    };

    let reopened = Gavel::open(&settings).unwrap();
    let view = reopened.get_asset(&ctx(), &asset_id).unwrap();
    assert_eq!(view.asset.current_stage, Stage::F1);
    assert_eq!(view.asset.title, "Riverside lot");

    let audit = reopened
        .audit_events(&ctx(), ResourceType::AuctionAsset, asset_id.as_str(), Page::default())
        .unwrap();
    let actions: Vec<AuditAction> = audit
        .iter()
        .map(|e| e.event.action)
        .filter(|action| *action != AuditAction::RuleSuggestion)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::StageTransition, AuditAction::AssetCreated]
    );
    assert!(audit.windows(2).all(|pair| pair[0].id > pair[1].id));
}

#[test]
fn concurrent_writers_never_share_a_version() {
    let dir = tempfile::tempdir().unwrap();
    let settings = file_settings(dir.path());
    let first = Gavel::open(&settings).unwrap();
    let second = Gavel::open(&settings).unwrap();

    let asset_id: AssetId = first
        .create_asset(
            &ctx(),
            NewAsset {
                title: "Contested lot".to_owned(),
                ..NewAsset::default()
            },
        )
        .unwrap()
        .asset
        .id;

    const UPDATES: u32 = 5;
    thread::scope(|scope| {
        for (worker, gavel) in [&first, &second].into_iter().enumerate() {
            let asset_id = &asset_id;
            scope.spawn(move || {
                for round in 0..UPDATES {
                    let patch = RoiInputsPatch {
                        acquisition_price: Some(f64::from(1_000 * (worker as u32 + 1) + round)),
                        ..RoiInputsPatch::default()
                    };
                    gavel.update_roi(&ctx(), asset_id, &patch).unwrap();
                }
            });
        }
    });

    let versions = first
        .roi_versions(&ctx(), &asset_id, Page::new(100, 0))
        .unwrap();
    let mut numbers: Vec<u32> = versions.iter().map(|v| v.version_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=2 * UPDATES).collect::<Vec<_>>());
    assert_eq!(
        second.get_roi(&ctx(), &asset_id).unwrap().version_number,
        2 * UPDATES
    );
}

#[test]
fn disabled_audit_leaves_no_trail() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = file_settings(dir.path());
    settings.audit_enabled = false;

    let gavel = Gavel::open(&settings).unwrap();
    let view = gavel
        .create_asset(
            &ctx(),
            NewAsset {
                title: "Quiet lot".to_owned(),
                ..NewAsset::default()
            },
        )
        .unwrap();
    let audit = gavel
        .audit_events(&ctx(), ResourceType::AuctionAsset, view.asset.id.as_str(), Page::default())
        .unwrap();
    assert!(audit.is_empty());
}

#[tokio::test]
async fn timed_out_bid_is_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = file_settings(dir.path());
    settings.operation_timeout = Duration::from_millis(100);
    let api = GavelApi::open(&settings).unwrap();
    let gavel = api.gavel();

    let asset_id = gavel
        .create_asset(
            &ctx(),
            NewAsset {
                title: "Held lot".to_owned(),
                ..NewAsset::default()
            },
        )
        .unwrap()
        .asset
        .id;
    gavel.transition_stage(&ctx(), &asset_id, Stage::F1).unwrap();

    // Another connection holds the write lock well past the deadline.
    let (locked, wait_locked) = mpsc::channel();
    let db_path = settings.db_path.clone();
    let holder = thread::spawn(move || {
        let mut other = AuctionStore::open(
            &db_path,
            StoreOptions {
                busy_timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        let tx = other.begin().unwrap();
        locked.send(()).unwrap();
        thread::sleep(Duration::from_millis(600));
        drop(tx);
    });
    wait_locked.recv().unwrap();

    let response = api
        .place_bid(ctx(), asset_id.as_str(), json!({ "amount": 500 }))
        .await;
    assert_eq!(response.status, 504, "{}", response.body);
    assert_eq!(response.body["error"], "timeout");
    holder.join().unwrap();

    // The abandoned worker finishes once the lock is released; its audit
    // event marks the point where it gave up.
    let deadline = Instant::now() + Duration::from_secs(10);
    let attempt = loop {
        let attempts: Vec<_> = gavel
            .audit_events(&ctx(), ResourceType::AuctionAsset, asset_id.as_str(), Page::default())
            .unwrap()
            .into_iter()
            .filter(|stored| stored.event.action == AuditAction::BidPlaced)
            .collect();
        if let Some(stored) = attempts.into_iter().next() {
            break stored.event;
        }
        assert!(Instant::now() < deadline, "bid attempt never finished");
        thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(attempt.outcome, AuditOutcome::Failed);
    assert!(
        attempt.details["error"]
            .as_str()
            .is_some_and(|error| error.contains("cancelled")),
        "{}",
        attempt.details
    );
    assert!(gavel.list_bids(&ctx(), &asset_id, Page::default()).unwrap().is_empty());
}
