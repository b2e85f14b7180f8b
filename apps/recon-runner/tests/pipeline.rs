//! End-to-end runs of the pipeline against an in-memory store.

use chrono::{DateTime, FixedOffset};
use linerecon_core::{DiscrepancyView, LineKey, ReconConfig, ReconState, Row, Source};
use linerecon_db::{Database, DbConfig};
use recon_runner::{pipeline, report, run_recorded, RunState, RunnerConfig, RunnerError, Stage, StatusFile};
use uuid::Uuid;

const T0: &str = "2026-03-02T09:00:00-08:00";
const T1: &str = "2026-03-02T10:00:00-08:00";
const T2: &str = "2026-03-02T11:00:00-08:00";

fn at(ts: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(ts).unwrap()
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

fn shop(order: &str, sku: &str, line: &str, location: &str) -> Row {
    row(&[
        ("shop_order_name", order),
        ("shop_sku", sku),
        ("shop_line_item_id", line),
        ("shop_assigned_location", location),
        ("shop_created_at", "2026-03-01T08:00:00-08:00"),
    ])
}

fn oms(order: &str, sku: &str, location: &str, fulfillment: Option<&str>) -> Row {
    let mut r = row(&[
        ("oms_order_name", order),
        ("oms_product_id", sku),
        ("oms_location", location),
    ]);
    r.set("oms_fulfillment_id", fulfillment.map(str::to_string));
    r
}

fn erp(order: &str, sku: &str, warehouse: &str, status: Option<&str>, preorder: Option<&str>) -> Row {
    let mut r = row(&[
        ("erp_cust_order_num", order),
        ("erp_item_number", sku),
        ("erp_line_warehouse", warehouse),
    ]);
    r.set("erp_warehouse_status", status.map(str::to_string));
    r.set("erp_preorder", preorder.map(str::to_string));
    r
}

fn key(order: &str, sku: &str, location: &str, line: &str) -> LineKey {
    LineKey::new(order, sku, location, line).unwrap()
}

/// One line per interesting state.
///
/// | order | expected state                |
/// |-------|-------------------------------|
/// | #1001 | InstorePickup                 |
/// | #1002 | NoOMSFulfillment              |
/// | #1003 | GoodPreorder                  |
/// | #1004 | CancelOrReroute               |
/// | #1005 | ERPIssueRequiresInvestigation |
/// | #1006 | GWP, excluded from the tally  |
async fn seeded() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let sources = db.sources();

    sources
        .append(
            Source::Storefront,
            &[
                shop("#1001", "ABC", "L1", "100 Downtown"),
                shop("#1002", "ABC", "L2", "Alo Distribution Centers"),
                shop("#1003", "PRE", "L3", "100 Downtown"),
                shop("#1004", "BCK", "L4", "100 Downtown"),
                shop("#1005", "ABC", "L5", "Alo Distribution Centers"),
                shop("#1006", "ALOGWP-TOTE", "L6", "100 Downtown"),
            ],
        )
        .await
        .unwrap();

    sources
        .append(
            Source::Oms,
            &[
                oms("#1001", "ABC", "10100", Some("FO-1")),
                oms("#1003", "PRE", "10100", None),
                oms("#1004", "BCK", "10100", Some("FO-4")),
                // Placeholder line released from store 205.
                oms("#1005", "ABC", "10205", Some("FO-5")),
            ],
        )
        .await
        .unwrap();

    sources
        .append(
            Source::Erp,
            &[
                erp("#1001", "ABC", "AYS100", Some("Ready"), Some("preor")),
                erp("#1003", "PRE", "AYS100", Some("Backorder"), Some("preor")),
                erp("#1004", "BCK", "AYS100", Some("Backorder"), None),
            ],
        )
        .await
        .unwrap();

    db
}

#[tokio::test]
async fn test_full_run_classifies_every_scenario() {
    let db = seeded().await;
    let config = ReconConfig::default();

    let report = pipeline::run(&db, &config, at(T0), Uuid::new_v4()).await.unwrap();

    assert_eq!(report.normalize.written, 6);
    assert_eq!(report.merge.inserted, 6);
    assert_eq!(report.merge.matched_erp, 3);
    assert_eq!(report.states.gwp_excluded, 1);
    assert_eq!(report.states.total, 5);
    for state in [
        ReconState::InstorePickup,
        ReconState::NoOMSFulfillment,
        ReconState::GoodPreorder,
        ReconState::CancelOrReroute,
        ReconState::ERPIssueRequiresInvestigation,
    ] {
        assert_eq!(report.states.count(state), 1, "{}", state);
    }
    assert_eq!(report.states.count(ReconState::Unclassified), 0);

    // #1002, #1005 and the GWP line have no ERP row.
    assert_eq!(report.aging.missing_erp, 3);
    assert_eq!(report.aging.inserted, 3);
}

#[tokio::test]
async fn test_placeholder_line_takes_oms_location() {
    let db = seeded().await;
    pipeline::run(&db, &ReconConfig::default(), at(T0), Uuid::new_v4())
        .await
        .unwrap();

    let released = db
        .merged()
        .get(&key("#1005", "ABC", "AYS205", "L5"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(released.get("match_oms"), Some("1"));
    assert_eq!(released.get("shop_assigned_location"), Some("Alo Distribution Centers"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let db = seeded().await;
    let config = ReconConfig::default();

    pipeline::run(&db, &config, at(T0), Uuid::new_v4()).await.unwrap();
    let merged_before = db.merged().list().await.unwrap();
    let aging_before = db.aging().list().await.unwrap();

    let rerun = pipeline::run(&db, &config, at(T1), Uuid::new_v4()).await.unwrap();
    assert_eq!(rerun.merge.inserted, 0);
    assert_eq!(rerun.merge.updated, 6);
    assert_eq!(rerun.aging.unchanged, 3);
    assert_eq!(rerun.aging.updated, 0);

    assert_eq!(db.merged().list().await.unwrap(), merged_before);
    assert_eq!(db.aging().list().await.unwrap(), aging_before);
    for entry in &aging_before {
        assert_eq!(entry.last_update, T0);
    }
}

#[tokio::test]
async fn test_resolved_and_vanished_lines_leave_the_ledger() {
    let db = seeded().await;
    let config = ReconConfig::default();
    pipeline::run(&db, &config, at(T0), Uuid::new_v4()).await.unwrap();

    // #1005 shows up in the ERP; #1002 disappears from the storefront.
    db.sources()
        .append(Source::Erp, &[erp("#1005", "ABC", "AYS205", Some("Ready"), None)])
        .await
        .unwrap();
    db.sources().clear(Source::Storefront).await.unwrap();
    db.sources()
        .append(
            Source::Storefront,
            &[
                shop("#1001", "ABC", "L1", "100 Downtown"),
                shop("#1003", "PRE", "L3", "100 Downtown"),
                shop("#1004", "BCK", "L4", "100 Downtown"),
                shop("#1005", "ABC", "L5", "Alo Distribution Centers"),
                shop("#1006", "ALOGWP-TOTE", "L6", "100 Downtown"),
            ],
        )
        .await
        .unwrap();

    let report = pipeline::run(&db, &config, at(T2), Uuid::new_v4()).await.unwrap();

    assert_eq!(report.merge.deleted, 1);
    assert!(db
        .merged()
        .get(&key("#1002", "ABC", "Alo Distribution Centers", "L2"))
        .await
        .unwrap()
        .is_none());

    assert_eq!(report.aging.deleted, 2);
    assert_eq!(report.aging.missing_erp, 1);
    let remaining: Vec<LineKey> = db
        .aging()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(remaining, vec![key("#1006", "ALOGWP-TOTE", "AYS100", "L6")]);

    // First-seen time survives the rerun.
    let kept = db
        .merged()
        .get(&key("#1001", "ABC", "AYS100", "L1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.get("created_at"), Some(T0));
}

#[tokio::test]
async fn test_missing_source_fails_normalize_and_keeps_store() {
    let db = seeded().await;
    let config = ReconConfig::default();
    pipeline::run(&db, &config, at(T0), Uuid::new_v4()).await.unwrap();

    db.sources().clear(Source::Erp).await.unwrap();
    let err = pipeline::run(&db, &config, at(T1), Uuid::new_v4())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Normalize);
    assert!(err.is_source_unavailable());
    assert!(err.chain().contains("erp_open_lines"));
    assert_eq!(db.merged().count().await.unwrap(), 6);
    assert_eq!(db.normalized().count().await.unwrap(), 6);
}

#[tokio::test]
async fn test_views_over_merged_lines() {
    let db = seeded().await;
    let config = ReconConfig::default();
    pipeline::run(&db, &config, at(T0), Uuid::new_v4()).await.unwrap();

    let discrepancies = report::view(&db, &config, DiscrepancyView::Discrepancies, at(T0))
        .await
        .unwrap();
    // #1002 and #1005; the GWP line is left out.
    assert_eq!(discrepancies.count, 2);

    let backorders = report::view(&db, &config, DiscrepancyView::Backorders, at(T0))
        .await
        .unwrap();
    assert_eq!(backorders.count, 2);

    let erp = report::view(&db, &config, DiscrepancyView::ErpDiscrepancies, at(T0))
        .await
        .unwrap();
    assert_eq!(erp.count, 1);
    assert_eq!(erp.rows[0].get("shop_order_name"), Some("#1005"));

    let aging = report::aging(&db, at(T1)).await.unwrap();
    assert_eq!(aging.len(), 3);
    assert!(aging.iter().all(|e| e.age_seconds == Some(3600)));
}

#[tokio::test]
async fn test_recorded_run_writes_status() {
    let db = seeded().await;
    let dir = std::env::temp_dir().join(format!("recon-runner-{}", Uuid::new_v4()));
    let status_file = StatusFile::new(dir.join("run_status.json"));
    let config = RunnerConfig::default();

    run_recorded(&db, &config, &status_file).await.unwrap();
    let status = status_file.read().unwrap().unwrap();
    assert_eq!(status.status, RunState::Complete);
    assert!(status.end_time.is_some());
    assert_eq!(status.failed_stage, None);

    db.sources().clear(Source::Oms).await.unwrap();
    let err = run_recorded(&db, &config, &status_file).await.unwrap_err();
    assert!(matches!(err, RunnerError::Pipeline(ref e) if e.stage == Stage::Normalize));

    let status = status_file.read().unwrap().unwrap();
    assert_eq!(status.status, RunState::Failed);
    assert_eq!(status.failed_stage, Some(Stage::Normalize));
    assert!(status.error.unwrap().contains("oms_open_lines"));
}
