//! Store-level tests against an in-memory database.
//!
//! Each test drives the repositories the way the runner does: snapshot the
//! sources, plan in linerecon-core, apply here.

use chrono::{DateTime, FixedOffset};
use linerecon_core::aging::plan_aging_sync;
use linerecon_core::schema::{aging_schema, merged_schema, AGING_TABLE};
use linerecon_core::{
    normalize_lines, plan_merge, AgingSummary, LineKey, MergeSummary, ReconConfig, Row, Source,
};
use linerecon_db::migrations::table_columns;
use linerecon_db::{ensure_table_schema, Database, DbConfig, DbError};

const T0: &str = "2026-03-02T09:00:00-08:00";
const T1: &str = "2026-03-02T10:00:00-08:00";
const T2: &str = "2026-03-02T11:00:00-08:00";
const T3: &str = "2026-03-02T12:00:00-08:00";

fn at(ts: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(ts).unwrap()
}

fn row(pairs: &[(&str, &str)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

fn shop(order: &str, sku: &str, line: &str, location: &str, quantity: &str) -> Row {
    row(&[
        ("shop_order_name", order),
        ("shop_sku", sku),
        ("shop_line_item_id", line),
        ("shop_assigned_location", location),
        ("shop_created_at", "2026-03-01T08:00:00-08:00"),
        ("shop_ordered_quantity", quantity),
    ])
}

fn shipped_key() -> LineKey {
    LineKey::new("#1001", "ABC", "AYS100", "L1").unwrap()
}

fn missing_key() -> LineKey {
    LineKey::new("#1002", "DEF", "Alo Distribution Centers", "L2").unwrap()
}

/// One line matched everywhere, one placeholder line nobody else has.
async fn seeded() -> Database {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let sources = db.sources();
    sources
        .append(
            Source::Storefront,
            &[
                shop("#1001", "ABC", "L1", "100 Downtown", "1"),
                shop("#1002", "DEF", "L2", "Alo Distribution Centers", "1"),
            ],
        )
        .await
        .unwrap();
    sources
        .append(
            Source::Oms,
            &[row(&[
                ("oms_order_name", "#1001"),
                ("oms_product_id", "ABC"),
                ("oms_location", "10100"),
                ("oms_fulfillment_id", "FO-1"),
            ])],
        )
        .await
        .unwrap();
    sources
        .append(
            Source::Erp,
            &[row(&[
                ("erp_cust_order_num", "#1001"),
                ("erp_item_number", "ABC"),
                ("erp_line_warehouse", "AYS100"),
                ("erp_warehouse_status", "Ready"),
            ])],
        )
        .await
        .unwrap();
    db
}

async fn merge(db: &Database, now: &str) -> MergeSummary {
    let config = ReconConfig::default();
    let shop = db.sources().snapshot(Source::Storefront).await.unwrap();
    let oms = db.sources().snapshot(Source::Oms).await.unwrap();
    let erp = db.sources().snapshot(Source::Erp).await.unwrap();

    let normalization = normalize_lines(&shop, &oms, &erp, &config);
    db.normalized().replace_all(&normalization).await.unwrap();

    let (columns, lines) = db.normalized().list().await.unwrap();
    let existing = db.merged().created_at_index().await.unwrap();
    let plan = plan_merge(
        &lines,
        merged_schema(&columns, &oms.columns, &erp.columns),
        &oms,
        &erp,
        &existing,
        at(now),
        &config.location,
    );
    db.merged().apply(&plan).await.unwrap()
}

async fn age(db: &Database, now: &str) -> AgingSummary {
    let merged = db.merged().list().await.unwrap();
    let ledger = db.aging().ledger().await.unwrap();
    let plan = plan_aging_sync(&merged, &ledger, at(now));
    db.aging().apply(&plan).await.unwrap()
}

#[tokio::test]
async fn test_empty_source_is_unavailable() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let err = db.sources().snapshot(Source::Erp).await.unwrap_err();
    assert!(matches!(err, DbError::SourceUnavailable { ref table, .. } if table == "erp_open_lines"));
    assert_eq!(db.sources().count(Source::Erp).await.unwrap(), 0);
}

#[tokio::test]
async fn test_snapshot_prefixes_collaborator_columns() {
    let db = seeded().await;
    db.sources()
        .append(
            Source::Oms,
            &[row(&[
                ("oms_order_name", "#1003"),
                ("oms_product_id", "XYZ"),
                ("line_status", "RELEASED"),
            ])],
        )
        .await
        .unwrap();

    let oms = db.sources().snapshot(Source::Oms).await.unwrap();
    assert!(oms.columns.iter().any(|c| c == "oms_line_status"));
    assert!(!oms.columns.iter().any(|c| c == "line_status"));
    assert_eq!(oms.len(), 2);
}

#[tokio::test]
async fn test_ensure_table_schema_only_adds_columns() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let first = aging_schema(["shop_sku", "erp_warehouse_status"]);
    let change = ensure_table_schema(db.pool(), &first).await.unwrap();
    assert!(!change.created);
    assert_eq!(change.added, vec!["erp_warehouse_status".to_string()]);

    // A later snapshot without the column must not drop it.
    let narrower = aging_schema(["shop_sku"]);
    let change = ensure_table_schema(db.pool(), &narrower).await.unwrap();
    assert!(change.added.is_empty());

    let record = db.schema().get(AGING_TABLE).await.unwrap().unwrap();
    assert_eq!(record.version, 1);
    assert_eq!(record.column_count, 6);

    let tables: Vec<String> = db
        .schema()
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.table_name)
        .collect();
    assert!(tables.contains(&AGING_TABLE.to_string()));
}

#[tokio::test]
async fn test_ensure_table_schema_rejects_newer_store() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    sqlx::query(
        "INSERT INTO schema_registry (table_name, version, column_count, migrated_at) VALUES (?1, 99, 5, ?2)",
    )
    .bind(AGING_TABLE)
    .bind(T0)
    .execute(db.pool())
    .await
    .unwrap();

    let err = ensure_table_schema(db.pool(), &aging_schema([])).await.unwrap_err();
    assert!(matches!(err, DbError::MigrationFailed(_)));
}

#[tokio::test]
async fn test_merge_is_idempotent_and_keeps_created_at() {
    let db = seeded().await;

    let first = merge(&db, T0).await;
    assert_eq!(first.inserted, 2);
    assert_eq!(first.matched_all, 1);
    let before = db.merged().list().await.unwrap();

    let second = merge(&db, T1).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);
    let after = db.merged().list().await.unwrap();
    assert_eq!(before, after);

    let shipped = db.merged().get(&shipped_key()).await.unwrap().unwrap();
    assert_eq!(shipped.get("created_at"), Some(T0));
    assert_eq!(shipped.get("match_all"), Some("1"));
    assert_eq!(shipped.get("oms_fulfillment_id"), Some("FO-1"));

    let missing = db.merged().missing_erp().await.unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].get("shop_order_name"), Some("#1002"));
}

#[tokio::test]
async fn test_merge_keeps_created_at_when_fields_change() {
    let db = seeded().await;
    merge(&db, T0).await;

    db.sources().clear(Source::Storefront).await.unwrap();
    db.sources()
        .append(
            Source::Storefront,
            &[
                shop("#1001", "ABC", "L1", "100 Downtown", "3"),
                shop("#1002", "DEF", "L2", "Alo Distribution Centers", "1"),
            ],
        )
        .await
        .unwrap();
    merge(&db, T1).await;

    let shipped = db.merged().get(&shipped_key()).await.unwrap().unwrap();
    assert_eq!(shipped.get("shop_ordered_quantity"), Some("3"));
    assert_eq!(shipped.get("created_at"), Some(T0));
}

#[tokio::test]
async fn test_merge_deletes_vanished_lines() {
    let db = seeded().await;
    merge(&db, T0).await;

    db.sources().clear(Source::Storefront).await.unwrap();
    db.sources()
        .append(
            Source::Storefront,
            &[shop("#1001", "ABC", "L1", "100 Downtown", "1")],
        )
        .await
        .unwrap();
    let summary = merge(&db, T1).await;

    assert_eq!(summary.deleted, 1);
    assert_eq!(db.merged().count().await.unwrap(), 1);
    assert!(db.merged().get(&missing_key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_aging_clock_moves_only_on_change() {
    let db = seeded().await;
    merge(&db, T0).await;

    let first = age(&db, T0).await;
    assert_eq!(first.missing_erp, 1);
    assert_eq!(first.inserted, 1);
    assert_eq!(db.aging().last_update(&missing_key()).await.unwrap().as_deref(), Some(T0));

    // Nothing changed upstream.
    merge(&db, T1).await;
    let rerun = age(&db, T1).await;
    assert_eq!(rerun.unchanged, 1);
    assert_eq!(rerun.updated, 0);
    assert_eq!(db.aging().last_update(&missing_key()).await.unwrap().as_deref(), Some(T0));

    // One tracked field changes.
    db.sources().clear(Source::Storefront).await.unwrap();
    db.sources()
        .append(
            Source::Storefront,
            &[
                shop("#1001", "ABC", "L1", "100 Downtown", "1"),
                shop("#1002", "DEF", "L2", "Alo Distribution Centers", "2"),
            ],
        )
        .await
        .unwrap();
    merge(&db, T2).await;
    let changed = age(&db, T2).await;
    assert_eq!(changed.updated, 1);
    assert_eq!(db.aging().last_update(&missing_key()).await.unwrap().as_deref(), Some(T2));

    let entry = db.aging().list().await.unwrap().remove(0);
    assert_eq!(entry.fields.get("shop_ordered_quantity"), Some("2"));
}

#[tokio::test]
async fn test_aging_entry_removed_once_erp_matches() {
    let db = seeded().await;
    merge(&db, T0).await;
    age(&db, T0).await;
    assert_eq!(db.aging().count().await.unwrap(), 1);

    db.sources()
        .append(
            Source::Erp,
            &[row(&[
                ("erp_cust_order_num", "#1002"),
                ("erp_item_number", "DEF"),
                ("erp_line_warehouse", "Alo Distribution Centers"),
                ("erp_warehouse_status", "Backorder"),
            ])],
        )
        .await
        .unwrap();
    merge(&db, T3).await;
    let summary = age(&db, T3).await;

    assert_eq!(summary.deleted, 1);
    assert_eq!(db.aging().count().await.unwrap(), 0);
    assert!(db.aging().last_update(&missing_key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_header_with_space_survives_merge() {
    let db = seeded().await;

    db.sources().clear(Source::Erp).await.unwrap();
    db.sources()
        .append(
            Source::Erp,
            &[row(&[
                ("erp_cust_order_num", "#1001"),
                ("erp_item_number", "ABC"),
                ("erp_line_warehouse", "AYS100"),
                ("erp_warehouse_status", "Ready"),
                ("erp_Qty Open", "3"),
            ])],
        )
        .await
        .unwrap();

    let summary = merge(&db, T0).await;
    assert_eq!(summary.inserted, 2);

    let columns = table_columns(db.pool(), "merged_records").await.unwrap();
    assert!(columns.iter().any(|c| c == "erp_Qty Open"));
    let shipped = db.merged().get(&shipped_key()).await.unwrap().unwrap();
    assert_eq!(shipped.get("erp_Qty Open"), Some("3"));
}

#[tokio::test]
async fn test_aging_schema_extended_when_nothing_changed() {
    let db = seeded().await;
    merge(&db, T0).await;
    age(&db, T0).await;

    // A new storefront column, NULL on the line missing from the ERP.
    let mut noted = shop("#1001", "ABC", "L1", "100 Downtown", "1");
    noted.set("shop_note", Some("gift wrap".to_string()));
    let mut missing = shop("#1002", "DEF", "L2", "Alo Distribution Centers", "1");
    missing.set("shop_note", None);
    db.sources().clear(Source::Storefront).await.unwrap();
    db.sources()
        .append(Source::Storefront, &[noted, missing])
        .await
        .unwrap();

    merge(&db, T1).await;
    let rerun = age(&db, T1).await;
    assert_eq!(rerun.unchanged, 1);
    assert_eq!(rerun.updated, 0);

    let columns = table_columns(db.pool(), AGING_TABLE).await.unwrap();
    assert!(columns.iter().any(|c| c == "shop_note"));
    assert_eq!(db.aging().last_update(&missing_key()).await.unwrap().as_deref(), Some(T0));
}

#[tokio::test]
async fn test_entry_without_last_update_is_restamped() {
    let db = seeded().await;
    merge(&db, T0).await;
    age(&db, T0).await;

    sqlx::query("UPDATE aging_entries SET last_update = NULL")
        .execute(db.pool())
        .await
        .unwrap();
    assert_eq!(db.aging().list().await.unwrap().len(), 1);

    let summary = age(&db, T1).await;
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(db.aging().count().await.unwrap(), 1);
    assert_eq!(db.aging().last_update(&missing_key()).await.unwrap().as_deref(), Some(T1));
}
