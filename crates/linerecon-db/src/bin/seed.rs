//! # Seed Data Generator
//!
//! Populates the three source tables with demo order lines for development.
//!
//! ## Usage
//! ```bash
//! # 180 orders (default)
//! cargo run -p linerecon-db --bin seed
//!
//! # Custom amount
//! cargo run -p linerecon-db --bin seed -- --count 1000
//!
//! # Specify database path, replacing existing source rows
//! cargo run -p linerecon-db --bin seed -- --db ./data/recon.db --reset
//! ```
//!
//! ## Generated Lines
//! Orders cycle through one scenario per recon state, so a pipeline run over
//! the seeded store produces every state plus a GWP line:
//!
//! | # | Scenario                       | OMS row        | ERP row                |
//! |---|--------------------------------|----------------|------------------------|
//! | 0 | Good preorder                  | no fulfillment | Backorder, preor       |
//! | 1 | Preorder released as backorder | fulfillment    | Backorder, preor       |
//! | 2 | Cancel or reroute              | fulfillment    | Backorder              |
//! | 3 | Instore pickup                 | fulfillment    | Ready                  |
//! | 4 | Run OE finish                  | fulfillment    | no status              |
//! | 5 | Cross-border (AS) manifested   | fulfillment    | Manifested             |
//! | 6 | DC placeholder, never released | -              | -                      |
//! | 7 | ERP issue                      | fulfillment    | -                      |
//! | 8 | Gift with purchase             | -              | -                      |
//!
//! Storefront `created_at` values step back one hour per order from the
//! current time, so the aging views have lines on both sides of the
//! threshold.

use chrono::{Duration, Utc};
use linerecon_core::{Row, Source};
use linerecon_db::{Database, DbConfig};
use std::env;

/// Storefront locations for released lines, with the matching OMS id.
const STORES: &[(&str, &str, &str)] = &[
    // (storefront name, OMS location id, ERP warehouse)
    ("100 Downtown", "10100", "AYS100"),
    ("205 Westfield Mall", "10205", "AYS205"),
    ("312 Harbor Point", "10312", "AYS312"),
];

const CROSS_BORDER: (&str, &str, &str) = ("AS", "AS", "AS");

const PLACEHOLDER: &str = "Alo Distribution Centers";

const SKUS: &[&str] = &[
    "LEG-7721-BLK-S",
    "LEG-7721-BLK-M",
    "BRA-3310-WHT-S",
    "HOD-5502-GRY-L",
    "TNK-1180-NVY-M",
    "SHO-9004-ESP-8",
];

const GWP_SKU: &str = "ALOGWP-TOTE";

const SCENARIOS: usize = 9;

/// Rows for one seeded order.
#[derive(Default)]
struct Seeded {
    shop: Vec<Row>,
    oms: Vec<Row>,
    erp: Vec<Row>,
}

fn row(pairs: &[(&str, Option<String>)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn text(value: impl Into<String>) -> Option<String> {
    Some(value.into())
}

/// Builds the source rows of order number `index`.
fn generate_order(index: usize, seeded: &mut Seeded) {
    let scenario = index % SCENARIOS;
    let order_name = format!("#{}", 10_000 + index);
    let order_id = format!("{}", 5_400_000_000u64 + index as u64);
    let created_at = (Utc::now() - Duration::hours(index as i64)).to_rfc3339();
    let line_item_id = format!("{}", 14_000_000_000u64 + index as u64);

    let (store, oms_location, warehouse) = match scenario {
        5 => CROSS_BORDER,
        _ => STORES[index % STORES.len()],
    };
    let assigned = match scenario {
        6 => PLACEHOLDER,
        _ => store,
    };
    let sku = match scenario {
        8 => GWP_SKU,
        _ => SKUS[index % SKUS.len()],
    };
    let released = matches!(scenario, 0..=5 | 7);
    let oms_order_number = released.then(|| format!("F{}", 700_000 + index));

    seeded.shop.push(row(&[
        ("shop_order_name", text(&order_name)),
        ("shop_order_id", text(&order_id)),
        ("shop_created_at", text(&created_at)),
        ("shop_oms_order_number", oms_order_number.clone()),
        ("shop_assigned_location", text(assigned)),
        ("shop_line_item_id", text(&line_item_id)),
        ("shop_sku", text(sku)),
        ("shop_ordered_quantity", text("1")),
        ("shop_is_gwp_line", text(if scenario == 8 { "1" } else { "0" })),
    ]));

    if released {
        let fulfillment = match scenario {
            0 => None,
            _ => text(format!("FO-{}", 90_000 + index)),
        };
        seeded.oms.push(row(&[
            ("oms_order_name", text(&order_name)),
            ("oms_product_id", text(sku)),
            ("oms_location", text(oms_location)),
            ("oms_fulfillment_id", fulfillment),
            // Reported unprefixed; snapshots read it back as oms_line_status.
            ("line_status", text("RELEASED")),
        ]));
    }

    let erp = match scenario {
        0 | 1 => Some((text("Backorder"), text("preor"))),
        2 => Some((text("Backorder"), None)),
        3 => Some((text("Ready"), None)),
        4 => Some((None, None)),
        5 => Some((text("Manifested"), None)),
        _ => None,
    };
    if let Some((status, preorder)) = erp {
        seeded.erp.push(row(&[
            ("erp_cust_order_num", text(&order_name)),
            ("erp_item_number", text(sku)),
            ("erp_line_warehouse", text(warehouse)),
            ("erp_warehouse_status", status),
            ("erp_preorder", preorder),
            ("erp_order_number", oms_order_number),
        ]));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 180;
    let mut db_path = String::from("./recon_dev.db");
    let mut reset = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(180);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--reset" => reset = true,
            "--help" | "-h" => {
                println!("Line Recon Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of orders to generate (default: 180)");
                println!("  -d, --db <PATH>    Database file path (default: ./recon_dev.db)");
                println!("      --reset        Clear the source tables first");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Line Recon Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Orders:   {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let sources = db.sources();
    if reset {
        for source in [Source::Storefront, Source::Oms, Source::Erp] {
            let removed = sources.clear(source).await?;
            println!("  Cleared {} rows from {}", removed, source.table());
        }
    }

    let existing = sources.count(Source::Storefront).await?;
    if existing > 0 {
        println!("⚠ Database already has {} storefront lines", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Run with --reset to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut seeded = Seeded::default();
    for index in 0..count {
        generate_order(index, &mut seeded);
    }

    sources.append(Source::Storefront, &seeded.shop).await?;
    sources.append(Source::Oms, &seeded.oms).await?;
    sources.append(Source::Erp, &seeded.erp).await?;

    println!();
    println!(
        "✓ Seeded {} storefront / {} OMS / {} ERP lines in {:?}",
        seeded.shop.len(),
        seeded.oms.len(),
        seeded.erp.len(),
        start.elapsed()
    );
    println!();
    println!("✓ Seed complete! Next: recon-runner --db {} run", db_path);

    Ok(())
}
