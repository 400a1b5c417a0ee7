//! Seed data script - populates the database with stations, products and
//! opening stock so the transfer screens have something to work with.
//!
//! Run with: cargo run --bin seed-data
//!
//! Safe to re-run: existing stations and products are left alone and
//! opening stock levels are reset to the values below.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, Set,
};
use std::time::Duration;
use tracing::info;

use fuelops_api::{
    entities::{product, station},
    migrator::Migrator,
    services::{
        reconciliation::LedgerKey,
        stock_ledger::{self, Diagnostic},
    },
};
use sea_orm_migration::MigratorTrait;

const STATIONS: &[(i32, &str)] = &[
    (1, "Central Depot"),
    (2, "Northgate Station"),
    (3, "Riverside Station"),
    (4, "Airport Road Station"),
];

const PRODUCTS: &[(i32, &str)] = &[
    (1, "Diesel"),
    (2, "Industrial Oil 40"),
    (3, "Industrial Oil 60"),
    (4, "Petrol"),
];

fn opening_stock() -> Vec<(LedgerKey, Decimal)> {
    vec![
        (LedgerKey::new(1, 1), dec!(12000)),
        (LedgerKey::new(1, 4), dec!(8000)),
        (LedgerKey::new(2, 1), dec!(1500)),
        (LedgerKey::new(3, 2), dec!(400)),
        (LedgerKey::new(3, 3), dec!(250)),
        (LedgerKey::new(4, 4), dec!(900.5)),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== FuelOps Seed Data ===");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://fuelops.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;

    let stations = seed_stations(&db).await?;
    info!("  Created {} stations", stations);

    let products = seed_products(&db).await?;
    info!("  Created {} products", products);

    let diagnostic = Diagnostic {
        message: Some("Opening stock".to_string()),
        remark: None,
    };
    for (key, quantity) in opening_stock() {
        stock_ledger::upsert(&db, key, quantity, &diagnostic).await?;
        info!("  {} = {}", key, quantity);
    }

    info!("Seed complete");
    Ok(())
}

async fn seed_stations(db: &DatabaseConnection) -> Result<usize, DbErr> {
    let mut created = 0;
    for &(id, name) in STATIONS {
        if station::Entity::find_by_id(id).one(db).await?.is_some() {
            continue;
        }
        station::ActiveModel {
            id: Set(id),
            station_name: Set(name.to_string()),
        }
        .insert(db)
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn seed_products(db: &DatabaseConnection) -> Result<usize, DbErr> {
    let mut created = 0;
    for &(id, name) in PRODUCTS {
        if product::Entity::find_by_id(id).one(db).await?.is_some() {
            continue;
        }
        product::ActiveModel {
            id: Set(id),
            pname: Set(name.to_string()),
        }
        .insert(db)
        .await?;
        created += 1;
    }
    Ok(created)
}
