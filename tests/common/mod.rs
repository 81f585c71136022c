#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use retail_ops_api::{
    entities::{inventory_log_entry::LedgerEntryType, product_variant},
    events::{Event, EventSender},
    migrator::Migrator,
    services::{
        alerts::AlertService,
        inventory::{AdjustStockInput, InventoryService, StockAdjustment},
        notifications::LoggingReceiptService,
        returns::ReturnService,
        sales::SaleService,
    },
};

pub const TEST_THRESHOLD: i32 = 5;

/// In-memory database plus the full service stack. Holds the event receiver
/// so post-commit sends have a live channel.
pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub inventory: InventoryService,
    pub sales: SaleService,
    pub returns: ReturnService,
    pub alerts: AlertService,
    pub events: mpsc::Receiver<Event>,
}

pub async fn setup() -> TestCtx {
    // A single connection keeps every query on the same in-memory database.
    let mut opts = ConnectOptions::new("sqlite::memory:".to_owned());
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    let db = Arc::new(db);

    let (tx, rx) = mpsc::channel(256);
    let sender = EventSender::new(tx);
    let receipts = Arc::new(LoggingReceiptService);

    TestCtx {
        inventory: InventoryService::new(db.clone(), sender.clone(), TEST_THRESHOLD),
        sales: SaleService::new(db.clone(), sender.clone(), receipts, TEST_THRESHOLD),
        returns: ReturnService::new(db.clone(), sender, TEST_THRESHOLD),
        alerts: AlertService::new(db.clone()),
        db,
        events: rx,
    }
}

pub async fn seed_variant(
    db: &DatabaseConnection,
    store_id: Uuid,
    price: Decimal,
) -> product_variant::Model {
    let id = Uuid::new_v4();
    let variant = product_variant::ActiveModel {
        id: Set(id),
        product_id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        sku: Set(format!("SKU-{}", id.simple())),
        name: Set("Test variant".to_string()),
        price: Set(price),
        active: Set(true),
        created_at: Set(Utc::now()),
    };
    variant.insert(db).await.expect("insert variant")
}

pub async fn restock(
    ctx: &TestCtx,
    store_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
    key: &str,
) -> StockAdjustment {
    ctx.inventory
        .adjust_stock(AdjustStockInput {
            store_id,
            variant_id,
            change: quantity,
            entry_type: LedgerEntryType::Restock,
            idempotency_key: key.to_string(),
            reason: None,
            reference: None,
            actor: None,
        })
        .await
        .expect("restock")
}

pub fn adjust_input(
    store_id: Uuid,
    variant_id: Uuid,
    change: i32,
    entry_type: LedgerEntryType,
    key: &str,
) -> AdjustStockInput {
    AdjustStockInput {
        store_id,
        variant_id,
        change,
        entry_type,
        idempotency_key: key.to_string(),
        reason: None,
        reference: None,
        actor: None,
    }
}
