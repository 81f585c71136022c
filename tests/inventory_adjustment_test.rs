mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::{adjust_input, restock, seed_variant, setup, TEST_THRESHOLD};
use retail_ops_api::{
    entities::{
        inventory_log_entry::{self, LedgerEntryType},
        stock_alert::{self, AlertStatus},
    },
    errors::ServiceError,
    events::Event,
};

#[tokio::test]
async fn first_restock_creates_the_record() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;

    let adjustment = restock(&ctx, store_id, variant.id, 10, "restock-1").await;
    assert_eq!(adjustment.new_quantity, 10);
    assert!(!adjustment.replayed);
    assert!(!adjustment.alert_created);

    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 10);
    assert_eq!(record.low_stock_threshold, TEST_THRESHOLD);

    let entries = inventory_log_entry::Entity::find()
        .filter(inventory_log_entry::Column::InventoryId.eq(record.id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].previous_quantity, 0);
    assert_eq!(entries[0].new_quantity, 10);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Restock.as_str());
}

#[tokio::test]
async fn deduct_without_a_record_is_not_found() {
    let ctx = setup().await;
    let result = ctx
        .inventory
        .adjust_stock(adjust_input(
            Uuid::new_v4(),
            Uuid::new_v4(),
            -1,
            LedgerEntryType::Deduct,
            "deduct-nothing",
        ))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn replay_returns_the_recorded_outcome() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;

    let first = restock(&ctx, store_id, variant.id, 10, "idem-key").await;
    let second = restock(&ctx, store_id, variant.id, 10, "idem-key").await;

    assert!(second.replayed);
    assert_eq!(second.new_quantity, first.new_quantity);
    assert_eq!(second.log_entry_id, first.log_entry_id);

    // Stock only moved once.
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 10);
}

#[tokio::test]
async fn key_reuse_with_differing_payload_conflicts() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    restock(&ctx, store_id, variant.id, 10, "shared-key").await;

    let result = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            7,
            LedgerEntryType::Restock,
            "shared-key",
        ))
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 10);
}

#[tokio::test]
async fn overdraw_fails_and_leaves_quantity_untouched() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    restock(&ctx, store_id, variant.id, 3, "seed").await;

    let result = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -5,
            LedgerEntryType::Deduct,
            "overdraw",
        ))
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 3);

    // The failed adjustment left no ledger entry.
    let orphan = inventory_log_entry::Entity::find()
        .filter(inventory_log_entry::Column::IdempotencyKey.eq("overdraw"))
        .one(ctx.db.as_ref())
        .await
        .unwrap();
    assert!(orphan.is_none());
}

#[tokio::test]
async fn alert_fires_exactly_at_the_threshold() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;

    // Above the threshold: 10 - 4 = 6 > 5, no alert.
    let above = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -4,
            LedgerEntryType::Deduct,
            "to-six",
        ))
        .await
        .unwrap();
    assert!(!above.alert_created);

    // At the threshold: 6 - 1 = 5 == 5, alert.
    let at = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -1,
            LedgerEntryType::Deduct,
            "to-five",
        ))
        .await
        .unwrap();
    assert!(at.alert_created);

    let alerts = stock_alert::Entity::find()
        .filter(stock_alert::Column::InventoryId.eq(at.inventory_id))
        .all(ctx.db.as_ref())
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].quantity_at_trigger, 5);
    assert_eq!(alerts[0].threshold, TEST_THRESHOLD);
    assert_eq!(alerts[0].status, AlertStatus::Active.as_str());
}

#[tokio::test]
async fn active_alert_suppresses_duplicates_until_acknowledged() {
    let mut ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    restock(&ctx, store_id, variant.id, 6, "seed").await;

    let first = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -2,
            LedgerEntryType::Deduct,
            "first-cross",
        ))
        .await
        .unwrap();
    assert!(first.alert_created);

    // Still below threshold with an Active alert: suppressed.
    let second = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -1,
            LedgerEntryType::Deduct,
            "second-cross",
        ))
        .await
        .unwrap();
    assert!(!second.alert_created);

    // Acknowledging re-arms the record.
    let alert = first.alert.expect("alert model on fresh adjustment");
    ctx.alerts.acknowledge_alert(alert.id).await.unwrap();
    let third = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -1,
            LedgerEntryType::Deduct,
            "third-cross",
        ))
        .await
        .unwrap();
    assert!(third.alert_created);

    // Both alerts were announced on the event channel.
    let mut alert_events = 0;
    while let Ok(event) = ctx.events.try_recv() {
        if matches!(event, Event::LowStockAlertTriggered { .. }) {
            alert_events += 1;
        }
    }
    assert_eq!(alert_events, 2);
}

#[tokio::test]
async fn acknowledge_rejects_non_active_alerts() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    let adjustment = restock(&ctx, store_id, variant.id, 2, "seed").await;
    assert!(adjustment.alert_created);

    let alert = adjustment.alert.unwrap();
    ctx.alerts.acknowledge_alert(alert.id).await.unwrap();
    let again = ctx.alerts.acknowledge_alert(alert.id).await;
    assert_matches!(again, Err(ServiceError::InvalidOperation(_)));

    let missing = ctx.alerts.acknowledge_alert(Uuid::new_v4()).await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn threshold_update_applies_to_later_adjustments() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    restock(&ctx, store_id, variant.id, 20, "seed").await;

    let updated = ctx
        .inventory
        .set_low_stock_threshold(store_id, variant.id, 15)
        .await
        .unwrap();
    assert_eq!(updated.low_stock_threshold, 15);

    let crossed = ctx
        .inventory
        .adjust_stock(adjust_input(
            store_id,
            variant.id,
            -5,
            LedgerEntryType::Deduct,
            "cross-custom",
        ))
        .await
        .unwrap();
    assert!(crossed.alert_created);

    let negative = ctx
        .inventory
        .set_low_stock_threshold(store_id, variant.id, -1)
        .await;
    assert_matches!(negative, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn ledger_listing_is_paginated_newest_first() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(10.00)).await;
    let seeded = restock(&ctx, store_id, variant.id, 50, "seed").await;
    for i in 0..3 {
        ctx.inventory
            .adjust_stock(adjust_input(
                store_id,
                variant.id,
                -1,
                LedgerEntryType::Deduct,
                &format!("deduct-{}", i),
            ))
            .await
            .unwrap();
    }

    let (entries, total) = ctx
        .inventory
        .list_ledger(seeded.inventory_id, 1, 2)
        .await
        .unwrap();
    assert_eq!(total, 4);
    assert_eq!(entries.len(), 2);
}
