use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_log_entry::{self, Entity as InventoryLogEntry, LedgerEntryType},
        inventory_record::{self, Entity as InventoryRecord},
        stock_alert,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::alerts,
};

/// One quantity-affecting operation. The idempotency key must be unique per
/// logical event: a sale line, a restock batch, a single return or exchange
/// leg.
#[derive(Debug, Clone)]
pub struct AdjustStockInput {
    pub store_id: Uuid,
    pub variant_id: Uuid,
    pub change: i32,
    pub entry_type: LedgerEntryType,
    pub idempotency_key: String,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: Option<String>,
}

/// Outcome of an adjustment, replayed or fresh.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub inventory_id: Uuid,
    pub log_entry_id: Uuid,
    pub new_quantity: i32,
    pub alert_created: bool,
    pub replayed: bool,
    pub alert: Option<stock_alert::Model>,
}

/// Applies one stock adjustment inside the caller's transaction.
///
/// This is the single write path to an inventory record. The sale pipeline
/// and the return machine call it once per line/leg so sibling adjustments
/// of one logical event commit or roll back together.
pub async fn apply_adjustment<C: ConnectionTrait>(
    db: &C,
    input: &AdjustStockInput,
    default_low_stock_threshold: i32,
) -> Result<StockAdjustment, ServiceError> {
    // Replay detection: an existing entry under this key is the recorded
    // outcome, not an error.
    if let Some(existing) = InventoryLogEntry::find()
        .filter(inventory_log_entry::Column::IdempotencyKey.eq(input.idempotency_key.as_str()))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
    {
        if existing.change != input.change || existing.entry_type != input.entry_type.as_str() {
            return Err(ServiceError::Conflict(format!(
                "Idempotency key {} was already used with a different payload",
                input.idempotency_key
            )));
        }
        return Ok(StockAdjustment {
            inventory_id: existing.inventory_id,
            log_entry_id: existing.id,
            new_quantity: existing.new_quantity,
            alert_created: existing.alert_created,
            replayed: true,
            alert: None,
        });
    }

    let record = find_record(db, input.store_id, input.variant_id).await?;
    let record = match record {
        Some(record) => record,
        None if input.entry_type.requires_existing_record() => {
            return Err(ServiceError::NotFound(format!(
                "No inventory record for variant {} in store {}",
                input.variant_id, input.store_id
            )));
        }
        None => create_record(db, input, default_low_stock_threshold).await?,
    };

    let new_quantity = record.quantity + input.change;
    if new_quantity < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "Variant {} has {} on hand; change of {} would go negative",
            input.variant_id, record.quantity, input.change
        )));
    }

    // Compare-and-swap on the quantity read above. A concurrent writer that
    // committed in between leaves zero rows affected and aborts this
    // transaction rather than silently losing its update.
    let update = InventoryRecord::update_many()
        .col_expr(inventory_record::Column::Quantity, Expr::value(new_quantity))
        .col_expr(inventory_record::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_record::Column::Id.eq(record.id))
        .filter(inventory_record::Column::Quantity.eq(record.quantity))
        .exec(db)
        .await
        .map_err(ServiceError::db_error)?;

    if update.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Inventory record {} was modified concurrently",
            record.id
        )));
    }

    let alert = alerts::maybe_trigger_low_stock(db, &record, new_quantity).await?;
    let alert_created = alert.is_some();

    let entry = inventory_log_entry::ActiveModel {
        id: Set(Uuid::new_v4()),
        inventory_id: Set(record.id),
        idempotency_key: Set(input.idempotency_key.clone()),
        change: Set(input.change),
        entry_type: Set(input.entry_type.as_str().to_string()),
        reason: Set(input.reason.clone()),
        reference: Set(input.reference.clone()),
        actor: Set(input.actor.clone()),
        previous_quantity: Set(record.quantity),
        new_quantity: Set(new_quantity),
        alert_created: Set(alert_created),
        created_at: Set(Utc::now()),
    };
    let entry = entry.insert(db).await.map_err(ServiceError::db_error)?;

    info!(
        inventory_id = %record.id,
        entry_type = %input.entry_type,
        change = input.change,
        new_quantity,
        alert_created,
        "Stock adjusted"
    );

    Ok(StockAdjustment {
        inventory_id: record.id,
        log_entry_id: entry.id,
        new_quantity,
        alert_created,
        replayed: false,
        alert,
    })
}

pub(crate) async fn find_record<C: ConnectionTrait>(
    db: &C,
    store_id: Uuid,
    variant_id: Uuid,
) -> Result<Option<inventory_record::Model>, ServiceError> {
    InventoryRecord::find()
        .filter(inventory_record::Column::StoreId.eq(store_id))
        .filter(inventory_record::Column::VariantId.eq(variant_id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)
}

async fn create_record<C: ConnectionTrait>(
    db: &C,
    input: &AdjustStockInput,
    default_low_stock_threshold: i32,
) -> Result<inventory_record::Model, ServiceError> {
    let now = Utc::now();
    let record = inventory_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(input.store_id),
        variant_id: Set(input.variant_id),
        quantity: Set(0),
        reserved: Set(0),
        low_stock_threshold: Set(default_low_stock_threshold),
        created_at: Set(now),
        updated_at: Set(now),
    };
    record.insert(db).await.map_err(ServiceError::db_error)
}

/// The stock adjustment engine's service surface.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_low_stock_threshold: i32,
}

impl InventoryService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_low_stock_threshold: i32,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_low_stock_threshold,
        }
    }

    /// Applies a single adjustment as its own transaction.
    #[instrument(skip(self, input), fields(idempotency_key = %input.idempotency_key))]
    pub async fn adjust_stock(
        &self,
        input: AdjustStockInput,
    ) -> Result<StockAdjustment, ServiceError> {
        let default_threshold = self.default_low_stock_threshold;
        let txn_input = input.clone();
        let adjustment = self
            .db
            .transaction::<_, StockAdjustment, ServiceError>(move |txn| {
                Box::pin(
                    async move { apply_adjustment(txn, &txn_input, default_threshold).await },
                )
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        if !adjustment.replayed {
            self.event_sender
                .send(Event::StockAdjusted {
                    inventory_id: adjustment.inventory_id,
                    entry_type: input.entry_type.as_str().to_string(),
                    change: input.change,
                    new_quantity: adjustment.new_quantity,
                })
                .await;
            if let Some(alert) = &adjustment.alert {
                self.event_sender
                    .send(Event::LowStockAlertTriggered {
                        alert_id: alert.id,
                        inventory_id: alert.inventory_id,
                        quantity: alert.quantity_at_trigger,
                        threshold: alert.threshold,
                    })
                    .await;
            }
        }

        Ok(adjustment)
    }

    pub async fn get_record(
        &self,
        store_id: Uuid,
        variant_id: Uuid,
    ) -> Result<inventory_record::Model, ServiceError> {
        find_record(self.db.as_ref(), store_id, variant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No inventory record for variant {} in store {}",
                    variant_id, store_id
                ))
            })
    }

    /// Updates the low-stock threshold for an existing record.
    #[instrument(skip(self))]
    pub async fn set_low_stock_threshold(
        &self,
        store_id: Uuid,
        variant_id: Uuid,
        threshold: i32,
    ) -> Result<inventory_record::Model, ServiceError> {
        if threshold < 0 {
            return Err(ServiceError::ValidationError(
                "low_stock_threshold must be non-negative".into(),
            ));
        }

        let record = self.get_record(store_id, variant_id).await?;
        let mut active: inventory_record::ActiveModel = record.into();
        active.low_stock_threshold = Set(threshold);
        active.updated_at = Set(Utc::now());

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Ledger entries for one record, newest first.
    pub async fn list_ledger(
        &self,
        inventory_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_log_entry::Model>, u64), ServiceError> {
        let paginator = InventoryLogEntry::find()
            .filter(inventory_log_entry::Column::InventoryId.eq(inventory_id))
            .order_by_desc(inventory_log_entry::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let entries = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((entries, total))
    }
}
