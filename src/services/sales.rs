use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_log_entry::LedgerEntryType,
        sale::{self, Entity as Sale, PaymentMethod, PaymentStatus},
        sale_item::{self, Entity as SaleItem, SaleItemStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{self, AdjustStockInput, StockAdjustment},
        notifications::{ReceiptChannel, ReceiptDocument, ReceiptService},
    },
};

#[derive(Debug, Clone)]
pub struct SaleLineInput {
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceiptRequest {
    pub channel: ReceiptChannel,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct CreateSaleInput {
    pub store_id: Uuid,
    pub business_id: Uuid,
    pub items: Vec<SaleLineInput>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub idempotency_key: String,
    pub receipt: Option<ReceiptRequest>,
}

/// Result of a sale creation. `warnings` carries post-commit collaborator
/// failures (receipt delivery) that never roll the sale back.
#[derive(Debug, Clone)]
pub struct CreateSaleOutcome {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
    pub replayed: bool,
    pub receipt_url: Option<String>,
    pub warnings: Vec<String>,
}

/// Ledger key for one sale line, derived from the sale's own key so a
/// replayed sale replays every line deduction too.
pub(crate) fn line_idempotency_key(sale_key: &str, line_index: usize) -> String {
    format!("{}:item:{}", sale_key, line_index)
}

fn generate_sale_code() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "S-{}-{}",
        Utc::now().format("%Y%m%d"),
        &suffix[..8].to_uppercase()
    )
}

#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    receipts: Arc<dyn ReceiptService>,
    default_low_stock_threshold: i32,
}

impl SaleService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        receipts: Arc<dyn ReceiptService>,
        default_low_stock_threshold: i32,
    ) -> Self {
        Self {
            db,
            event_sender,
            receipts,
            default_low_stock_threshold,
        }
    }

    /// Creates a sale: header, line items, and one ledger deduction per line,
    /// all in one transaction. A request replaying an already-stored
    /// idempotency key returns the stored sale without touching stock.
    #[instrument(skip(self, input), fields(store_id = %input.store_id, idempotency_key = %input.idempotency_key))]
    pub async fn create_sale(
        &self,
        input: CreateSaleInput,
    ) -> Result<CreateSaleOutcome, ServiceError> {
        validate_sale_input(&input)?;

        if let Some(existing) = Sale::find()
            .filter(sale::Column::IdempotencyKey.eq(input.idempotency_key.as_str()))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
        {
            let items = SaleItem::find()
                .filter(sale_item::Column::SaleId.eq(existing.id))
                .order_by_asc(sale_item::Column::CreatedAt)
                .all(self.db.as_ref())
                .await
                .map_err(ServiceError::db_error)?;
            info!(sale_id = %existing.id, "Sale replayed from idempotency key");
            return Ok(CreateSaleOutcome {
                sale: existing,
                items,
                replayed: true,
                receipt_url: None,
                warnings: Vec::new(),
            });
        }

        let default_threshold = self.default_low_stock_threshold;
        let txn_input = input.clone();
        let (sale, items, adjustments) = self
            .db
            .transaction::<_, (sale::Model, Vec<sale_item::Model>, Vec<StockAdjustment>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        // Pre-flight: every line must resolve to a record with
                        // enough available (on-hand minus reserved) stock, so a
                        // short line aborts before any sibling deduction runs.
                        for line in &txn_input.items {
                            let record = inventory::find_record(
                                txn,
                                txn_input.store_id,
                                line.variant_id,
                            )
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "No inventory record for variant {} in store {}",
                                    line.variant_id, txn_input.store_id
                                ))
                            })?;
                            if line.quantity > record.available() {
                                return Err(ServiceError::InsufficientStock(format!(
                                    "Variant {} has {} available, requested {}",
                                    line.variant_id,
                                    record.available(),
                                    line.quantity
                                )));
                            }
                        }

                        let total_amount: Decimal = txn_input
                            .items
                            .iter()
                            .map(|l| l.unit_price * Decimal::from(l.quantity))
                            .sum();
                        let total_discount: Decimal =
                            txn_input.items.iter().map(|l| l.discount).sum();
                        let net_amount = total_amount - total_discount;

                        let now = Utc::now();
                        let sale = sale::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            store_id: Set(txn_input.store_id),
                            business_id: Set(txn_input.business_id),
                            sale_code: Set(generate_sale_code()),
                            idempotency_key: Set(txn_input.idempotency_key.clone()),
                            total_amount: Set(total_amount),
                            total_discount: Set(total_discount),
                            net_amount: Set(net_amount),
                            payment_method: Set(txn_input.payment_method.as_str().to_string()),
                            payment_status: Set(txn_input.payment_status.as_str().to_string()),
                            customer_name: Set(txn_input.customer_name.clone()),
                            customer_email: Set(txn_input.customer_email.clone()),
                            customer_phone: Set(txn_input.customer_phone.clone()),
                            created_at: Set(now),
                            updated_at: Set(now),
                        };
                        let sale = sale.insert(txn).await.map_err(ServiceError::db_error)?;

                        let mut items = Vec::with_capacity(txn_input.items.len());
                        let mut adjustments = Vec::with_capacity(txn_input.items.len());
                        for (index, line) in txn_input.items.iter().enumerate() {
                            let line_total = line.unit_price * Decimal::from(line.quantity)
                                - line.discount;
                            let item = sale_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                sale_id: Set(sale.id),
                                variant_id: Set(line.variant_id),
                                quantity: Set(line.quantity),
                                unit_price: Set(line.unit_price),
                                discount: Set(line.discount),
                                line_total: Set(line_total),
                                status: Set(SaleItemStatus::Sold.as_str().to_string()),
                                created_at: Set(now),
                            };
                            let item = item.insert(txn).await.map_err(ServiceError::db_error)?;

                            let adjustment = inventory::apply_adjustment(
                                txn,
                                &AdjustStockInput {
                                    store_id: txn_input.store_id,
                                    variant_id: line.variant_id,
                                    change: -line.quantity,
                                    entry_type: LedgerEntryType::Deduct,
                                    idempotency_key: line_idempotency_key(
                                        &txn_input.idempotency_key,
                                        index,
                                    ),
                                    reason: None,
                                    reference: Some(sale.sale_code.clone()),
                                    actor: None,
                                },
                                default_threshold,
                            )
                            .await?;
                            adjustments.push(adjustment);
                            items.push(item);
                        }

                        Ok((sale, items, adjustments))
                    })
                },
            )
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            sale_id = %sale.id,
            sale_code = %sale.sale_code,
            net_amount = %sale.net_amount,
            lines = items.len(),
            "Sale created"
        );

        self.event_sender.send(Event::SaleCreated(sale.id)).await;
        for (adjustment, line) in adjustments.iter().zip(&input.items) {
            self.event_sender
                .send(Event::StockAdjusted {
                    inventory_id: adjustment.inventory_id,
                    entry_type: LedgerEntryType::Deduct.as_str().to_string(),
                    change: -line.quantity,
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

        let mut warnings = Vec::new();
        let mut receipt_url = None;
        if let Some(receipt) = &input.receipt {
            let document = ReceiptDocument {
                sale_id: sale.id,
                sale_code: sale.sale_code.clone(),
                store_id: sale.store_id,
                net_amount: sale.net_amount,
                customer_name: sale.customer_name.clone(),
                channel: receipt.channel,
                address: receipt.address.clone(),
            };
            match self.receipts.deliver_receipt(&document).await {
                Ok(url) => receipt_url = Some(url),
                Err(e) => {
                    warn!(sale_id = %sale.id, "Receipt delivery failed: {}", e);
                    warnings.push(format!("receipt delivery failed: {}", e));
                }
            }
        }

        Ok(CreateSaleOutcome {
            sale,
            items,
            replayed: false,
            receipt_url,
            warnings,
        })
    }

    pub async fn get_sale(
        &self,
        sale_id: Uuid,
    ) -> Result<(sale::Model, Vec<sale_item::Model>), ServiceError> {
        let sale = Sale::find_by_id(sale_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;
        let items = SaleItem::find()
            .filter(sale_item::Column::SaleId.eq(sale.id))
            .order_by_asc(sale_item::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok((sale, items))
    }
}

pub(crate) async fn find_sale_by_code<C: sea_orm::ConnectionTrait>(
    db: &C,
    store_id: Uuid,
    sale_code: &str,
) -> Result<sale::Model, ServiceError> {
    Sale::find()
        .filter(sale::Column::StoreId.eq(store_id))
        .filter(sale::Column::SaleCode.eq(sale_code))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Sale {} not found in store {}",
                sale_code, store_id
            ))
        })
}

fn validate_sale_input(input: &CreateSaleInput) -> Result<(), ServiceError> {
    if input.idempotency_key.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "idempotency_key must not be empty".into(),
        ));
    }
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "A sale needs at least one item".into(),
        ));
    }
    for line in &input.items {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for variant {} must be positive",
                line.variant_id
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Unit price for variant {} must not be negative",
                line.variant_id
            )));
        }
        if line.discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Discount for variant {} must not be negative",
                line.variant_id
            )));
        }
    }
    Ok(())
}
