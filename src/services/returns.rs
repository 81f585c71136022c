use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        exchange::{self, Entity as Exchange, ExchangeStatus},
        inventory_log_entry::LedgerEntryType,
        refund::{self, Entity as Refund, RefundMethod, RefundStatus},
        return_request::{self, Entity as ReturnRequest, ItemCondition, ReturnResolution,
            ReturnStatus},
        sale::{self, Entity as Sale},
        sale_item::{self, Entity as SaleItem, SaleItemStatus},
        store_credit::{self, Entity as StoreCredit, StoreCreditStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog,
        inventory::{self, AdjustStockInput},
        sales,
    },
};

#[derive(Debug, Clone)]
pub struct ReturnExchangeInput {
    pub new_variant_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ReturnLineInput {
    pub sale_item_id: Uuid,
    pub reason: String,
    pub resolution: ReturnResolution,
    /// Defaults to the sale item's full sold quantity.
    pub quantity: Option<i32>,
    /// Explicit staff judgement; derived from the reason text when omitted.
    pub condition: Option<ItemCondition>,
    pub exchanges: Vec<ReturnExchangeInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateReturnInput {
    pub store_id: Uuid,
    pub sale_code: String,
    pub staff_id: Option<Uuid>,
    pub items: Vec<ReturnLineInput>,
}

/// A return and its dependent settlement records.
#[derive(Debug, Clone)]
pub struct ReturnRecord {
    pub return_request: return_request::Model,
    pub refund: Option<refund::Model>,
    pub exchanges: Vec<exchange::Model>,
    pub store_credit: Option<store_credit::Model>,
}

#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub return_id: Uuid,
    pub approve: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewReturnsInput {
    pub manager_id: Option<Uuid>,
    /// Overrides the refund method recorded at creation (e.g. cash out a
    /// card sale at the counter).
    pub refund_method: Option<RefundMethod>,
    pub decisions: Vec<ReviewDecision>,
}

#[derive(Debug, Clone)]
pub struct ReturnReviewOutcome {
    pub return_id: Uuid,
    pub status: ReturnStatus,
    /// Every refund settled by this review: the return's own refund, or one
    /// price-difference refund per cheaper exchange leg.
    pub refunds: Vec<refund::Model>,
    pub exchanges: Vec<exchange::Model>,
    pub store_credit: Option<store_credit::Model>,
    pub restocked: bool,
}

/// Classifies returned goods from the stated reason when staff gave no
/// explicit judgement. Runs once, at creation; the stored condition is
/// what review consults.
pub(crate) fn derive_condition(reason: &str) -> ItemCondition {
    let lowered = reason.to_lowercase();
    if ["fault", "defect", "damag"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        ItemCondition::Defective
    } else {
        ItemCondition::Resellable
    }
}

fn restock_key(return_id: Uuid) -> String {
    format!("ret:{}:restock", return_id)
}

fn exchange_deduct_key(return_id: Uuid, exchange_id: Uuid) -> String {
    format!("ret:{}:exch:{}", return_id, exchange_id)
}

#[derive(Clone)]
pub struct ReturnService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_low_stock_threshold: i32,
}

impl ReturnService {
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

    /// Opens one pending return per requested line, pre-creating its
    /// settlement record (refund, exchange legs, or store credit) in a
    /// pending state. No stock or money moves here.
    #[instrument(skip(self, input), fields(store_id = %input.store_id, sale_code = %input.sale_code))]
    pub async fn create_return(
        &self,
        input: CreateReturnInput,
    ) -> Result<Vec<ReturnRecord>, ServiceError> {
        validate_return_input(&input)?;

        let txn_input = input.clone();
        let records = self
            .db
            .transaction::<_, Vec<ReturnRecord>, ServiceError>(move |txn| {
                Box::pin(async move { create_return_in_txn(txn, &txn_input).await })
            })
            .await
            .map_err(unwrap_txn_error)?;

        for record in &records {
            info!(
                return_id = %record.return_request.id,
                resolution = %record.return_request.resolution,
                "Return opened"
            );
            self.event_sender
                .send(Event::ReturnCreated(record.return_request.id))
                .await;
        }

        Ok(records)
    }

    /// Reviews a batch of pending returns in ONE transaction. Any failure
    /// inside the batch (missing return, sale item, exchange stock) aborts
    /// every decision in the call.
    #[instrument(skip(self, input), fields(decisions = input.decisions.len()))]
    pub async fn review_returns(
        &self,
        input: ReviewReturnsInput,
    ) -> Result<Vec<ReturnReviewOutcome>, ServiceError> {
        if input.decisions.is_empty() {
            return Err(ServiceError::ValidationError(
                "A review batch needs at least one decision".into(),
            ));
        }

        let default_threshold = self.default_low_stock_threshold;
        let txn_input = input.clone();
        let (outcomes, events) = self
            .db
            .transaction::<_, (Vec<ReturnReviewOutcome>, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut outcomes = Vec::with_capacity(txn_input.decisions.len());
                    let mut events = Vec::new();
                    for decision in &txn_input.decisions {
                        let outcome = review_one(
                            txn,
                            decision,
                            txn_input.manager_id,
                            txn_input.refund_method,
                            default_threshold,
                            &mut events,
                        )
                        .await?;
                        outcomes.push(outcome);
                    }
                    Ok((outcomes, events))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        for event in events {
            self.event_sender.send(event).await;
        }

        Ok(outcomes)
    }

    pub async fn get_return(&self, return_id: Uuid) -> Result<ReturnRecord, ServiceError> {
        let request = ReturnRequest::find_by_id(return_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_id)))?;
        load_dependents(self.db.as_ref(), request).await
    }

    pub async fn list_returns(
        &self,
        store_id: Option<Uuid>,
        status: Option<ReturnStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<return_request::Model>, u64), ServiceError> {
        let mut query = ReturnRequest::find().order_by_desc(return_request::Column::CreatedAt);
        if let Some(store_id) = store_id {
            query = query.filter(return_request::Column::StoreId.eq(store_id));
        }
        if let Some(status) = status {
            query = query.filter(return_request::Column::Status.eq(status.as_str()));
        }

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let returns = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((returns, total))
    }
}

fn unwrap_txn_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

fn validate_return_input(input: &CreateReturnInput) -> Result<(), ServiceError> {
    if input.sale_code.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "sale_code must not be empty".into(),
        ));
    }
    if input.items.is_empty() {
        return Err(ServiceError::ValidationError(
            "A return needs at least one item".into(),
        ));
    }
    for line in &input.items {
        if line.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Return for sale item {} needs a reason",
                line.sale_item_id
            )));
        }
        if let Some(quantity) = line.quantity {
            if quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Return quantity for sale item {} must be positive",
                    line.sale_item_id
                )));
            }
        }
        match line.resolution {
            ReturnResolution::Exchange if line.exchanges.is_empty() => {
                return Err(ServiceError::ValidationError(format!(
                    "Exchange return for sale item {} needs at least one replacement variant",
                    line.sale_item_id
                )));
            }
            ReturnResolution::Refund | ReturnResolution::StoreCredit
                if !line.exchanges.is_empty() =>
            {
                return Err(ServiceError::ValidationError(format!(
                    "Return for sale item {} lists exchange targets but is not an exchange",
                    line.sale_item_id
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

async fn create_return_in_txn<C: ConnectionTrait>(
    txn: &C,
    input: &CreateReturnInput,
) -> Result<Vec<ReturnRecord>, ServiceError> {
    let sale = sales::find_sale_by_code(txn, input.store_id, &input.sale_code).await?;
    let refund_method =
        RefundMethod::parse(&sale.payment_method).unwrap_or(RefundMethod::Cash);

    let mut records = Vec::with_capacity(input.items.len());
    for line in &input.items {
        let item = SaleItem::find_by_id(line.sale_item_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Sale item {} not found", line.sale_item_id))
            })?;
        if item.sale_id != sale.id {
            return Err(ServiceError::InvalidOperation(format!(
                "Sale item {} does not belong to sale {}",
                line.sale_item_id, input.sale_code
            )));
        }

        let quantity = line.quantity.unwrap_or(item.quantity);
        if quantity > item.quantity {
            return Err(ServiceError::ValidationError(format!(
                "Cannot return {} of sale item {}; only {} were sold",
                quantity, item.id, item.quantity
            )));
        }

        let condition = line
            .condition
            .unwrap_or_else(|| derive_condition(&line.reason));
        let now = Utc::now();
        let request = return_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale.id),
            sale_item_id: Set(item.id),
            store_id: Set(input.store_id),
            reason: Set(line.reason.clone()),
            resolution: Set(line.resolution.as_str().to_string()),
            condition: Set(condition.as_str().to_string()),
            status: Set(ReturnStatus::Pending.as_str().to_string()),
            quantity: Set(quantity),
            staff_id: Set(input.staff_id),
            manager_id: Set(None),
            notes: Set(line.notes.clone()),
            created_at: Set(now),
            reviewed_at: Set(None),
        };
        let request = request.insert(txn).await.map_err(ServiceError::db_error)?;

        let settlement = item.unit_price * Decimal::from(quantity);
        let mut record = ReturnRecord {
            return_request: request,
            refund: None,
            exchanges: Vec::new(),
            store_credit: None,
        };
        match line.resolution {
            ReturnResolution::Refund => {
                let pending = refund::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    return_id: Set(record.return_request.id),
                    amount: Set(settlement),
                    method: Set(refund_method.as_str().to_string()),
                    status: Set(RefundStatus::Pending.as_str().to_string()),
                    processed_at: Set(None),
                    created_at: Set(now),
                };
                record.refund =
                    Some(pending.insert(txn).await.map_err(ServiceError::db_error)?);
            }
            ReturnResolution::Exchange => {
                for target in &line.exchanges {
                    let replacement =
                        catalog::find_store_variant(txn, input.store_id, target.new_variant_id)
                            .await?;
                    let leg = exchange::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        return_id: Set(record.return_request.id),
                        new_variant_id: Set(replacement.id),
                        price_difference: Set(replacement.price - item.unit_price),
                        status: Set(ExchangeStatus::Pending.as_str().to_string()),
                        completed_at: Set(None),
                        created_at: Set(now),
                    };
                    record
                        .exchanges
                        .push(leg.insert(txn).await.map_err(ServiceError::db_error)?);
                }
            }
            ReturnResolution::StoreCredit => {
                let pending = store_credit::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    return_id: Set(record.return_request.id),
                    amount: Set(settlement),
                    used_amount: Set(Decimal::ZERO),
                    status: Set(StoreCreditStatus::Pending.as_str().to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                record.store_credit =
                    Some(pending.insert(txn).await.map_err(ServiceError::db_error)?);
            }
        }
        records.push(record);
    }

    Ok(records)
}

async fn review_one<C: ConnectionTrait>(
    txn: &C,
    decision: &ReviewDecision,
    manager_id: Option<Uuid>,
    refund_method: Option<RefundMethod>,
    default_threshold: i32,
    events: &mut Vec<Event>,
) -> Result<ReturnReviewOutcome, ServiceError> {
    let request = ReturnRequest::find_by_id(decision.return_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Return {} not found", decision.return_id))
        })?;

    let status = ReturnStatus::parse(&request.status).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Return {} has unknown status {}",
            request.id, request.status
        ))
    })?;
    if status != ReturnStatus::Pending {
        return Err(ServiceError::InvalidOperation(format!(
            "Return {} is {} and cannot be reviewed",
            request.id, status
        )));
    }

    if !decision.approve {
        let rejected = finish_review(
            txn,
            request,
            ReturnStatus::Rejected,
            manager_id,
            decision.notes.clone(),
        )
        .await?;
        events.push(Event::ReturnRejected(rejected.id));
        return Ok(ReturnReviewOutcome {
            return_id: rejected.id,
            status: ReturnStatus::Rejected,
            refunds: Vec::new(),
            exchanges: Vec::new(),
            store_credit: None,
            restocked: false,
        });
    }

    let resolution = ReturnResolution::parse(&request.resolution).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Return {} has unknown resolution {}",
            request.id, request.resolution
        ))
    })?;
    let condition = ItemCondition::parse(&request.condition).ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Return {} has unknown condition {}",
            request.id, request.condition
        ))
    })?;

    let item = SaleItem::find_by_id(request.sale_item_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Sale item {} not found", request.sale_item_id))
        })?;
    let sale = Sale::find_by_id(request.sale_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", request.sale_id)))?;

    let settlement = item.unit_price * Decimal::from(request.quantity);
    let mut net_delta = Decimal::ZERO;
    let mut outcome = ReturnReviewOutcome {
        return_id: request.id,
        status: ReturnStatus::Pending,
        refunds: Vec::new(),
        exchanges: Vec::new(),
        store_credit: None,
        restocked: false,
    };

    let final_status = match resolution {
        ReturnResolution::Refund => {
            let pending = Refund::find()
                .filter(refund::Column::ReturnId.eq(request.id))
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Return {} has no pending refund", request.id))
                })?;
            let mut active: refund::ActiveModel = pending.into();
            if let Some(method) = refund_method {
                active.method = Set(method.as_str().to_string());
            }
            active.status = Set(RefundStatus::Completed.as_str().to_string());
            active.processed_at = Set(Some(Utc::now()));
            let completed = active.update(txn).await.map_err(ServiceError::db_error)?;

            mark_item_returned(txn, item.clone()).await?;
            net_delta -= settlement;
            outcome.restocked =
                maybe_restock(txn, &request, condition, manager_id, default_threshold, events)
                    .await?;

            events.push(Event::ReturnRefunded {
                return_id: request.id,
                refund_id: completed.id,
                amount: completed.amount,
            });
            outcome.refunds.push(completed);
            ReturnStatus::Refunded
        }
        ReturnResolution::StoreCredit => {
            let pending = StoreCredit::find()
                .filter(store_credit::Column::ReturnId.eq(request.id))
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Return {} has no pending store credit",
                        request.id
                    ))
                })?;
            let mut active: store_credit::ActiveModel = pending.into();
            active.status = Set(StoreCreditStatus::Active.as_str().to_string());
            active.amount = Set(settlement);
            active.updated_at = Set(Utc::now());
            let credit = active.update(txn).await.map_err(ServiceError::db_error)?;

            mark_item_returned(txn, item.clone()).await?;
            net_delta -= settlement;
            outcome.restocked =
                maybe_restock(txn, &request, condition, manager_id, default_threshold, events)
                    .await?;

            events.push(Event::ReturnCredited {
                return_id: request.id,
                store_credit_id: credit.id,
                amount: credit.amount,
            });
            outcome.store_credit = Some(credit);
            ReturnStatus::Credited
        }
        ReturnResolution::Exchange => {
            let legs = Exchange::find()
                .filter(exchange::Column::ReturnId.eq(request.id))
                .filter(exchange::Column::Status.eq(ExchangeStatus::Pending.as_str()))
                .all(txn)
                .await
                .map_err(ServiceError::db_error)?;
            if legs.is_empty() {
                return Err(ServiceError::NotFound(format!(
                    "Return {} has no pending exchange legs",
                    request.id
                )));
            }

            for leg in legs {
                let adjustment = inventory::apply_adjustment(
                    txn,
                    &AdjustStockInput {
                        store_id: request.store_id,
                        variant_id: leg.new_variant_id,
                        change: -1,
                        entry_type: LedgerEntryType::ExchangeAdjust,
                        idempotency_key: exchange_deduct_key(request.id, leg.id),
                        reason: None,
                        reference: Some(request.id.to_string()),
                        actor: manager_id.map(|id| id.to_string()),
                    },
                    default_threshold,
                )
                .await?;
                push_adjustment_events(events, LedgerEntryType::ExchangeAdjust, -1, &adjustment);

                if leg.price_difference < Decimal::ZERO {
                    // Replacement is cheaper: refund the difference on the spot.
                    let amount = -leg.price_difference;
                    let paid_back = refund::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        return_id: Set(request.id),
                        amount: Set(amount),
                        method: Set(refund_method
                            .or_else(|| RefundMethod::parse(&sale.payment_method))
                            .unwrap_or(RefundMethod::Cash)
                            .as_str()
                            .to_string()),
                        status: Set(RefundStatus::Completed.as_str().to_string()),
                        processed_at: Set(Some(Utc::now())),
                        created_at: Set(Utc::now()),
                    };
                    let paid_back =
                        paid_back.insert(txn).await.map_err(ServiceError::db_error)?;
                    net_delta -= amount;
                    events.push(Event::ReturnRefunded {
                        return_id: request.id,
                        refund_id: paid_back.id,
                        amount,
                    });
                    outcome.refunds.push(paid_back);
                } else if leg.price_difference > Decimal::ZERO {
                    // Customer owes the difference; how it is collected is a
                    // front-of-house concern.
                    net_delta += leg.price_difference;
                }

                let mut active: exchange::ActiveModel = leg.into();
                active.status = Set(ExchangeStatus::Completed.as_str().to_string());
                active.completed_at = Set(Some(Utc::now()));
                outcome
                    .exchanges
                    .push(active.update(txn).await.map_err(ServiceError::db_error)?);
            }

            outcome.restocked =
                maybe_restock(txn, &request, condition, manager_id, default_threshold, events)
                    .await?;
            events.push(Event::ReturnExchanged {
                return_id: request.id,
            });
            ReturnStatus::Exchanged
        }
    };

    if net_delta != Decimal::ZERO {
        let adjusted = sale.net_amount + net_delta;
        let mut active: sale::ActiveModel = sale.into();
        active.net_amount = Set(adjusted);
        active.updated_at = Set(Utc::now());
        active.update(txn).await.map_err(ServiceError::db_error)?;
    }

    let reviewed = finish_review(txn, request, final_status, manager_id, decision.notes.clone())
        .await?;
    info!(
        return_id = %reviewed.id,
        status = %final_status,
        net_delta = %net_delta,
        restocked = outcome.restocked,
        "Return reviewed"
    );
    outcome.status = final_status;
    Ok(outcome)
}

async fn finish_review<C: ConnectionTrait>(
    txn: &C,
    request: return_request::Model,
    status: ReturnStatus,
    manager_id: Option<Uuid>,
    notes: Option<String>,
) -> Result<return_request::Model, ServiceError> {
    let mut active: return_request::ActiveModel = request.into();
    active.status = Set(status.as_str().to_string());
    active.manager_id = Set(manager_id);
    if let Some(notes) = notes {
        active.notes = Set(Some(notes));
    }
    active.reviewed_at = Set(Some(Utc::now()));
    active.update(txn).await.map_err(ServiceError::db_error)
}

async fn mark_item_returned<C: ConnectionTrait>(
    txn: &C,
    item: sale_item::Model,
) -> Result<sale_item::Model, ServiceError> {
    let mut active: sale_item::ActiveModel = item.into();
    active.status = Set(SaleItemStatus::Returned.as_str().to_string());
    active.update(txn).await.map_err(ServiceError::db_error)
}

/// Restocks the original variant unless the goods came back defective.
async fn maybe_restock<C: ConnectionTrait>(
    txn: &C,
    request: &return_request::Model,
    condition: ItemCondition,
    manager_id: Option<Uuid>,
    default_threshold: i32,
    events: &mut Vec<Event>,
) -> Result<bool, ServiceError> {
    if condition == ItemCondition::Defective {
        return Ok(false);
    }

    let item = SaleItem::find_by_id(request.sale_item_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Sale item {} not found", request.sale_item_id))
        })?;

    let adjustment = inventory::apply_adjustment(
        txn,
        &AdjustStockInput {
            store_id: request.store_id,
            variant_id: item.variant_id,
            change: request.quantity,
            entry_type: LedgerEntryType::ReturnRestock,
            idempotency_key: restock_key(request.id),
            reason: Some(request.reason.clone()),
            reference: Some(request.id.to_string()),
            actor: manager_id.map(|id| id.to_string()),
        },
        default_threshold,
    )
    .await?;
    push_adjustment_events(
        events,
        LedgerEntryType::ReturnRestock,
        request.quantity,
        &adjustment,
    );
    Ok(true)
}

fn push_adjustment_events(
    events: &mut Vec<Event>,
    entry_type: LedgerEntryType,
    change: i32,
    adjustment: &inventory::StockAdjustment,
) {
    if adjustment.replayed {
        return;
    }
    events.push(Event::StockAdjusted {
        inventory_id: adjustment.inventory_id,
        entry_type: entry_type.as_str().to_string(),
        change,
        new_quantity: adjustment.new_quantity,
    });
    if let Some(alert) = &adjustment.alert {
        events.push(Event::LowStockAlertTriggered {
            alert_id: alert.id,
            inventory_id: alert.inventory_id,
            quantity: alert.quantity_at_trigger,
            threshold: alert.threshold,
        });
    }
}

async fn load_dependents<C: ConnectionTrait>(
    db: &C,
    request: return_request::Model,
) -> Result<ReturnRecord, ServiceError> {
    let refund = Refund::find()
        .filter(refund::Column::ReturnId.eq(request.id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;
    let exchanges = Exchange::find()
        .filter(exchange::Column::ReturnId.eq(request.id))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;
    let store_credit = StoreCredit::find()
        .filter(store_credit::Column::ReturnId.eq(request.id))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(ReturnRecord {
        return_request: request,
        refund,
        exchanges,
        store_credit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn condition_derivation_flags_defects() {
        assert_eq!(derive_condition("screen is faulty"), ItemCondition::Defective);
        assert_eq!(derive_condition("DEFECTIVE on arrival"), ItemCondition::Defective);
        assert_eq!(derive_condition("box was damaged"), ItemCondition::Defective);
        assert_eq!(derive_condition("wrong size"), ItemCondition::Resellable);
        assert_eq!(derive_condition("changed my mind"), ItemCondition::Resellable);
    }

    #[test]
    fn ledger_keys_are_scoped_to_the_return() {
        let rid = Uuid::new_v4();
        let eid = Uuid::new_v4();
        assert_eq!(restock_key(rid), format!("ret:{}:restock", rid));
        assert_eq!(
            exchange_deduct_key(rid, eid),
            format!("ret:{}:exch:{}", rid, eid)
        );
    }

    #[test]
    fn validation_requires_exchange_targets() {
        let input = CreateReturnInput {
            store_id: Uuid::new_v4(),
            sale_code: "S-1".into(),
            staff_id: None,
            items: vec![ReturnLineInput {
                sale_item_id: Uuid::new_v4(),
                reason: "wrong color".into(),
                resolution: ReturnResolution::Exchange,
                quantity: None,
                condition: None,
                exchanges: Vec::new(),
                notes: None,
            }],
        };
        assert!(matches!(
            validate_return_input(&input),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn validation_rejects_exchange_targets_on_refund() {
        let input = CreateReturnInput {
            store_id: Uuid::new_v4(),
            sale_code: "S-1".into(),
            staff_id: None,
            items: vec![ReturnLineInput {
                sale_item_id: Uuid::new_v4(),
                reason: "too small".into(),
                resolution: ReturnResolution::Refund,
                quantity: None,
                condition: None,
                exchanges: vec![ReturnExchangeInput {
                    new_variant_id: Uuid::new_v4(),
                }],
                notes: None,
            }],
        };
        assert!(matches!(
            validate_return_input(&input),
            Err(ServiceError::ValidationError(_))
        ));
    }

    proptest! {
        #[test]
        fn derivation_is_case_insensitive(prefix in "[a-zA-Z ]{0,12}", suffix in "[a-zA-Z ]{0,12}") {
            for marker in ["Fault", "dEfEcT", "DAMAGed"] {
                let reason = format!("{}{}{}", prefix, marker, suffix);
                prop_assert_eq!(derive_condition(&reason), ItemCondition::Defective);
            }
        }

        #[test]
        fn clean_reasons_stay_resellable(reason in "[b-ceghi-z ]{1,24}") {
            // Alphabet excludes the letters needed to spell the defect markers.
            prop_assert_eq!(derive_condition(&reason), ItemCondition::Resellable);
        }
    }
}
