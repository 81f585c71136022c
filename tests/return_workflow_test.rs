mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{restock, seed_variant, setup, TestCtx};
use retail_ops_api::{
    entities::{
        exchange::ExchangeStatus,
        refund::{RefundMethod, RefundStatus},
        return_request::{ItemCondition, ReturnResolution, ReturnStatus},
        sale::{self, PaymentMethod, PaymentStatus},
        sale_item::{self, SaleItemStatus},
        store_credit::StoreCreditStatus,
    },
    errors::ServiceError,
    services::{
        returns::{
            CreateReturnInput, ReturnExchangeInput, ReturnLineInput, ReviewDecision,
            ReviewReturnsInput,
        },
        sales::{CreateSaleInput, SaleLineInput},
    },
};

async fn sell(
    ctx: &TestCtx,
    store_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    key: &str,
) -> (sale::Model, sale_item::Model) {
    let outcome = ctx
        .sales
        .create_sale(CreateSaleInput {
            store_id,
            business_id: Uuid::new_v4(),
            items: vec![SaleLineInput {
                variant_id,
                quantity,
                unit_price,
                discount: dec!(0),
            }],
            payment_method: PaymentMethod::Card,
            payment_status: PaymentStatus::Paid,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            idempotency_key: key.to_string(),
            receipt: None,
        })
        .await
        .expect("create sale");
    let item = outcome.items[0].clone();
    (outcome.sale, item)
}

fn return_line(
    sale_item_id: Uuid,
    reason: &str,
    resolution: ReturnResolution,
) -> ReturnLineInput {
    ReturnLineInput {
        sale_item_id,
        reason: reason.to_string(),
        resolution,
        quantity: None,
        condition: None,
        exchanges: Vec::new(),
        notes: None,
    }
}

fn review_all(return_ids: &[Uuid], approve: bool) -> ReviewReturnsInput {
    ReviewReturnsInput {
        manager_id: Some(Uuid::new_v4()),
        refund_method: None,
        decisions: return_ids
            .iter()
            .map(|&return_id| ReviewDecision {
                return_id,
                approve,
                notes: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn refund_restocks_resellable_goods_and_decrements_net() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 2, dec!(20.00), "sale-1").await;
    assert_eq!(sold_sale.net_amount, dec!(40.00));

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: Some(Uuid::new_v4()),
            items: vec![return_line(item.id, "wrong size", ReturnResolution::Refund)],
        })
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    let opened = &records[0];
    assert_eq!(opened.return_request.status, ReturnStatus::Pending.as_str());
    assert_eq!(
        opened.return_request.condition,
        ItemCondition::Resellable.as_str()
    );
    // Quantity defaulted to the full sold quantity; nothing moved yet.
    assert_eq!(opened.return_request.quantity, 2);
    let pending = opened.refund.as_ref().expect("pending refund");
    assert_eq!(pending.status, RefundStatus::Pending.as_str());
    assert_eq!(pending.amount, dec!(40.00));
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 8);

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[opened.return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, ReturnStatus::Refunded);
    assert!(outcomes[0].restocked);
    assert_eq!(outcomes[0].refunds.len(), 1);
    let completed = &outcomes[0].refunds[0];
    assert_eq!(completed.status, RefundStatus::Completed.as_str());
    assert!(completed.processed_at.is_some());

    // Stock back, sale item flipped, net conserved.
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 10);
    let (reloaded, items) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(0.00));
    assert_eq!(items[0].status, SaleItemStatus::Returned.as_str());
}

#[tokio::test]
async fn defective_goods_are_never_restocked() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![return_line(
                item.id,
                "screen arrived damaged",
                ReturnResolution::Refund,
            )],
        })
        .await
        .unwrap();
    assert_eq!(
        records[0].return_request.condition,
        ItemCondition::Defective.as_str()
    );

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Refunded);
    assert!(!outcomes[0].restocked);

    // Refund still settles, but the unit stays out of stock.
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 9);
    let (reloaded, _) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(0.00));
}

#[tokio::test]
async fn explicit_condition_overrides_reason_derivation() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 1, dec!(20.00), "sale-1").await;

    // Reason says "damaged" but staff judged it resellable.
    let mut line = return_line(item.id, "box damaged in transit", ReturnResolution::Refund);
    line.condition = Some(ItemCondition::Resellable);
    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code,
            staff_id: None,
            items: vec![line],
        })
        .await
        .unwrap();
    assert_eq!(
        records[0].return_request.condition,
        ItemCondition::Resellable.as_str()
    );

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert!(outcomes[0].restocked);
}

#[tokio::test]
async fn store_credit_activates_with_the_settlement_amount() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(15.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 2, dec!(15.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                quantity: Some(1),
                ..return_line(item.id, "changed my mind", ReturnResolution::StoreCredit)
            }],
        })
        .await
        .unwrap();
    let pending = records[0].store_credit.as_ref().expect("pending credit");
    assert_eq!(pending.status, StoreCreditStatus::Pending.as_str());

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Credited);
    let credit = outcomes[0].store_credit.as_ref().unwrap();
    assert_eq!(credit.status, StoreCreditStatus::Active.as_str());
    assert_eq!(credit.amount, dec!(15.00));
    assert_eq!(credit.used_amount, dec!(0));

    // One of two units credited and restocked.
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 9);
    let (reloaded, items) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(15.00));
    assert_eq!(items[0].status, SaleItemStatus::Returned.as_str());
}

#[tokio::test]
async fn exchange_for_cheaper_variant_refunds_the_difference() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let original = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    let cheaper = seed_variant(ctx.db.as_ref(), store_id, dec!(15.00)).await;
    restock(&ctx, store_id, original.id, 10, "seed-orig").await;
    restock(&ctx, store_id, cheaper.id, 10, "seed-new").await;
    let (sold_sale, item) = sell(&ctx, store_id, original.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                exchanges: vec![ReturnExchangeInput {
                    new_variant_id: cheaper.id,
                }],
                ..return_line(item.id, "prefer the other color", ReturnResolution::Exchange)
            }],
        })
        .await
        .unwrap();
    let leg = &records[0].exchanges[0];
    assert_eq!(leg.price_difference, dec!(-5.00));
    assert_eq!(leg.status, ExchangeStatus::Pending.as_str());

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Exchanged);
    assert_eq!(outcomes[0].exchanges.len(), 1);
    assert_eq!(
        outcomes[0].exchanges[0].status,
        ExchangeStatus::Completed.as_str()
    );
    assert_eq!(outcomes[0].refunds.len(), 1);
    let refund = &outcomes[0].refunds[0];
    assert_eq!(refund.amount, dec!(5.00));
    assert_eq!(refund.status, RefundStatus::Completed.as_str());

    // Replacement down one, original restocked, net keeps the lower price.
    let new_rec = ctx.inventory.get_record(store_id, cheaper.id).await.unwrap();
    assert_eq!(new_rec.quantity, 9);
    let orig_rec = ctx
        .inventory
        .get_record(store_id, original.id)
        .await
        .unwrap();
    assert_eq!(orig_rec.quantity, 10);
    let (reloaded, items) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(15.00));
    // Exchanges keep the line sold: the customer still holds goods from it.
    assert_eq!(items[0].status, SaleItemStatus::Sold.as_str());
}

#[tokio::test]
async fn multi_leg_exchange_reports_every_difference_refund() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let original = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    let cheaper_a = seed_variant(ctx.db.as_ref(), store_id, dec!(15.00)).await;
    let cheaper_b = seed_variant(ctx.db.as_ref(), store_id, dec!(18.00)).await;
    restock(&ctx, store_id, original.id, 10, "seed-orig").await;
    restock(&ctx, store_id, cheaper_a.id, 10, "seed-a").await;
    restock(&ctx, store_id, cheaper_b.id, 10, "seed-b").await;
    let (sold_sale, item) = sell(&ctx, store_id, original.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                exchanges: vec![
                    ReturnExchangeInput {
                        new_variant_id: cheaper_a.id,
                    },
                    ReturnExchangeInput {
                        new_variant_id: cheaper_b.id,
                    },
                ],
                ..return_line(item.id, "split into two smaller ones", ReturnResolution::Exchange)
            }],
        })
        .await
        .unwrap();

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Exchanged);
    assert_eq!(outcomes[0].exchanges.len(), 2);

    // Each cheaper leg settles its own difference refund.
    let mut amounts: Vec<Decimal> = outcomes[0].refunds.iter().map(|r| r.amount).collect();
    amounts.sort();
    assert_eq!(amounts, vec![dec!(2.00), dec!(5.00)]);
    for refund in &outcomes[0].refunds {
        assert_eq!(refund.status, RefundStatus::Completed.as_str());
    }

    // Both replacements down one, original restocked, net keeps both cuts.
    let rec_a = ctx
        .inventory
        .get_record(store_id, cheaper_a.id)
        .await
        .unwrap();
    assert_eq!(rec_a.quantity, 9);
    let rec_b = ctx
        .inventory
        .get_record(store_id, cheaper_b.id)
        .await
        .unwrap();
    assert_eq!(rec_b.quantity, 9);
    let orig_rec = ctx
        .inventory
        .get_record(store_id, original.id)
        .await
        .unwrap();
    assert_eq!(orig_rec.quantity, 10);
    let (reloaded, _) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(13.00));
}

#[tokio::test]
async fn exchange_for_pricier_variant_increments_net() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let original = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    let pricier = seed_variant(ctx.db.as_ref(), store_id, dec!(25.00)).await;
    restock(&ctx, store_id, original.id, 10, "seed-orig").await;
    restock(&ctx, store_id, pricier.id, 10, "seed-new").await;
    let (sold_sale, item) = sell(&ctx, store_id, original.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                exchanges: vec![ReturnExchangeInput {
                    new_variant_id: pricier.id,
                }],
                ..return_line(item.id, "want the bigger one", ReturnResolution::Exchange)
            }],
        })
        .await
        .unwrap();
    assert_eq!(records[0].exchanges[0].price_difference, dec!(5.00));

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Exchanged);
    assert!(outcomes[0].refunds.is_empty());

    let (reloaded, _) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(25.00));
    let new_rec = ctx.inventory.get_record(store_id, pricier.id).await.unwrap();
    assert_eq!(new_rec.quantity, 9);
}

#[tokio::test]
async fn exchange_aborts_when_replacement_is_out_of_stock() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let original = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    let replacement = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, original.id, 10, "seed-orig").await;
    let (sold_sale, item) = sell(&ctx, store_id, original.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                exchanges: vec![ReturnExchangeInput {
                    new_variant_id: replacement.id,
                }],
                ..return_line(item.id, "swap please", ReturnResolution::Exchange)
            }],
        })
        .await
        .unwrap();

    // Replacement was never stocked: the deduct has no record to touch.
    let result = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    // The aborted review left the return pending and the sale untouched.
    let reloaded = ctx
        .returns
        .get_return(records[0].return_request.id)
        .await
        .unwrap();
    assert_eq!(reloaded.return_request.status, ReturnStatus::Pending.as_str());
    let (sale_after, _) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(sale_after.net_amount, dec!(20.00));
}

#[tokio::test]
async fn rejection_settles_nothing() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![return_line(item.id, "no receipt", ReturnResolution::Refund)],
        })
        .await
        .unwrap();

    let outcomes = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], false))
        .await
        .unwrap();
    assert_eq!(outcomes[0].status, ReturnStatus::Rejected);
    assert!(outcomes[0].refunds.is_empty());
    assert!(!outcomes[0].restocked);

    // Stock, net amount, and the dependent refund are all untouched.
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 9);
    let (reloaded, items) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(reloaded.net_amount, dec!(20.00));
    assert_eq!(items[0].status, SaleItemStatus::Sold.as_str());
    let full = ctx
        .returns
        .get_return(records[0].return_request.id)
        .await
        .unwrap();
    assert_eq!(
        full.refund.as_ref().unwrap().status,
        RefundStatus::Pending.as_str()
    );

    // Terminal: a second review is rejected.
    let again = ctx
        .returns
        .review_returns(review_all(&[records[0].return_request.id], true))
        .await;
    assert_matches!(again, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn batch_review_is_all_or_nothing() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 2, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                quantity: Some(1),
                ..return_line(item.id, "wrong size", ReturnResolution::Refund)
            }],
        })
        .await
        .unwrap();

    // A bogus id anywhere in the batch aborts the real one too.
    let result = ctx
        .returns
        .review_returns(review_all(
            &[records[0].return_request.id, Uuid::new_v4()],
            true,
        ))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let reloaded = ctx
        .returns
        .get_return(records[0].return_request.id)
        .await
        .unwrap();
    assert_eq!(reloaded.return_request.status, ReturnStatus::Pending.as_str());
    let record = ctx.inventory.get_record(store_id, variant.id).await.unwrap();
    assert_eq!(record.quantity, 8);
    let (sale_after, _) = ctx.sales.get_sale(sold_sale.id).await.unwrap();
    assert_eq!(sale_after.net_amount, dec!(40.00));
}

#[tokio::test]
async fn review_honors_the_refund_method_override() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sold_sale, item) = sell(&ctx, store_id, variant.id, 1, dec!(20.00), "sale-1").await;

    let records = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sold_sale.sale_code,
            staff_id: None,
            items: vec![return_line(item.id, "wrong size", ReturnResolution::Refund)],
        })
        .await
        .unwrap();
    // Card sale: refund defaults to card.
    assert_eq!(
        records[0].refund.as_ref().unwrap().method,
        RefundMethod::Card.as_str()
    );

    let mut input = review_all(&[records[0].return_request.id], true);
    input.refund_method = Some(RefundMethod::Cash);
    let outcomes = ctx.returns.review_returns(input).await.unwrap();
    assert_eq!(outcomes[0].refunds[0].method, RefundMethod::Cash.as_str());
}

#[tokio::test]
async fn creation_rejects_bad_quantities_and_foreign_items() {
    let ctx = setup().await;
    let store_id = Uuid::new_v4();
    let variant = seed_variant(ctx.db.as_ref(), store_id, dec!(20.00)).await;
    restock(&ctx, store_id, variant.id, 10, "seed").await;
    let (sale_a, item_a) = sell(&ctx, store_id, variant.id, 2, dec!(20.00), "sale-a").await;
    let (sale_b, _item_b) = sell(&ctx, store_id, variant.id, 1, dec!(20.00), "sale-b").await;

    // More than was sold.
    let over = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sale_a.sale_code.clone(),
            staff_id: None,
            items: vec![ReturnLineInput {
                quantity: Some(3),
                ..return_line(item_a.id, "wrong size", ReturnResolution::Refund)
            }],
        })
        .await;
    assert_matches!(over, Err(ServiceError::ValidationError(_)));

    // Sale item cited under the wrong sale.
    let crossed = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: sale_b.sale_code.clone(),
            staff_id: None,
            items: vec![return_line(item_a.id, "wrong size", ReturnResolution::Refund)],
        })
        .await;
    assert_matches!(crossed, Err(ServiceError::InvalidOperation(_)));

    // Unknown sale code.
    let ghost = ctx
        .returns
        .create_return(CreateReturnInput {
            store_id,
            sale_code: "S-NOPE".to_string(),
            staff_id: None,
            items: vec![return_line(item_a.id, "wrong size", ReturnResolution::Refund)],
        })
        .await;
    assert_matches!(ghost, Err(ServiceError::NotFound(_)));
}
