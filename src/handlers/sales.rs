use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        sale::{self, PaymentMethod, PaymentStatus},
        sale_item,
    },
    errors::ServiceError,
    services::{
        notifications::ReceiptChannel,
        sales::{CreateSaleInput, ReceiptRequest, SaleLineInput},
    },
    AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaleLineRequest {
    pub variant_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReceiptOptions {
    pub channel: ReceiptChannel,
    pub address: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    pub store_id: Uuid,
    pub business_id: Uuid,
    #[validate(length(min = 1))]
    pub items: Vec<SaleLineRequest>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    pub customer: Option<CustomerInfo>,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: String,
    pub receipt: Option<ReceiptOptions>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSaleResponse {
    pub sale_id: Uuid,
    pub sale_code: String,
    pub net_amount: Decimal,
    pub replayed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleItemResponse {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub line_total: Decimal,
    pub status: String,
}

impl From<sale_item::Model> for SaleItemResponse {
    fn from(m: sale_item::Model) -> Self {
        Self {
            id: m.id,
            variant_id: m.variant_id,
            quantity: m.quantity,
            unit_price: m.unit_price,
            discount: m.discount,
            line_total: m.line_total,
            status: m.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleResponse {
    pub id: Uuid,
    pub store_id: Uuid,
    pub business_id: Uuid,
    pub sale_code: String,
    pub total_amount: Decimal,
    pub total_discount: Decimal,
    pub net_amount: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleItemResponse>,
}

impl SaleResponse {
    fn from_parts(sale: sale::Model, items: Vec<sale_item::Model>) -> Self {
        Self {
            id: sale.id,
            store_id: sale.store_id,
            business_id: sale.business_id,
            sale_code: sale.sale_code,
            total_amount: sale.total_amount,
            total_discount: sale.total_discount,
            net_amount: sale.net_amount,
            payment_method: sale.payment_method,
            payment_status: sale.payment_status,
            customer_name: sale.customer_name,
            created_at: sale.created_at,
            items: items.into_iter().map(SaleItemResponse::from).collect(),
        }
    }
}

pub fn sales_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale))
        .route("/:sale_id", get(get_sale))
}

#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created", body = CreateSaleResponse),
        (status = 200, description = "Sale replayed from idempotency key", body = CreateSaleResponse),
        (status = 404, description = "A line's variant has no inventory record"),
        (status = 422, description = "A line exceeds available stock")
    )
)]
async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    for line in &payload.items {
        line.validate()?;
    }

    let customer = payload.customer.unwrap_or(CustomerInfo {
        name: None,
        email: None,
        phone: None,
    });
    let outcome = state
        .services
        .sales
        .create_sale(CreateSaleInput {
            store_id: payload.store_id,
            business_id: payload.business_id,
            items: payload
                .items
                .iter()
                .map(|line| SaleLineInput {
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    discount: line.discount,
                })
                .collect(),
            payment_method: payload.payment_method,
            payment_status: payload.payment_status.unwrap_or(PaymentStatus::Paid),
            customer_name: customer.name,
            customer_email: customer.email,
            customer_phone: customer.phone,
            idempotency_key: payload.idempotency_key,
            receipt: payload.receipt.map(|r| ReceiptRequest {
                channel: r.channel,
                address: r.address,
            }),
        })
        .await?;

    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let message = if outcome.replayed {
        "Sale already recorded for this idempotency key".to_string()
    } else {
        "Sale created".to_string()
    };

    Ok((
        status,
        Json(CreateSaleResponse {
            sale_id: outcome.sale.id,
            sale_code: outcome.sale.sale_code,
            net_amount: outcome.sale.net_amount,
            replayed: outcome.replayed,
            message,
            receipt_url: outcome.receipt_url,
            warnings: outcome.warnings,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/sales/{sale_id}",
    responses(
        (status = 200, description = "Sale with its line items", body = SaleResponse),
        (status = 404, description = "Sale not found")
    )
)]
async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (sale, items) = state.services.sales.get_sale(sale_id).await?;
    Ok(Json(SaleResponse::from_parts(sale, items)))
}
