use axum::{
    extract::{Json, Path, Query, State},
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
        exchange, refund,
        refund::RefundMethod,
        return_request::{self, ItemCondition, ReturnResolution, ReturnStatus},
        store_credit,
    },
    errors::ServiceError,
    services::returns::{
        CreateReturnInput, ReturnExchangeInput, ReturnLineInput, ReturnRecord,
        ReturnReviewOutcome, ReviewDecision, ReviewReturnsInput,
    },
    AppState, PaginatedResponse,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExchangeTargetRequest {
    pub new_variant_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnLineRequest {
    pub sale_item_id: Uuid,
    #[validate(length(min = 1, max = 1024))]
    pub reason: String,
    pub resolution: ReturnResolution,
    pub quantity: Option<i32>,
    /// Explicit staff judgement; derived from the reason when omitted.
    pub condition: Option<ItemCondition>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeTargetRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReturnRequest {
    pub store_id: Uuid,
    #[validate(length(min = 1))]
    pub sale_code: String,
    pub staff_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub items: Vec<ReturnLineRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewReturnsRequest {
    #[validate(length(min = 1))]
    pub return_ids: Vec<Uuid>,
    pub approve: bool,
    pub notes: Option<String>,
    pub manager_id: Option<Uuid>,
    pub refund_method: Option<RefundMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub status: String,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<refund::Model> for RefundResponse {
    fn from(m: refund::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            method: m.method,
            status: m.status,
            processed_at: m.processed_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExchangeResponse {
    pub id: Uuid,
    pub new_variant_id: Uuid,
    pub price_difference: Decimal,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<exchange::Model> for ExchangeResponse {
    fn from(m: exchange::Model) -> Self {
        Self {
            id: m.id,
            new_variant_id: m.new_variant_id,
            price_difference: m.price_difference,
            status: m.status,
            completed_at: m.completed_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreCreditResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub used_amount: Decimal,
    pub status: String,
}

impl From<store_credit::Model> for StoreCreditResponse {
    fn from(m: store_credit::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            used_amount: m.used_amount,
            status: m.status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub sale_item_id: Uuid,
    pub store_id: Uuid,
    pub reason: String,
    pub resolution: String,
    pub condition: String,
    pub status: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exchanges: Vec<ExchangeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_credit: Option<StoreCreditResponse>,
}

impl From<ReturnRecord> for ReturnResponse {
    fn from(record: ReturnRecord) -> Self {
        let r = record.return_request;
        Self {
            id: r.id,
            sale_id: r.sale_id,
            sale_item_id: r.sale_item_id,
            store_id: r.store_id,
            reason: r.reason,
            resolution: r.resolution,
            condition: r.condition,
            status: r.status,
            quantity: r.quantity,
            created_at: r.created_at,
            reviewed_at: r.reviewed_at,
            refund: record.refund.map(RefundResponse::from),
            exchanges: record
                .exchanges
                .into_iter()
                .map(ExchangeResponse::from)
                .collect(),
            store_credit: record.store_credit.map(StoreCreditResponse::from),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewOutcomeResponse {
    pub return_id: Uuid,
    pub status: String,
    pub restocked: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refunds: Vec<RefundResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exchanges: Vec<ExchangeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_credit: Option<StoreCreditResponse>,
}

impl From<ReturnReviewOutcome> for ReviewOutcomeResponse {
    fn from(outcome: ReturnReviewOutcome) -> Self {
        Self {
            return_id: outcome.return_id,
            status: outcome.status.as_str().to_string(),
            restocked: outcome.restocked,
            refunds: outcome
                .refunds
                .into_iter()
                .map(RefundResponse::from)
                .collect(),
            exchanges: outcome
                .exchanges
                .into_iter()
                .map(ExchangeResponse::from)
                .collect(),
            store_credit: outcome.store_credit.map(StoreCreditResponse::from),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnSummaryResponse {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub sale_item_id: Uuid,
    pub resolution: String,
    pub status: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<return_request::Model> for ReturnSummaryResponse {
    fn from(m: return_request::Model) -> Self {
        Self {
            id: m.id,
            sale_id: m.sale_id,
            sale_item_id: m.sale_item_id,
            resolution: m.resolution,
            status: m.status,
            quantity: m.quantity,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ReturnFilters {
    pub store_id: Option<Uuid>,
    /// pending | approved | rejected | refunded | exchanged | credited
    pub status: Option<String>,
    #[serde(default = "super::default_page")]
    pub page: u64,
    #[serde(default = "super::default_limit")]
    pub limit: u64,
}

pub fn returns_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_return).get(list_returns))
        .route("/review", post(review_returns))
        .route("/:return_id", get(get_return))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns",
    request_body = CreateReturnRequest,
    responses(
        (status = 201, description = "Returns opened in pending state", body = [ReturnResponse]),
        (status = 400, description = "Quantity exceeds sold quantity or item/sale mismatch"),
        (status = 404, description = "Sale or sale item not found")
    )
)]
async fn create_return(
    State(state): State<AppState>,
    Json(payload): Json<CreateReturnRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    for line in &payload.items {
        line.validate()?;
    }

    let records = state
        .services
        .returns
        .create_return(CreateReturnInput {
            store_id: payload.store_id,
            sale_code: payload.sale_code,
            staff_id: payload.staff_id,
            items: payload
                .items
                .into_iter()
                .map(|line| ReturnLineInput {
                    sale_item_id: line.sale_item_id,
                    reason: line.reason,
                    resolution: line.resolution,
                    quantity: line.quantity,
                    condition: line.condition,
                    exchanges: line
                        .exchanges
                        .into_iter()
                        .map(|e| ReturnExchangeInput {
                            new_variant_id: e.new_variant_id,
                        })
                        .collect(),
                    notes: line.notes,
                })
                .collect(),
        })
        .await?;

    let body: Vec<ReturnResponse> = records.into_iter().map(ReturnResponse::from).collect();
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/review",
    request_body = ReviewReturnsRequest,
    responses(
        (status = 200, description = "Every return in the batch reviewed", body = [ReviewOutcomeResponse]),
        (status = 400, description = "A return in the batch is not pending"),
        (status = 404, description = "A return, sale item, or exchange target is missing; nothing committed")
    )
)]
async fn review_returns(
    State(state): State<AppState>,
    Json(payload): Json<ReviewReturnsRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let outcomes = state
        .services
        .returns
        .review_returns(ReviewReturnsInput {
            manager_id: payload.manager_id,
            refund_method: payload.refund_method,
            decisions: payload
                .return_ids
                .into_iter()
                .map(|return_id| ReviewDecision {
                    return_id,
                    approve: payload.approve,
                    notes: payload.notes.clone(),
                })
                .collect(),
        })
        .await?;

    let body: Vec<ReviewOutcomeResponse> =
        outcomes.into_iter().map(ReviewOutcomeResponse::from).collect();
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/{return_id}",
    responses(
        (status = 200, description = "Return with its settlement records", body = ReturnResponse),
        (status = 404, description = "Return not found")
    )
)]
async fn get_return(
    State(state): State<AppState>,
    Path(return_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.services.returns.get_return(return_id).await?;
    Ok(Json(ReturnResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns",
    params(ReturnFilters),
    responses(
        (status = 200, description = "Returns, newest first", body = PaginatedResponse<ReturnSummaryResponse>)
    )
)]
async fn list_returns(
    State(state): State<AppState>,
    Query(filters): Query<ReturnFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = match &filters.status {
        Some(raw) => Some(ReturnStatus::parse(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("Unknown return status {}", raw))
        })?),
        None => None,
    };
    let page = filters.page.max(1);
    let limit = filters.limit.clamp(1, 200);

    let (returns, total) = state
        .services
        .returns
        .list_returns(filters.store_id, status, page, limit)
        .await?;
    let items: Vec<ReturnSummaryResponse> = returns
        .into_iter()
        .map(ReturnSummaryResponse::from)
        .collect();
    Ok(Json(PaginatedResponse::new(items, total, page, limit)))
}
