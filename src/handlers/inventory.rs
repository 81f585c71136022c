use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        inventory_log_entry::{self, LedgerEntryType},
        inventory_record,
        stock_alert::{self, AlertStatus},
    },
    errors::ServiceError,
    handlers::PaginationParams,
    services::inventory::AdjustStockInput,
    AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    pub store_id: Uuid,
    pub variant_id: Uuid,
    /// Signed quantity delta; negative values deduct.
    pub change: i32,
    /// One of: restock, deduct, return_restock, exchange_adjust.
    pub entry_type: String,
    #[validate(length(min = 1, max = 255))]
    pub idempotency_key: String,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustStockResponse {
    pub inventory_id: Uuid,
    pub new_quantity: i32,
    pub alert_created: bool,
    pub replayed: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetThresholdRequest {
    #[validate(range(min = 0))]
    pub low_stock_threshold: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InventoryRecordResponse {
    pub id: Uuid,
    pub store_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reserved: i32,
    pub available: i32,
    pub low_stock_threshold: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<inventory_record::Model> for InventoryRecordResponse {
    fn from(m: inventory_record::Model) -> Self {
        let available = m.available();
        Self {
            id: m.id,
            store_id: m.store_id,
            variant_id: m.variant_id,
            quantity: m.quantity,
            reserved: m.reserved,
            available,
            low_stock_threshold: m.low_stock_threshold,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub idempotency_key: String,
    pub change: i32,
    pub entry_type: String,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub actor: Option<String>,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub alert_created: bool,
    pub created_at: DateTime<Utc>,
}

impl From<inventory_log_entry::Model> for LedgerEntryResponse {
    fn from(m: inventory_log_entry::Model) -> Self {
        Self {
            id: m.id,
            inventory_id: m.inventory_id,
            idempotency_key: m.idempotency_key,
            change: m.change,
            entry_type: m.entry_type,
            reason: m.reason,
            reference: m.reference,
            actor: m.actor,
            previous_quantity: m.previous_quantity,
            new_quantity: m.new_quantity,
            alert_created: m.alert_created,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockAlertResponse {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub threshold: i32,
    pub quantity_at_trigger: i32,
    pub status: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl From<stock_alert::Model> for StockAlertResponse {
    fn from(m: stock_alert::Model) -> Self {
        Self {
            id: m.id,
            inventory_id: m.inventory_id,
            threshold: m.threshold,
            quantity_at_trigger: m.quantity_at_trigger,
            status: m.status,
            triggered_at: m.triggered_at,
            acknowledged_at: m.acknowledged_at,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct AlertFilters {
    /// active | acknowledged
    pub status: Option<String>,
    #[serde(default = "super::default_page")]
    pub page: u64,
    #[serde(default = "super::default_limit")]
    pub limit: u64,
}

pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/adjust", post(adjust_stock))
        .route("/:store_id/:variant_id", get(get_record))
        .route("/:store_id/:variant_id/threshold", put(set_threshold))
        .route("/records/:inventory_id/ledger", get(list_ledger))
        .route("/alerts", get(list_alerts))
        .route("/alerts/:alert_id/acknowledge", post(acknowledge_alert))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjust",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Adjustment applied or replayed", body = AdjustStockResponse),
        (status = 409, description = "Idempotency key reused with a different payload"),
        (status = 422, description = "Adjustment would drive quantity negative")
    )
)]
async fn adjust_stock(
    State(state): State<AppState>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let entry_type = LedgerEntryType::parse(&payload.entry_type).ok_or_else(|| {
        ServiceError::InvalidInput(format!("Unknown entry type {}", payload.entry_type))
    })?;

    let adjustment = state
        .services
        .inventory
        .adjust_stock(AdjustStockInput {
            store_id: payload.store_id,
            variant_id: payload.variant_id,
            change: payload.change,
            entry_type,
            idempotency_key: payload.idempotency_key,
            reason: payload.reason,
            reference: payload.reference,
            actor: payload.actor,
        })
        .await?;

    Ok(Json(AdjustStockResponse {
        inventory_id: adjustment.inventory_id,
        new_quantity: adjustment.new_quantity,
        alert_created: adjustment.alert_created,
        replayed: adjustment.replayed,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/{store_id}/{variant_id}",
    responses(
        (status = 200, description = "Inventory record", body = InventoryRecordResponse),
        (status = 404, description = "No record for this store/variant")
    )
)]
async fn get_record(
    State(state): State<AppState>,
    Path((store_id, variant_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.services.inventory.get_record(store_id, variant_id).await?;
    Ok(Json(InventoryRecordResponse::from(record)))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/{store_id}/{variant_id}/threshold",
    request_body = SetThresholdRequest,
    responses(
        (status = 200, description = "Threshold updated", body = InventoryRecordResponse),
        (status = 404, description = "No record for this store/variant")
    )
)]
async fn set_threshold(
    State(state): State<AppState>,
    Path((store_id, variant_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetThresholdRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let record = state
        .services
        .inventory
        .set_low_stock_threshold(store_id, variant_id, payload.low_stock_threshold)
        .await?;
    Ok(Json(InventoryRecordResponse::from(record)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/records/{inventory_id}/ledger",
    params(PaginationParams),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = PaginatedResponse<LedgerEntryResponse>)
    )
)]
async fn list_ledger(
    State(state): State<AppState>,
    Path(inventory_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let pagination = pagination.clamped();
    let (entries, total) = state
        .services
        .inventory
        .list_ledger(inventory_id, pagination.page, pagination.limit)
        .await?;
    let items = entries.into_iter().map(LedgerEntryResponse::from).collect();
    Ok(Json(PaginatedResponse::new(
        items,
        total,
        pagination.page,
        pagination.limit,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/alerts",
    params(AlertFilters),
    responses(
        (status = 200, description = "Stock alerts, newest first", body = PaginatedResponse<StockAlertResponse>)
    )
)]
async fn list_alerts(
    State(state): State<AppState>,
    Query(filters): Query<AlertFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = match &filters.status {
        Some(raw) => Some(AlertStatus::parse(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("Unknown alert status {}", raw))
        })?),
        None => None,
    };
    let page = filters.page.max(1);
    let limit = filters.limit.clamp(1, 200);

    let (alerts, total) = state.services.alerts.list_alerts(status, page, limit).await?;
    let items = alerts.into_iter().map(StockAlertResponse::from).collect();
    Ok(Json(PaginatedResponse::new(items, total, page, limit)))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/alerts/{alert_id}/acknowledge",
    responses(
        (status = 200, description = "Alert acknowledged", body = StockAlertResponse),
        (status = 400, description = "Alert is not active"),
        (status = 404, description = "Alert not found")
    )
)]
async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let alert = state.services.alerts.acknowledge_alert(alert_id).await?;
    Ok((StatusCode::OK, Json(StockAlertResponse::from(alert))))
}
