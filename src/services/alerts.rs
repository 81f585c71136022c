use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        inventory_record,
        stock_alert::{self, AlertStatus, Entity as StockAlert},
    },
    errors::ServiceError,
};

/// Evaluates the low-stock condition after an adjustment and records an
/// alert when it fires.
///
/// An alert is created when the post-adjustment quantity sits at or below the
/// record's threshold and no Active alert already exists for the record
/// (acknowledging the prior alert re-arms it). Runs inside the caller's
/// transaction; notification dispatch happens elsewhere, after commit.
pub async fn maybe_trigger_low_stock<C: ConnectionTrait>(
    db: &C,
    record: &inventory_record::Model,
    new_quantity: i32,
) -> Result<Option<stock_alert::Model>, ServiceError> {
    if new_quantity > record.low_stock_threshold {
        return Ok(None);
    }

    let existing = StockAlert::find()
        .filter(stock_alert::Column::InventoryId.eq(record.id))
        .filter(stock_alert::Column::Status.eq(AlertStatus::Active.as_str()))
        .one(db)
        .await
        .map_err(ServiceError::db_error)?;

    if existing.is_some() {
        return Ok(None);
    }

    let alert = stock_alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        inventory_id: Set(record.id),
        threshold: Set(record.low_stock_threshold),
        quantity_at_trigger: Set(new_quantity),
        status: Set(AlertStatus::Active.as_str().to_string()),
        triggered_at: Set(Utc::now()),
        acknowledged_at: Set(None),
    };

    let alert = alert.insert(db).await.map_err(ServiceError::db_error)?;
    info!(
        alert_id = %alert.id,
        inventory_id = %record.id,
        quantity = new_quantity,
        threshold = record.low_stock_threshold,
        "Stock alert recorded"
    );

    Ok(Some(alert))
}

/// Query/acknowledge surface over recorded alerts.
#[derive(Clone)]
pub struct AlertService {
    db: Arc<DatabaseConnection>,
}

impl AlertService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_alert::Model>, u64), ServiceError> {
        let mut query = StockAlert::find().order_by_desc(stock_alert::Column::TriggeredAt);
        if let Some(status) = status {
            query = query.filter(stock_alert::Column::Status.eq(status.as_str()));
        }

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let alerts = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((alerts, total))
    }

    /// Marks an alert acknowledged, re-arming alert creation for its record.
    #[instrument(skip(self))]
    pub async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<stock_alert::Model, ServiceError> {
        let alert = StockAlert::find_by_id(alert_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Alert {} not found", alert_id)))?;

        if AlertStatus::parse(&alert.status) != Some(AlertStatus::Active) {
            return Err(ServiceError::InvalidOperation(format!(
                "Alert {} is not active",
                alert_id
            )));
        }

        let mut active: stock_alert::ActiveModel = alert.into();
        active.status = Set(AlertStatus::Acknowledged.as_str().to_string());
        active.acknowledged_at = Set(Some(Utc::now()));

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }
}
