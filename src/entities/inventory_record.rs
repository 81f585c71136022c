use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per (store, variant) quantity aggregate. Mutated exclusively through the
/// stock adjustment engine; quantity never goes below zero.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reserved: i32,
    pub low_stock_threshold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Quantity a sale may still claim: on-hand minus reserved.
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_log_entry::Entity")]
    LogEntries,
    #[sea_orm(has_many = "super::stock_alert::Entity")]
    Alerts,
}

impl Related<super::inventory_log_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LogEntries.def()
    }
}

impl Related<super::stock_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
