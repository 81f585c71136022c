use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreCreditStatus {
    Pending,
    Active,
    PartiallyUsed,
    Redeemed,
    Expired,
}

impl StoreCreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreCreditStatus::Pending => "pending",
            StoreCreditStatus::Active => "active",
            StoreCreditStatus::PartiallyUsed => "partially_used",
            StoreCreditStatus::Redeemed => "redeemed",
            StoreCreditStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StoreCreditStatus::Pending),
            "active" => Some(StoreCreditStatus::Active),
            "partially_used" => Some(StoreCreditStatus::PartiallyUsed),
            "redeemed" => Some(StoreCreditStatus::Redeemed),
            "expired" => Some(StoreCreditStatus::Expired),
            _ => None,
        }
    }
}

/// Store credit issued in settlement of an approved return. Pending until
/// activated by the review machine with the settlement amount.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_credits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub return_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub used_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_request::Entity",
        from = "Column::ReturnId",
        to = "super::return_request::Column::Id"
    )]
    Return,
}

impl Related<super::return_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Return.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
