use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a return request.
///
/// `Pending → {Approved → {Refunded | Exchanged | Credited}} | Rejected`.
/// Rejected and the three settled states are terminal; Approved is only ever
/// observed mid-review, inside the review transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Refunded,
    Exchanged,
    Credited,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Refunded => "refunded",
            ReturnStatus::Exchanged => "exchanged",
            ReturnStatus::Credited => "credited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReturnStatus::Pending),
            "approved" => Some(ReturnStatus::Approved),
            "rejected" => Some(ReturnStatus::Rejected),
            "refunded" => Some(ReturnStatus::Refunded),
            "exchanged" => Some(ReturnStatus::Exchanged),
            "credited" => Some(ReturnStatus::Credited),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReturnStatus::Pending | ReturnStatus::Approved)
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement path requested for a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReturnResolution {
    Refund,
    Exchange,
    StoreCredit,
}

impl ReturnResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnResolution::Refund => "refund",
            ReturnResolution::Exchange => "exchange",
            ReturnResolution::StoreCredit => "store_credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refund" => Some(ReturnResolution::Refund),
            "exchange" => Some(ReturnResolution::Exchange),
            "store_credit" => Some(ReturnResolution::StoreCredit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReturnResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the returned goods can go back on the shelf. Decided once at
/// creation (explicitly by staff, or derived from the stated reason when
/// omitted); review never re-inspects the reason text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    Resellable,
    Defective,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::Resellable => "resellable",
            ItemCondition::Defective => "defective",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resellable" => Some(ItemCondition::Resellable),
            "defective" => Some(ItemCondition::Defective),
            _ => None,
        }
    }
}

/// One return per (sale item, resolution request). Owns at most one refund,
/// one store credit, or one-or-more exchange legs depending on resolution.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "returns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sale_id: Uuid,
    pub sale_item_id: Uuid,
    pub store_id: Uuid,
    pub reason: String,
    pub resolution: String,
    pub condition: String,
    pub status: String,
    pub quantity: i32,
    pub staff_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale::Entity",
        from = "Column::SaleId",
        to = "super::sale::Column::Id"
    )]
    Sale,
    #[sea_orm(
        belongs_to = "super::sale_item::Entity",
        from = "Column::SaleItemId",
        to = "super::sale_item::Column::Id"
    )]
    SaleItem,
    #[sea_orm(has_many = "super::refund::Entity")]
    Refunds,
    #[sea_orm(has_many = "super::exchange::Entity")]
    Exchanges,
    #[sea_orm(has_many = "super::store_credit::Entity")]
    StoreCredits,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItem.def()
    }
}

impl Related<super::refund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Refunds.def()
    }
}

impl Related<super::exchange::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Exchanges.def()
    }
}

impl Related<super::store_credit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoreCredits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
