use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of quantity-affecting ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Restock,
    Deduct,
    ReturnRestock,
    ExchangeAdjust,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Restock => "restock",
            LedgerEntryType::Deduct => "deduct",
            LedgerEntryType::ReturnRestock => "return_restock",
            LedgerEntryType::ExchangeAdjust => "exchange_adjust",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "restock" => Some(LedgerEntryType::Restock),
            "deduct" => Some(LedgerEntryType::Deduct),
            "return_restock" => Some(LedgerEntryType::ReturnRestock),
            "exchange_adjust" => Some(LedgerEntryType::ExchangeAdjust),
            _ => None,
        }
    }

    /// Entry kinds that require a pre-existing inventory record. Only a plain
    /// restock may create the record it touches.
    pub fn requires_existing_record(&self) -> bool {
        !matches!(self, LedgerEntryType::Restock)
    }
}

impl std::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only ledger of every approved quantity change, keyed by the
/// caller-supplied idempotency token. Never updated or deleted; a replayed
/// key returns the outcome recorded here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_log_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub inventory_id: Uuid,
    #[sea_orm(unique)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_record::Entity",
        from = "Column::InventoryId",
        to = "super::inventory_record::Column::Id"
    )]
    InventoryRecord,
}

impl Related<super::inventory_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_round_trips() {
        for t in [
            LedgerEntryType::Restock,
            LedgerEntryType::Deduct,
            LedgerEntryType::ReturnRestock,
            LedgerEntryType::ExchangeAdjust,
        ] {
            assert_eq!(LedgerEntryType::parse(t.as_str()), Some(t));
        }
        assert_eq!(LedgerEntryType::parse("transfer"), None);
    }

    #[test]
    fn only_restock_creates_records() {
        assert!(!LedgerEntryType::Restock.requires_existing_record());
        assert!(LedgerEntryType::Deduct.requires_existing_record());
        assert!(LedgerEntryType::ReturnRestock.requires_existing_record());
        assert!(LedgerEntryType::ExchangeAdjust.requires_existing_record());
    }
}
