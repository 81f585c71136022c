use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{config::AppConfig, events::EventSender};

pub mod alerts;
pub mod catalog;
pub mod inventory;
pub mod notifications;
pub mod returns;
pub mod sales;

/// Service layer wired once at startup and shared through the router state.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: inventory::InventoryService,
    pub sales: sales::SaleService,
    pub returns: returns::ReturnService,
    pub alerts: alerts::AlertService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        receipts: Arc<dyn notifications::ReceiptService>,
        config: &AppConfig,
    ) -> Self {
        let threshold = config.default_low_stock_threshold;
        Self {
            inventory: inventory::InventoryService::new(
                db.clone(),
                event_sender.clone(),
                threshold,
            ),
            sales: sales::SaleService::new(db.clone(), event_sender.clone(), receipts, threshold),
            returns: returns::ReturnService::new(db.clone(), event_sender, threshold),
            alerts: alerts::AlertService::new(db),
        }
    }
}
