use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::notifications::NotificationService;

/// Events emitted by the core pipelines after their transactions commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Ledger events
    StockAdjusted {
        inventory_id: Uuid,
        entry_type: String,
        change: i32,
        new_quantity: i32,
    },
    LowStockAlertTriggered {
        alert_id: Uuid,
        inventory_id: Uuid,
        quantity: i32,
        threshold: i32,
    },

    // Sale events
    SaleCreated(Uuid),

    // Return events
    ReturnCreated(Uuid),
    ReturnRejected(Uuid),
    ReturnRefunded {
        return_id: Uuid,
        refund_id: Uuid,
        amount: Decimal,
    },
    ReturnExchanged {
        return_id: Uuid,
    },
    ReturnCredited {
        return_id: Uuid,
        store_credit_id: Uuid,
        amount: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the processor is gone.
    /// Events are emitted after commit; a dropped event never rolls back a
    /// committed mutation.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Consumes domain events: logs each one and forwards low-stock alerts to
/// the notification collaborator when an ops address is configured.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    notifier: Arc<dyn NotificationService>,
    alert_address: Option<String>,
) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStockAlertTriggered {
                alert_id,
                inventory_id,
                quantity,
                threshold,
            } => {
                info!(
                    alert_id = %alert_id,
                    inventory_id = %inventory_id,
                    quantity,
                    threshold,
                    "Low stock alert triggered"
                );
                if let Some(address) = &alert_address {
                    let message = format!(
                        "Low stock: inventory {} at {} (threshold {})",
                        inventory_id, quantity, threshold
                    );
                    if let Err(e) = notifier.deliver(address, &message).await {
                        warn!(alert_id = %alert_id, "Alert notification failed: {}", e);
                    }
                }
            }
            other => info!(event = ?other, "Domain event"),
        }
    }
    info!("Event channel closed; processor exiting");
}
