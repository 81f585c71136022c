use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Delivery channel requested for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptChannel {
    Email,
    Sms,
}

/// Structured receipt data handed to the receipt collaborator after a sale
/// commits. Rendering, storage, and delivery all happen outside the core.
#[derive(Debug, Clone)]
pub struct ReceiptDocument {
    pub sale_id: Uuid,
    pub sale_code: String,
    pub store_id: Uuid,
    pub net_amount: Decimal,
    pub customer_name: Option<String>,
    pub channel: ReceiptChannel,
    pub address: String,
}

/// External collaborator: persist a rendered document for the given receipt
/// data and return its retrieval URL.
#[async_trait]
pub trait ReceiptService: Send + Sync {
    async fn deliver_receipt(&self, receipt: &ReceiptDocument) -> Result<String, ServiceError>;
}

/// External collaborator: deliver a message to an address.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn deliver(&self, address: &str, message: &str) -> Result<(), ServiceError>;
}

/// Default implementation that only logs. Deployments swap in a real
/// document/mail backend behind the same trait.
#[derive(Debug, Default, Clone)]
pub struct LoggingReceiptService;

#[async_trait]
impl ReceiptService for LoggingReceiptService {
    async fn deliver_receipt(&self, receipt: &ReceiptDocument) -> Result<String, ServiceError> {
        info!(
            sale_code = %receipt.sale_code,
            channel = ?receipt.channel,
            address = %receipt.address,
            "Receipt delivery requested"
        );
        Ok(format!("local://receipts/{}", receipt.sale_code))
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingNotificationService;

#[async_trait]
impl NotificationService for LoggingNotificationService {
    async fn deliver(&self, address: &str, message: &str) -> Result<(), ServiceError> {
        info!(address = %address, message = %message, "Notification delivery requested");
        Ok(())
    }
}
