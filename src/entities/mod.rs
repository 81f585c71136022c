pub mod exchange;
pub mod inventory_log_entry;
pub mod inventory_record;
pub mod product_variant;
pub mod refund;
pub mod return_request;
pub mod sale;
pub mod sale_item;
pub mod stock_alert;
pub mod store_credit;
