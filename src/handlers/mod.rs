use serde::Deserialize;
use utoipa::IntoParams;

pub mod health;
pub mod inventory;
pub mod returns;
pub mod sales;

/// Shared pagination query parameters (1-based page).
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    50
}

impl PaginationParams {
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 200),
        }
    }
}
