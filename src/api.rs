use axum::Router;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    handlers::{
        health::health_router, inventory::inventory_router, returns::returns_router,
        sales::sales_router,
    },
    AppState,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles the full HTTP surface.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/inventory", inventory_router())
        .nest("/api/v1/sales", sales_router())
        .nest("/api/v1/returns", returns_router())
        .merge(health_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
