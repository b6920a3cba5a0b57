use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::analytics::AnalyticsAggregator;
use crate::rewrite::TrackingLinks;
use crate::storage::Storage;

use super::handlers::{
    get_banner, get_banner_eligibility, get_recent_events, get_summary, get_top_banners,
    health_check, list_banners, preview_banner, AppState,
};

pub fn create_api_router(storage: Arc<dyn Storage>, links: TrackingLinks) -> Router {
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));
    let state = Arc::new(AppState {
        storage,
        aggregator,
        links,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/api/analytics/summary", get(get_summary))
        .route("/api/analytics/top", get(get_top_banners))
        .route("/api/analytics/events", get(get_recent_events))
        .route("/api/banners", get(list_banners))
        .route("/api/banners/{id}", get(get_banner))
        .route("/api/banners/{id}/eligibility", get(get_banner_eligibility))
        .route("/api/banners/{id}/preview", get(preview_banner))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
