use axum::{http::StatusCode, middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::Storage;

use super::handlers::{health_check, track_click, track_view, TrackState};
use super::middleware::record_request_start;

pub fn create_track_router(
    storage: Arc<dyn Storage>,
    fallback_url: String,
    redirect_status: StatusCode,
    store_timeout: Duration,
    trust_proxy_headers: bool,
) -> Router {
    let state = Arc::new(TrackState {
        storage,
        fallback_url,
        redirect_status,
        store_timeout,
        trust_proxy_headers,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/track/click", get(track_click))
        .route("/track/view", get(track_view))
        .layer(middleware::from_fn(record_request_start))
        .with_state(state)
}
