//! Dashboard read API
//!
//! Admin-facing JSON endpoints backing the (external) dashboard UI. Unlike the
//! tracking endpoints these may answer with proper error statuses; the caller
//! is a browser-based admin, not a recipient's mail client.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::{
    AnalyticsAggregator, AnalyticsEvent, AnalyticsSummary, BannerRanking, ReportWindow,
};
use crate::eligibility::{self, Eligibility, RecipientContext};
use crate::models::Banner;
use crate::rewrite::{rewrite_banner_html, TrackingLinks};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub aggregator: AnalyticsAggregator,
    pub links: TrackingLinks,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(context: &str, err: anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: context.to_string(),
        }),
    )
}

fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} not found"),
        }),
    )
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub window: Option<String>,
}

/// Windowed click/view totals and CTR
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    let window_str = query.window.as_deref().unwrap_or("7d");
    let Some(window) = ReportWindow::parse(window_str) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("unknown window '{window_str}', expected 24h, 7d, 30d or 90d"),
            }),
        ));
    };

    let now = chrono::Utc::now().timestamp();
    state
        .aggregator
        .summary(window, now)
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to compute analytics summary", e))
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Top banners by lifetime clicks
pub async fn get_top_banners(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<BannerRanking>>, ApiError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    state
        .aggregator
        .top_banners(limit)
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to rank banners", e))
}

/// Raw activity feed, newest first
pub async fn get_recent_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AnalyticsEvent>>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);
    state
        .aggregator
        .recent_events(limit)
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to list events", e))
}

/// List all banners
pub async fn list_banners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Banner>>, ApiError> {
    state
        .storage
        .list_banners()
        .await
        .map(Json)
        .map_err(|e| internal_error("failed to list banners", e))
}

/// Get a banner by id
pub async fn get_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Banner>, ApiError> {
    match state.storage.get_banner(id).await {
        Ok(Some(banner)) => Ok(Json(banner)),
        Ok(None) => Err(not_found("banner")),
        Err(e) => Err(internal_error("failed to get banner", e)),
    }
}

#[derive(Deserialize)]
pub struct EligibilityQuery {
    pub department: Option<String>,
    pub device: Option<String>,
    pub geo: Option<String>,
    pub audience: Option<String>,
}

#[derive(Serialize)]
pub struct EligibilityResponse {
    pub banner_id: i64,
    pub eligibility: Eligibility,
}

/// Probe a banner's eligibility for a recipient context
pub async fn get_banner_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<EligibilityQuery>,
) -> Result<Json<EligibilityResponse>, ApiError> {
    let banner = match state.storage.get_banner(id).await {
        Ok(Some(banner)) => banner,
        Ok(None) => return Err(not_found("banner")),
        Err(e) => return Err(internal_error("failed to get banner", e)),
    };

    let has_context = query.department.is_some()
        || query.device.is_some()
        || query.geo.is_some()
        || query.audience.is_some();
    let context = has_context.then(|| RecipientContext {
        department: query.department,
        device: query.device,
        geo: query.geo,
        audience: query.audience,
    });

    let now = chrono::Utc::now().timestamp();
    Ok(Json(EligibilityResponse {
        banner_id: id,
        eligibility: eligibility::evaluate(&banner, now, context.as_ref()),
    }))
}

#[derive(Deserialize)]
pub struct PreviewQuery {
    pub email: Option<String>,
    pub pixel: Option<bool>,
}

/// Preview a banner's tracked HTML, exactly as the assignment pipeline would
/// embed it into an outbound email.
pub async fn preview_banner(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<PreviewQuery>,
) -> Result<Html<String>, ApiError> {
    let banner = match state.storage.get_banner(id).await {
        Ok(Some(banner)) => banner,
        Ok(None) => return Err(not_found("banner")),
        Err(e) => return Err(internal_error("failed to get banner", e)),
    };

    let tracked = rewrite_banner_html(
        &banner.html,
        banner.id,
        query.email.as_deref(),
        query.pixel.unwrap_or(true),
        &state.links,
    );

    Ok(Html(tracked))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
