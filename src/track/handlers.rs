use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;

use super::client_meta::client_meta;
use super::middleware::RequestStart;
use crate::analytics::{EventType, NewEvent};
use crate::eligibility::{self, Eligibility};
use crate::storage::Storage;

/// 1x1 transparent GIF89a. Served for every view request, no matter what
/// happened internally. A broken image icon in a rendered email is worse than
/// a dropped analytics event.
pub const TRANSPARENT_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // 1x1, 2-color palette
    0x00, 0x00, 0x00, 0xff, 0xff, 0xff, // palette
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // transparency on color 0
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // pixel data
    0x3b, // trailer
];

pub struct TrackState {
    pub storage: Arc<dyn Storage>,
    pub fallback_url: String,
    pub redirect_status: StatusCode,
    pub store_timeout: Duration,
    pub trust_proxy_headers: bool,
}

/// Failure taxonomy at the tracking boundary. Never surfaced to the client;
/// only logged before falling back to the contractual response.
#[derive(Debug, Error)]
enum TrackError {
    #[error("store operation timed out")]
    StoreTimeout,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Bound a store call so a slow or unavailable backend cannot hold the
/// response past the fallback deadline.
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, TrackError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TrackError::Store(err)),
        Err(_) => Err(TrackError::StoreTimeout),
    }
}

/// Resolve a tracked click: record the event, bump the capped counter, and
/// redirect to the banner's destination. Every path out of here is a redirect.
pub async fn track_click(
    State(state): State<Arc<TrackState>>,
    RawQuery(query): RawQuery,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let params = parse_query(query.as_deref());
    let banner_id = params.get("banner_id").and_then(|v| v.parse::<i64>().ok());
    let recipient = params.get("email").cloned();
    let now = chrono::Utc::now().timestamp();

    let Some(id) = banner_id else {
        tracing::debug!("click request without a usable banner_id");
        return redirect(&state, &state.fallback_url, request_start);
    };

    let banner = match bounded(state.store_timeout, state.storage.get_banner(id)).await {
        Ok(Some(banner)) => banner,
        Ok(None) => {
            tracing::debug!(banner_id = id, "click for unknown banner");
            return redirect(&state, &state.fallback_url, request_start);
        }
        Err(err) => {
            tracing::warn!(banner_id = id, error = %err, "banner lookup failed");
            return redirect(&state, &state.fallback_url, request_start);
        }
    };

    let verdict = eligibility::evaluate(&banner, now, None);

    // Every click attempt is observable in analytics, cap or no cap, and a
    // failed write must not block the redirect.
    let event = NewEvent {
        event_type: EventType::Click,
        banner_id: Some(banner.id),
        campaign_id: banner.campaign_id,
        recipient,
        timestamp: now,
        client: client_meta(&headers, addr, state.trust_proxy_headers),
        metadata: None,
    };
    if let Err(err) = bounded(state.store_timeout, state.storage.insert_event(&event)).await {
        tracing::warn!(banner_id = banner.id, error = %err, "failed to record click event");
    }

    // The counter only grows, so a CapReached verdict is trustworthy even from
    // a cached read and saves the round trip. Anything else goes to the store,
    // whose guard enforces the cap atomically under concurrent clicks.
    if verdict != Eligibility::CapReached {
        match bounded(
            state.store_timeout,
            state.storage.increment_clicks(banner.id),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(banner_id = banner.id, "click cap reached, not counted")
            }
            Err(err) => {
                tracing::warn!(banner_id = banner.id, error = %err, "failed to increment clicks")
            }
        }
    }

    // Navigation always succeeds while a destination exists, even past the cap
    // or outside the banner's window; the recipient already clicked.
    match banner.click_url.as_deref() {
        Some(url) if !url.is_empty() => redirect(&state, url, request_start),
        _ => redirect(&state, &state.fallback_url, request_start),
    }
}

/// Record a view and return the tracking pixel. Unconditionally 200.
pub async fn track_view(
    State(state): State<Arc<TrackState>>,
    RawQuery(query): RawQuery,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let params = parse_query(query.as_deref());
    let requested_id = params.get("banner_id").and_then(|v| v.parse::<i64>().ok());
    let recipient = params.get("email").cloned();
    let now = chrono::Utc::now().timestamp();

    // Attribution is best-effort: a view for an unknown banner is still
    // recorded, with a null banner reference and no campaign.
    let (banner_id, campaign_id) = match requested_id {
        Some(id) => match bounded(state.store_timeout, state.storage.get_banner(id)).await {
            Ok(Some(banner)) => (Some(banner.id), banner.campaign_id),
            Ok(None) => {
                tracing::debug!(banner_id = id, "view for unknown banner");
                (None, None)
            }
            Err(err) => {
                tracing::warn!(banner_id = id, error = %err, "banner lookup failed on view");
                (None, None)
            }
        },
        None => (None, None),
    };

    let event = NewEvent {
        event_type: EventType::View,
        banner_id,
        campaign_id,
        recipient,
        timestamp: now,
        client: client_meta(&headers, addr, state.trust_proxy_headers),
        metadata: None,
    };
    if let Err(err) = bounded(state.store_timeout, state.storage.insert_event(&event)).await {
        tracing::warn!(banner_id = ?banner_id, error = %err, "failed to record view event");
    }

    pixel_response()
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        TRANSPARENT_GIF,
    )
        .into_response()
}

fn redirect(state: &TrackState, target: &str, request_start: Instant) -> Response {
    // A destination that is not a valid header value falls back to the site
    // root; this endpoint never answers with an error status.
    let location = HeaderValue::from_str(target).unwrap_or_else(|_| HeaderValue::from_static("/"));

    let mut response = (state.redirect_status, [(header::LOCATION, location)]).into_response();
    let elapsed_ms = request_start.elapsed().as_millis().to_string();
    if let Ok(value) = HeaderValue::from_str(&elapsed_ms) {
        response.headers_mut().insert("x-beacon-timing-ms", value);
    }
    response
}

/// Lenient query-string parsing. Tracking URLs arrive from mail clients, link
/// scanners and copy-paste; whatever shape they are in, parsing must not be a
/// reason to reject the request. First occurrence of a key wins.
fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(raw) = raw else {
        return params;
    };

    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_insert_with(|| decode_component(value));
    }

    params
}

fn decode_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_bytes_are_a_gif() {
        assert_eq!(&TRANSPARENT_GIF[..6], b"GIF89a");
        assert_eq!(TRANSPARENT_GIF.len(), 43);
        assert_eq!(*TRANSPARENT_GIF.last().unwrap(), 0x3b);
    }

    #[test]
    fn query_parsing_basics() {
        let params = parse_query(Some("banner_id=42&email=user%40example.com"));
        assert_eq!(params.get("banner_id").unwrap(), "42");
        assert_eq!(params.get("email").unwrap(), "user@example.com");
    }

    #[test]
    fn query_parsing_handles_plus_and_missing_values() {
        let params = parse_query(Some("email=first+last%40example.com&flag&=x"));
        assert_eq!(params.get("email").unwrap(), "first last@example.com");
        assert_eq!(params.get("flag").unwrap(), "");
    }

    #[test]
    fn query_parsing_never_fails() {
        for raw in ["", "&&&", "=", "a=b=c", "%zz=1", "a=%"] {
            let _ = parse_query(Some(raw));
        }
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn first_occurrence_of_a_key_wins() {
        let params = parse_query(Some("banner_id=1&banner_id=2"));
        assert_eq!(params.get("banner_id").unwrap(), "1");
    }
}
