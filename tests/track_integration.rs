//! Tracking endpoint integration tests
//!
//! These exercise the hard contracts of the tracking surface: clicks always
//! answer with a redirect (never an error status), views always answer with a
//! valid pixel, events are recorded per attempt, and the click cap is enforced
//! exactly, including under concurrent requests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use beacon::models::NewBanner;
use beacon::storage::{SqliteStorage, Storage};
use beacon::track::handlers::TRANSPARENT_GIF;
use beacon::track::routes::create_track_router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

const FALLBACK_URL: &str = "https://dashboard.example.com/";

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_router(storage: Arc<dyn Storage>) -> axum::Router {
    create_track_router(
        storage,
        FALLBACK_URL.to_string(),
        StatusCode::FOUND,
        Duration::from_secs(2),
        false,
    )
    .layer(TestConnectInfoLayer)
}

async fn create_banner(storage: &Arc<dyn Storage>, banner: NewBanner) -> i64 {
    storage.create_banner(&banner).await.unwrap().id
}

fn promo_banner(click_url: Option<&str>, max_clicks: Option<i64>) -> NewBanner {
    NewBanner {
        name: "spring-promo".to_string(),
        html: r#"<img src="cid:banner">"#.to_string(),
        click_url: click_url.map(|s| s.to_string()),
        max_clicks,
        ..Default::default()
    }
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect must carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));

        self.inner.call(req)
    }
}

#[tokio::test]
async fn test_click_redirects_and_records() {
    let storage = create_test_storage().await;
    let id = create_banner(
        &storage,
        promo_banner(Some("https://shop.example.com/deal"), None),
    )
    .await;
    let app = test_router(Arc::clone(&storage));

    let uri = format!("/track/click?banner_id={}&email=user%40corp.example", id);
    let response = get(&app, &uri).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://shop.example.com/deal");

    let banner = storage.get_banner(id).await.unwrap().unwrap();
    assert_eq!(banner.current_clicks, 1);

    let events = storage.recent_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "click");
    assert_eq!(events[0].banner_id, Some(id));
    assert_eq!(events[0].recipient.as_deref(), Some("user@corp.example"));
    assert!(events[0].client_ip.is_some());
}

#[tokio::test]
async fn test_click_unknown_banner_falls_back() {
    let storage = create_test_storage().await;
    let app = test_router(Arc::clone(&storage));

    let response = get(&app, "/track/click?banner_id=9999").await;

    assert_eq!(
        response.status(),
        StatusCode::FOUND,
        "unknown banner must still redirect, never error"
    );
    assert_eq!(location(&response), FALLBACK_URL);

    // Nothing to attribute: no event is written for unresolvable clicks
    assert!(storage.recent_events(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_click_without_banner_id_falls_back() {
    let storage = create_test_storage().await;
    let app = test_router(storage);

    for uri in ["/track/click", "/track/click?banner_id=not-a-number"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::FOUND, "uri: {uri}");
        assert_eq!(location(&response), FALLBACK_URL, "uri: {uri}");
    }
}

#[tokio::test]
async fn test_click_without_destination_uses_fallback_but_still_counts() {
    let storage = create_test_storage().await;
    let id = create_banner(&storage, promo_banner(None, None)).await;
    let app = test_router(Arc::clone(&storage));

    let response = get(&app, &format!("/track/click?banner_id={}", id)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), FALLBACK_URL);

    let banner = storage.get_banner(id).await.unwrap().unwrap();
    assert_eq!(banner.current_clicks, 1, "click is counted even without a destination");
    assert_eq!(storage.recent_events(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_inactive_banner_still_redirects() {
    // Emails outlive banner lifecycles; navigation is never broken.
    let storage = create_test_storage().await;
    let id = create_banner(
        &storage,
        promo_banner(Some("https://shop.example.com"), None),
    )
    .await;
    storage.set_banner_active(id, false).await.unwrap();

    let app = test_router(Arc::clone(&storage));
    let response = get(&app, &format!("/track/click?banner_id={}", id)).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://shop.example.com");
}

#[tokio::test]
async fn test_sequential_clicks_respect_cap() {
    // Scenario from the cap contract: cap 2, three clicks. All three redirect
    // to the destination and are recorded; only two are counted.
    let storage = create_test_storage().await;
    let id = create_banner(
        &storage,
        promo_banner(Some("https://shop.example.com/deal"), Some(2)),
    )
    .await;
    let app = test_router(Arc::clone(&storage));

    for _ in 0..3 {
        let response = get(&app, &format!("/track/click?banner_id={}", id)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "https://shop.example.com/deal");
    }

    let banner = storage.get_banner(id).await.unwrap().unwrap();
    assert_eq!(banner.current_clicks, 2, "counter stops exactly at the cap");
    assert_eq!(
        storage.recent_events(10).await.unwrap().len(),
        3,
        "every attempt is observable in analytics"
    );
}

#[tokio::test]
async fn test_concurrent_clicks_never_exceed_cap() {
    let storage = create_test_storage().await;
    let id = create_banner(
        &storage,
        promo_banner(Some("https://shop.example.com/deal"), Some(5)),
    )
    .await;
    let app = test_router(Arc::clone(&storage));

    let mut handles = vec![];
    for _ in 0..20 {
        let app_clone = app.clone();
        let uri = format!("/track/click?banner_id={}", id);
        handles.push(tokio::spawn(async move {
            let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
            app_clone.oneshot(request).await
        }));
    }

    let mut redirected = 0;
    for handle in handles {
        if let Ok(Ok(response)) = handle.await {
            if response.status() == StatusCode::FOUND {
                redirected += 1;
            }
        }
    }
    assert_eq!(redirected, 20, "all 20 clicks must redirect");

    let banner = storage.get_banner(id).await.unwrap().unwrap();
    assert_eq!(banner.current_clicks, 5, "cap is never exceeded under concurrency");
    assert_eq!(storage.recent_events(100).await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_view_returns_pixel_and_records() {
    let storage = create_test_storage().await;
    let id = create_banner(&storage, promo_banner(None, None)).await;
    let app = test_router(Arc::clone(&storage));

    let uri = format!("/track/view?banner_id={}&email=user%40corp.example", id);
    let response = get(&app, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/gif"
    );
    let cache_control = response
        .headers()
        .get("cache-control")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cache_control.contains("no-store"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), TRANSPARENT_GIF);

    let events = storage.recent_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "view");
    assert_eq!(events[0].banner_id, Some(id));
}

#[tokio::test]
async fn test_view_unknown_banner_still_returns_pixel() {
    let storage = create_test_storage().await;
    let app = test_router(storage);

    let response = get(&app, "/track/view?banner_id=424242").await;

    assert_eq!(response.status(), StatusCode::OK, "never an error status");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..6], b"GIF89a", "body is a valid image either way");
}

#[tokio::test]
async fn test_view_unknown_banner_records_null_reference() {
    let storage = create_test_storage().await;
    let app = test_router(Arc::clone(&storage));

    get(&app, "/track/view?banner_id=424242").await;

    let events = storage.recent_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "view");
    assert_eq!(events[0].banner_id, None);
}

#[tokio::test]
async fn test_view_malformed_input_still_returns_pixel() {
    let storage = create_test_storage().await;
    let app = test_router(storage);

    for uri in [
        "/track/view",
        "/track/view?banner_id=abc",
        "/track/view?banner_id=1&banner_id=2&&&=%zz",
    ] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "uri: {uri}");
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "image/gif",
            "uri: {uri}"
        );
    }
}

#[tokio::test]
async fn test_click_timing_header_present() {
    let storage = create_test_storage().await;
    let id = create_banner(
        &storage,
        promo_banner(Some("https://shop.example.com"), None),
    )
    .await;
    let app = test_router(storage);

    let response = get(&app, &format!("/track/click?banner_id={}", id)).await;
    assert!(response.headers().contains_key("x-beacon-timing-ms"));
}
