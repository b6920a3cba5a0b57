//! Analytics aggregator integration tests
//!
//! Seeds the event log at controlled timestamps and checks the windowed
//! totals, the CTR boundary behaviour, the top-banner ranking and the
//! activity feed against real storage.

use beacon::analytics::{AnalyticsAggregator, ClientMeta, EventType, NewEvent, ReportWindow};
use beacon::models::NewBanner;
use beacon::storage::{SqliteStorage, Storage};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn event(event_type: EventType, banner_id: i64, timestamp: i64) -> NewEvent {
    NewEvent {
        event_type,
        banner_id: Some(banner_id),
        campaign_id: None,
        recipient: None,
        timestamp,
        client: ClientMeta::default(),
        metadata: None,
    }
}

#[tokio::test]
async fn test_summary_counts_only_events_in_window() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    // Two clicks and one view within the last day
    storage.insert_event(&event(EventType::Click, 1, NOW - 100)).await.unwrap();
    storage.insert_event(&event(EventType::Click, 1, NOW - 3_600)).await.unwrap();
    storage.insert_event(&event(EventType::View, 1, NOW - 200)).await.unwrap();

    // Older than a day, but inside a week
    storage.insert_event(&event(EventType::View, 1, NOW - 2 * 86_400)).await.unwrap();
    storage.insert_event(&event(EventType::Click, 1, NOW - 3 * 86_400)).await.unwrap();

    let day = aggregator.summary(ReportWindow::Day, NOW).await.unwrap();
    assert_eq!(day.total_clicks, 2);
    assert_eq!(day.total_views, 1);
    assert_eq!(day.window, "24h");

    let week = aggregator.summary(ReportWindow::Week, NOW).await.unwrap();
    assert_eq!(week.total_clicks, 3);
    assert_eq!(week.total_views, 2);
}

#[tokio::test]
async fn test_ctr_is_zero_when_there_are_no_views() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    storage.insert_event(&event(EventType::Click, 1, NOW - 10)).await.unwrap();
    storage.insert_event(&event(EventType::Click, 1, NOW - 20)).await.unwrap();

    let summary = aggregator.summary(ReportWindow::Day, NOW).await.unwrap();
    assert_eq!(summary.total_clicks, 2);
    assert_eq!(summary.total_views, 0);
    assert_eq!(
        summary.click_through_rate, 0.0,
        "CTR must be 0 with no views, regardless of clicks"
    );
}

#[tokio::test]
async fn test_ctr_percentage() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    storage.insert_event(&event(EventType::Click, 1, NOW - 10)).await.unwrap();
    for i in 0..4 {
        storage.insert_event(&event(EventType::View, 1, NOW - 10 - i)).await.unwrap();
    }

    let summary = aggregator.summary(ReportWindow::Day, NOW).await.unwrap();
    assert_eq!(summary.click_through_rate, 25.0);
}

#[tokio::test]
async fn test_top_banners_ranked_by_lifetime_clicks() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    let mut ids = vec![];
    for name in ["quiet", "popular", "middling"] {
        let banner = storage
            .create_banner(&NewBanner {
                name: name.to_string(),
                html: "<p>x</p>".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        ids.push(banner.id);
    }

    // "popular" gets 5 clicks, "middling" 2, "quiet" none
    for _ in 0..5 {
        storage.increment_clicks(ids[1]).await.unwrap();
    }
    for _ in 0..2 {
        storage.increment_clicks(ids[2]).await.unwrap();
    }

    let top = aggregator.top_banners(10).await.unwrap();
    assert_eq!(top.len(), 2, "zero-click banners are excluded");
    assert_eq!(top[0].name, "popular");
    assert_eq!(top[0].current_clicks, 5);
    assert_eq!(top[1].name, "middling");
    assert_eq!(top[1].current_clicks, 2);

    let top_one = aggregator.top_banners(1).await.unwrap();
    assert_eq!(top_one.len(), 1);
    assert_eq!(top_one[0].name, "popular");
}

#[tokio::test]
async fn test_recent_events_newest_first() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    for (i, ts) in [NOW - 50, NOW - 10, NOW - 30].iter().enumerate() {
        storage
            .insert_event(&event(EventType::View, i as i64 + 1, *ts))
            .await
            .unwrap();
    }

    let events = aggregator.recent_events(10).await.unwrap();
    let timestamps: Vec<i64> = events.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![NOW - 10, NOW - 30, NOW - 50]);

    let limited = aggregator.recent_events(2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].timestamp, NOW - 10);
}

#[tokio::test]
async fn test_summary_window_bounds_are_inclusive() {
    let storage = create_test_storage().await;
    let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));

    let since = NOW - ReportWindow::Day.seconds();
    // Exactly on both edges of the window
    storage.insert_event(&event(EventType::Click, 1, since)).await.unwrap();
    storage.insert_event(&event(EventType::Click, 1, NOW)).await.unwrap();
    // Just outside
    storage.insert_event(&event(EventType::Click, 1, since - 1)).await.unwrap();

    let summary = aggregator.summary(ReportWindow::Day, NOW).await.unwrap();
    assert_eq!(summary.total_clicks, 2);
}
