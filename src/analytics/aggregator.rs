//! Read-side analytics aggregation
//!
//! All numbers come straight from the store: event counts are windowed queries
//! over the append-only event log, and the top-banner ranking reads the
//! banners' lifetime click counters. Note the ranking is therefore a lifetime
//! ranking, not scoped to the requested window; the response exposes the raw
//! `current_clicks` value so that stays visible to callers.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::analytics::models::{AnalyticsEvent, EventType};
use crate::models::Banner;
use crate::storage::Storage;

/// Reporting windows offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportWindow {
    Day,
    Week,
    Month,
    Quarter,
}

impl ReportWindow {
    /// Parse the wire form used by the dashboard ("24h", "7d", "30d", "90d").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" | "1d" => Some(ReportWindow::Day),
            "7d" => Some(ReportWindow::Week),
            "30d" => Some(ReportWindow::Month),
            "90d" => Some(ReportWindow::Quarter),
            _ => None,
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            ReportWindow::Day => 86_400,
            ReportWindow::Week => 7 * 86_400,
            ReportWindow::Month => 30 * 86_400,
            ReportWindow::Quarter => 90 * 86_400,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportWindow::Day => "24h",
            ReportWindow::Week => "7d",
            ReportWindow::Month => "30d",
            ReportWindow::Quarter => "90d",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub window: String,
    pub since: i64,
    pub until: i64,
    pub total_clicks: i64,
    pub total_views: i64,
    /// Clicks / views as a percentage; 0 when there are no views.
    pub click_through_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BannerRanking {
    pub banner_id: i64,
    pub name: String,
    pub campaign_id: Option<i64>,
    /// Lifetime counter, not window-scoped.
    pub current_clicks: i64,
}

pub struct AnalyticsAggregator {
    storage: Arc<dyn Storage>,
}

impl AnalyticsAggregator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn summary(&self, window: ReportWindow, now: i64) -> Result<AnalyticsSummary> {
        let since = now - window.seconds();
        let total_clicks = self
            .storage
            .count_events(EventType::Click, since, now)
            .await?;
        let total_views = self
            .storage
            .count_events(EventType::View, since, now)
            .await?;

        Ok(AnalyticsSummary {
            window: window.label().to_string(),
            since,
            until: now,
            total_clicks,
            total_views,
            click_through_rate: click_through_rate(total_clicks, total_views),
        })
    }

    /// Top banners by lifetime clicks, banners with zero clicks excluded.
    pub async fn top_banners(&self, limit: i64) -> Result<Vec<BannerRanking>> {
        let banners = self.storage.top_banners(limit).await?;
        Ok(banners.into_iter().map(ranking_from).collect())
    }

    /// Most recent events, newest first.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>> {
        self.storage.recent_events(limit).await
    }
}

fn ranking_from(banner: Banner) -> BannerRanking {
    BannerRanking {
        banner_id: banner.id,
        name: banner.name,
        campaign_id: banner.campaign_id,
        current_clicks: banner.current_clicks,
    }
}

pub fn click_through_rate(clicks: i64, views: i64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    clicks as f64 / views as f64 * 100.0
}
