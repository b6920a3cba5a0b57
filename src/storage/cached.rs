use crate::analytics::models::{AnalyticsEvent, EventType, NewEvent};
use crate::models::{Banner, Campaign, NewBanner};
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper that caches banner lookups.
///
/// Only reads are cached. Click increments always pass straight through to the
/// underlying store, since the cap guard must see the authoritative counter,
/// and invalidate the cached banner so subsequent reads pick up the new count.
/// A cached counter can therefore be at most one TTL stale, which only affects
/// the advisory eligibility verdict, never the enforced cap.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    banner_cache: Cache<i64, Option<Banner>>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_entries: u64, ttl_secs: u64) -> Self {
        let banner_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            inner,
            banner_cache,
        }
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_banner(&self, banner: &NewBanner) -> Result<Banner> {
        let created = self.inner.create_banner(banner).await?;
        self.banner_cache
            .insert(created.id, Some(created.clone()))
            .await;
        Ok(created)
    }

    async fn get_banner(&self, id: i64) -> Result<Option<Banner>> {
        if let Some(cached) = self.banner_cache.get(&id).await {
            return Ok(cached);
        }

        let banner = self.inner.get_banner(id).await?;
        self.banner_cache.insert(id, banner.clone()).await;
        Ok(banner)
    }

    async fn list_banners(&self) -> Result<Vec<Banner>> {
        self.inner.list_banners().await
    }

    async fn set_banner_active(&self, id: i64, active: bool) -> Result<bool> {
        let updated = self.inner.set_banner_active(id, active).await?;
        if updated {
            self.banner_cache.invalidate(&id).await;
        }
        Ok(updated)
    }

    async fn increment_clicks(&self, id: i64) -> Result<bool> {
        let counted = self.inner.increment_clicks(id).await?;
        if counted {
            self.banner_cache.invalidate(&id).await;
        }
        Ok(counted)
    }

    async fn top_banners(&self, limit: i64) -> Result<Vec<Banner>> {
        self.inner.top_banners(limit).await
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        self.inner.insert_event(event).await
    }

    async fn count_events(&self, event_type: EventType, since: i64, until: i64) -> Result<i64> {
        self.inner.count_events(event_type, since, until).await
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>> {
        self.inner.recent_events(limit).await
    }

    async fn create_campaign(
        &self,
        name: &str,
        start_date: Option<i64>,
        end_date: Option<i64>,
    ) -> Result<Campaign> {
        self.inner.create_campaign(name, start_date, end_date).await
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        self.inner.get_campaign(id).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.inner.list_campaigns().await
    }
}
