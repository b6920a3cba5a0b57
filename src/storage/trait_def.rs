use anyhow::Result;
use async_trait::async_trait;

use crate::analytics::models::{AnalyticsEvent, EventType, NewEvent};
use crate::models::{Banner, Campaign, NewBanner};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes).
    async fn init(&self) -> Result<()>;

    /// Create a new banner (admin surfaces only).
    async fn create_banner(&self, banner: &NewBanner) -> Result<Banner>;

    /// Point lookup of a banner by id.
    async fn get_banner(&self, id: i64) -> Result<Option<Banner>>;

    /// List all banners, newest first.
    async fn list_banners(&self) -> Result<Vec<Banner>>;

    /// Flip a banner's active flag. Returns false when the id is unknown.
    async fn set_banner_active(&self, id: i64, active: bool) -> Result<bool>;

    /// Atomically increment a banner's click counter by one, but only while it
    /// is below `max_clicks` (unconditionally when uncapped). The guard lives
    /// in the store so concurrent clicks can neither lose updates nor push the
    /// counter past the cap. Returns whether the click was counted.
    async fn increment_clicks(&self, id: i64) -> Result<bool>;

    /// Banners ranked by lifetime clicks descending, zero-click banners
    /// excluded.
    async fn top_banners(&self, limit: i64) -> Result<Vec<Banner>>;

    /// Append one analytics event. Events are immutable once written.
    async fn insert_event(&self, event: &NewEvent) -> Result<i64>;

    /// Count events of one type with `since <= timestamp <= until`.
    async fn count_events(&self, event_type: EventType, since: i64, until: i64) -> Result<i64>;

    /// Most recent events by timestamp descending.
    async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>>;

    /// Create a campaign (admin surfaces only).
    async fn create_campaign(
        &self,
        name: &str,
        start_date: Option<i64>,
        end_date: Option<i64>,
    ) -> Result<Campaign>;

    /// Point lookup of a campaign by id.
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>>;

    /// List all campaigns, newest first.
    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;
}
