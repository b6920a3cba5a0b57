use crate::analytics::models::{AnalyticsEvent, EventType, NewEvent};
use crate::models::{Banner, Campaign, NewBanner};
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn unix_now() -> Result<i64> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64;
    Ok(now)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // Create banners table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS banners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER,
                name TEXT NOT NULL,
                html TEXT NOT NULL,
                click_url TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                start_date INTEGER,
                end_date INTEGER,
                current_clicks INTEGER NOT NULL DEFAULT 0,
                max_clicks INTEGER,
                priority INTEGER NOT NULL DEFAULT 0,
                target_departments TEXT NOT NULL DEFAULT '[]',
                device_targeting TEXT NOT NULL DEFAULT '[]',
                geo_targeting TEXT NOT NULL DEFAULT '[]',
                target_audience TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_banners_campaign ON banners(campaign_id)")
            .execute(self.pool.as_ref())
            .await?;

        // Create campaigns table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                start_date INTEGER,
                end_date INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // Create append-only analytics event log
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                banner_id INTEGER,
                campaign_id INTEGER,
                recipient TEXT,
                timestamp INTEGER NOT NULL,
                user_agent TEXT,
                referrer TEXT,
                client_ip TEXT,
                metadata TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_events_type_time ON analytics_events(event_type, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_banner ON analytics_events(banner_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_banner(&self, banner: &NewBanner) -> Result<Banner> {
        let created_at = unix_now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO banners (
                campaign_id, name, html, click_url, is_active, start_date, end_date,
                current_clicks, max_clicks, priority,
                target_departments, device_targeting, geo_targeting, target_audience,
                created_at
            )
            VALUES (?, ?, ?, ?, 1, ?, ?, 0, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(banner.campaign_id)
        .bind(&banner.name)
        .bind(&banner.html)
        .bind(&banner.click_url)
        .bind(banner.start_date)
        .bind(banner.end_date)
        .bind(banner.max_clicks)
        .bind(banner.priority)
        .bind(serde_json::to_string(&banner.target_departments)?)
        .bind(serde_json::to_string(&banner.device_targeting)?)
        .bind(serde_json::to_string(&banner.geo_targeting)?)
        .bind(serde_json::to_string(&banner.target_audience)?)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        let id = result.last_insert_rowid();

        let created = sqlx::query_as::<_, Banner>(
            r#"
            SELECT id, campaign_id, name, html, click_url, is_active, start_date, end_date,
                   current_clicks, max_clicks, priority,
                   target_departments, device_targeting, geo_targeting, target_audience,
                   created_at
            FROM banners
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn get_banner(&self, id: i64) -> Result<Option<Banner>> {
        let banner = sqlx::query_as::<_, Banner>(
            r#"
            SELECT id, campaign_id, name, html, click_url, is_active, start_date, end_date,
                   current_clicks, max_clicks, priority,
                   target_departments, device_targeting, geo_targeting, target_audience,
                   created_at
            FROM banners
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(banner)
    }

    async fn list_banners(&self) -> Result<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(
            r#"
            SELECT id, campaign_id, name, html, click_url, is_active, start_date, end_date,
                   current_clicks, max_clicks, priority,
                   target_departments, device_targeting, geo_targeting, target_audience,
                   created_at
            FROM banners
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(banners)
    }

    async fn set_banner_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE banners
            SET is_active = ?
            WHERE id = ?
            "#,
        )
        .bind(active)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, id: i64) -> Result<bool> {
        // The cap guard must live in this single statement: a read-then-write
        // from the application would race under concurrent clicks.
        let result = sqlx::query(
            r#"
            UPDATE banners
            SET current_clicks = current_clicks + 1
            WHERE id = ? AND (max_clicks IS NULL OR current_clicks < max_clicks)
            "#,
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn top_banners(&self, limit: i64) -> Result<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>(
            r#"
            SELECT id, campaign_id, name, html, click_url, is_active, start_date, end_date,
                   current_clicks, max_clicks, priority,
                   target_departments, device_targeting, geo_targeting, target_audience,
                   created_at
            FROM banners
            WHERE current_clicks > 0
            ORDER BY current_clicks DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(banners)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO analytics_events (
                event_type, banner_id, campaign_id, recipient, timestamp,
                user_agent, referrer, client_ip, metadata
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.event_type.as_str())
        .bind(event.banner_id)
        .bind(event.campaign_id)
        .bind(&event.recipient)
        .bind(event.timestamp)
        .bind(&event.client.user_agent)
        .bind(&event.client.referrer)
        .bind(&event.client.ip)
        .bind(event.metadata_json())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn count_events(&self, event_type: EventType, since: i64, until: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM analytics_events
            WHERE event_type = ? AND timestamp >= ? AND timestamp <= ?
            "#,
        )
        .bind(event_type.as_str())
        .bind(since)
        .bind(until)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn recent_events(&self, limit: i64) -> Result<Vec<AnalyticsEvent>> {
        let events = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT id, event_type, banner_id, campaign_id, recipient, timestamp,
                   user_agent, referrer, client_ip, metadata
            FROM analytics_events
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }

    async fn create_campaign(
        &self,
        name: &str,
        start_date: Option<i64>,
        end_date: Option<i64>,
    ) -> Result<Campaign> {
        let created_at = unix_now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (name, is_active, start_date, end_date, created_at)
            VALUES (?, 1, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(start_date)
        .bind(end_date)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, name, is_active, start_date, end_date, created_at
            FROM campaigns
            WHERE id = ?
            "#,
        )
        .bind(result.last_insert_rowid())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(campaign)
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, name, is_active, start_date, end_date, created_at
            FROM campaigns
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(campaign)
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, name, is_active, start_date, end_date, created_at
            FROM campaigns
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(campaigns)
    }
}
