use crate::analytics::models::{AnalyticsEvent, EventType, NewEvent};
use crate::models::{Banner, Campaign, NewBanner};
use crate::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
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
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS banners (
                id BIGSERIAL PRIMARY KEY,
                campaign_id BIGINT,
                name TEXT NOT NULL,
                html TEXT NOT NULL,
                click_url TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                start_date BIGINT,
                end_date BIGINT,
                current_clicks BIGINT NOT NULL DEFAULT 0,
                max_clicks BIGINT,
                priority BIGINT NOT NULL DEFAULT 0,
                target_departments JSONB NOT NULL DEFAULT '[]',
                device_targeting JSONB NOT NULL DEFAULT '[]',
                geo_targeting JSONB NOT NULL DEFAULT '[]',
                target_audience JSONB NOT NULL DEFAULT '[]',
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_banners_campaign ON banners(campaign_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                start_date BIGINT,
                end_date BIGINT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_events (
                id BIGSERIAL PRIMARY KEY,
                event_type TEXT NOT NULL,
                banner_id BIGINT,
                campaign_id BIGINT,
                recipient TEXT,
                timestamp BIGINT NOT NULL,
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

        let created = sqlx::query_as::<_, Banner>(
            r#"
            INSERT INTO banners (
                campaign_id, name, html, click_url, is_active, start_date, end_date,
                current_clicks, max_clicks, priority,
                target_departments, device_targeting, geo_targeting, target_audience,
                created_at
            )
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, 0, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, campaign_id, name, html, click_url, is_active, start_date, end_date,
                      current_clicks, max_clicks, priority,
                      target_departments, device_targeting, geo_targeting, target_audience,
                      created_at
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
        .bind(Json(&banner.target_departments))
        .bind(Json(&banner.device_targeting))
        .bind(Json(&banner.geo_targeting))
        .bind(Json(&banner.target_audience))
        .bind(created_at)
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
            WHERE id = $1
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
            SET is_active = $1
            WHERE id = $2
            "#,
        )
        .bind(active)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_clicks(&self, id: i64) -> Result<bool> {
        // Single guarded statement; see the trait contract.
        let result = sqlx::query(
            r#"
            UPDATE banners
            SET current_clicks = current_clicks + 1
            WHERE id = $1 AND (max_clicks IS NULL OR current_clicks < max_clicks)
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
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(banners)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO analytics_events (
                event_type, banner_id, campaign_id, recipient, timestamp,
                user_agent, referrer, client_ip, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
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
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn count_events(&self, event_type: EventType, since: i64, until: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM analytics_events
            WHERE event_type = $1 AND timestamp >= $2 AND timestamp <= $3
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
            LIMIT $1
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

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (name, is_active, start_date, end_date, created_at)
            VALUES ($1, TRUE, $2, $3, $4)
            RETURNING id, name, is_active, start_date, end_date, created_at
            "#,
        )
        .bind(name)
        .bind(start_date)
        .bind(end_date)
        .bind(created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(campaign)
    }

    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, name, is_active, start_date, end_date, created_at
            FROM campaigns
            WHERE id = $1
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
