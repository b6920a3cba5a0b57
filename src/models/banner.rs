use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A piece of trackable HTML content with a destination URL, shown in email
/// headers. Targeting facets are free-form attribute sets; an empty facet list
/// places no restriction on that dimension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Banner {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub name: String,
    pub html: String,
    pub click_url: Option<String>,
    pub is_active: bool,
    /// Validity window bounds (unix seconds, inclusive). Unset means unbounded.
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    /// Lifetime click counter. Non-decreasing; never exceeds `max_clicks`.
    pub current_clicks: i64,
    pub max_clicks: Option<i64>,
    /// Placement tie-break, ascending (lower wins).
    pub priority: i64,
    #[sqlx(json)]
    pub target_departments: Vec<String>,
    #[sqlx(json)]
    pub device_targeting: Vec<String>,
    #[sqlx(json)]
    pub geo_targeting: Vec<String>,
    #[sqlx(json)]
    pub target_audience: Vec<String>,
    pub created_at: i64,
}

/// Fields supplied when creating a banner (admin CLI / dashboard API side).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBanner {
    pub campaign_id: Option<i64>,
    pub name: String,
    pub html: String,
    pub click_url: Option<String>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub max_clicks: Option<i64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub target_departments: Vec<String>,
    #[serde(default)]
    pub device_targeting: Vec<String>,
    #[serde(default)]
    pub geo_targeting: Vec<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
}
