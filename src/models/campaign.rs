use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Grouping entity for banners. Read-only from the tracking core's point of
/// view; rows are created by the admin surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub created_at: i64,
}
