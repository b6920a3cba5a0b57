//! Data models for analytics events

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Kind of interaction being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    View,
    Click,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::View => "view",
            EventType::Click => "click",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded interaction, as stored. Append-only: rows are never updated or
/// deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub event_type: String,
    pub banner_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub recipient: Option<String>,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub client_ip: Option<String>,
    /// Arbitrary key/value metadata, JSON-encoded.
    pub metadata: Option<String>,
}

/// Client request metadata captured alongside an event.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub ip: Option<String>,
}

/// An event about to be inserted.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub banner_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub recipient: Option<String>,
    pub timestamp: i64,
    pub client: ClientMeta,
    pub metadata: Option<serde_json::Value>,
}

impl NewEvent {
    pub fn metadata_json(&self) -> Option<String> {
        self.metadata.as_ref().map(|m| m.to_string())
    }
}
