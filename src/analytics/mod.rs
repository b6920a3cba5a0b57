//! Banner analytics
//!
//! Event models plus the read-side aggregator that powers the dashboard:
//! windowed click/view totals, click-through rate, top banners, and the raw
//! activity feed. Events are written by the tracking handlers, one row per
//! interaction; everything in here only reads.

pub mod aggregator;
pub mod models;

pub use aggregator::{AnalyticsAggregator, AnalyticsSummary, BannerRanking, ReportWindow};
pub use models::{AnalyticsEvent, ClientMeta, EventType, NewEvent};
