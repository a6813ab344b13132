//! Data models for pagepulse entities.
//!
//! This module contains the data structures exchanged with the backend:
//!
//! - `Site`, `CreatedSite`: registered analytics targets and the embed snippet
//! - Analytics payloads: `PageViews`, `SessionMetrics`, `NewVsReturning` and the
//!   per-label breakdowns (`SourceCount`, `DeviceCount`, `BrowserCount`, `CountryCount`)
//! - `Dashboard`: all sections for one site plus the derived `DashboardSummary`

pub mod analytics;
pub mod dashboard;
pub mod site;

pub use analytics::{
    AnalyticsKind, AnalyticsQuery, Breakdown, BrowserCount, CountryCount, DailyNewReturning,
    DailySessions, DailyViews, DeviceCount, NewVsReturning, PageCount, PageViews, SessionMetrics,
    SourceCount,
};
pub use dashboard::{Dashboard, DashboardSummary, TrendPoint};
pub use site::{
    embed_snippet, is_valid_site_id, validate_site_id, CreatedSite, Site, DEFAULT_TRACKER_URL,
};
