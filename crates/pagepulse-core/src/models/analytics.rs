use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The per-site analytics endpoints exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsKind {
    Pages,
    Sessions,
    NewVsReturning,
    Sources,
    Devices,
    Browsers,
    Geography,
}

impl AnalyticsKind {
    pub const ALL: [AnalyticsKind; 7] = [
        AnalyticsKind::Pages,
        AnalyticsKind::Sessions,
        AnalyticsKind::NewVsReturning,
        AnalyticsKind::Sources,
        AnalyticsKind::Devices,
        AnalyticsKind::Browsers,
        AnalyticsKind::Geography,
    ];

    fn segment(self) -> &'static str {
        match self {
            AnalyticsKind::Pages => "pages",
            AnalyticsKind::Sessions => "sessions",
            AnalyticsKind::NewVsReturning => "new-vs-returning",
            AnalyticsKind::Sources => "sources",
            AnalyticsKind::Devices => "devices",
            AnalyticsKind::Browsers => "browsers",
            AnalyticsKind::Geography => "geography",
        }
    }

    /// Path of this endpoint for one site, relative to the API base
    pub fn path(self, site_id: &str) -> String {
        format!("/analytics/{}/{}/", self.segment(), site_id)
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalyticsKind::Pages => "page views",
            AnalyticsKind::Sessions => "sessions",
            AnalyticsKind::NewVsReturning => "new vs returning",
            AnalyticsKind::Sources => "sources",
            AnalyticsKind::Devices => "devices",
            AnalyticsKind::Browsers => "browsers",
            AnalyticsKind::Geography => "geography",
        }
    }
}

/// Optional date range sent as `start` / `end` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl AnalyticsQuery {
    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// The last `days` days, ending today (UTC). `None` when the range would
    /// start before the earliest representable date.
    pub fn last_days(days: i64) -> Option<Self> {
        let end = Utc::now().date_naive();
        let span = Duration::try_days(days.max(1) - 1)?;
        let start = end.checked_sub_signed(span)?;
        Some(Self {
            start: Some(start),
            end: Some(end),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// True when both bounds are set and `start` is after `end`
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PageViews {
    #[serde(default)]
    pub trend: Vec<DailyViews>,
    #[serde(default)]
    pub top_pages: Vec<PageCount>,
}

impl PageViews {
    pub fn total(&self) -> u64 {
        self.trend
            .iter()
            .map(|d| d.views)
            .fold(0, u64::saturating_add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DailyViews {
    pub date: String,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PageCount {
    pub url: String,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionMetrics {
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub avg_duration_seconds: f64,
    #[serde(default)]
    pub trend: Vec<DailySessions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DailySessions {
    pub date: String,
    #[serde(default)]
    pub sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeviceCount {
    pub device: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BrowserCount {
    pub browser: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CountryCount {
    pub country: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewVsReturning {
    #[serde(default)]
    pub new: u64,
    #[serde(default)]
    pub returning: u64,
    #[serde(default)]
    pub daily: Vec<DailyNewReturning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DailyNewReturning {
    pub date: String,
    #[serde(default)]
    pub new_sessions: u64,
    #[serde(default)]
    pub returning_sessions: u64,
}

/// A labelled count, so sources, devices, browsers and countries can be
/// presented the same way.
pub trait Breakdown {
    fn label(&self) -> &str;
    fn count(&self) -> u64;
}

macro_rules! impl_breakdown {
    ($ty:ty, $field:ident) => {
        impl Breakdown for $ty {
            fn label(&self) -> &str {
                &self.$field
            }

            fn count(&self) -> u64 {
                self.count
            }
        }
    };
}

impl_breakdown!(SourceCount, source);
impl_breakdown!(DeviceCount, device);
impl_breakdown!(BrowserCount, browser);
impl_breakdown!(CountryCount, country);
