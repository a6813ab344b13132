use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::analytics::{
    BrowserCount, CountryCount, DeviceCount, NewVsReturning, PageViews, SessionMetrics,
    SourceCount,
};

/// Everything the dashboard shows for one site.
///
/// Each section is fetched independently; a section whose request failed is
/// `None` and the rest of the dashboard is still usable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub site_id: String,
    pub page_views: Option<PageViews>,
    pub sessions: Option<SessionMetrics>,
    pub new_vs_returning: Option<NewVsReturning>,
    pub sources: Option<Vec<SourceCount>>,
    pub devices: Option<Vec<DeviceCount>>,
    pub browsers: Option<Vec<BrowserCount>>,
    pub geography: Option<Vec<CountryCount>>,
}

/// Headline numbers shown above the charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_page_views: Option<u64>,
    pub session_count: Option<u64>,
    pub avg_session_seconds: Option<f64>,
    pub new_users: Option<u64>,
    pub returning_users: Option<u64>,
    pub top_country: Option<CountryCount>,
}

/// One day of the views-vs-sessions comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: String,
    pub views: Option<u64>,
    pub sessions: Option<u64>,
}

impl Dashboard {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            ..Self::default()
        }
    }

    /// Number of sections that loaded
    pub fn loaded_sections(&self) -> usize {
        [
            self.page_views.is_some(),
            self.sessions.is_some(),
            self.new_vs_returning.is_some(),
            self.sources.is_some(),
            self.devices.is_some(),
            self.browsers.is_some(),
            self.geography.is_some(),
        ]
        .into_iter()
        .filter(|loaded| *loaded)
        .count()
    }

    pub fn summary(&self) -> DashboardSummary {
        DashboardSummary {
            total_page_views: self.page_views.as_ref().map(PageViews::total),
            session_count: self.sessions.as_ref().map(|s| s.session_count),
            avg_session_seconds: self.sessions.as_ref().map(|s| s.avg_duration_seconds),
            new_users: self.new_vs_returning.as_ref().map(|n| n.new),
            returning_users: self.new_vs_returning.as_ref().map(|n| n.returning),
            top_country: self.geography.as_deref().and_then(top_country),
        }
    }

    /// Page-view and session trends joined by date, oldest first.
    pub fn merged_trend(&self) -> Vec<TrendPoint> {
        let mut by_date: BTreeMap<&str, TrendPoint> = BTreeMap::new();

        let point = |date: &str| TrendPoint {
            date: date.to_string(),
            views: None,
            sessions: None,
        };

        for day in self.page_views.iter().flat_map(|p| &p.trend) {
            by_date
                .entry(day.date.as_str())
                .or_insert_with(|| point(&day.date))
                .views = Some(day.views);
        }
        for day in self.sessions.iter().flat_map(|s| &s.trend) {
            by_date
                .entry(day.date.as_str())
                .or_insert_with(|| point(&day.date))
                .sessions = Some(day.sessions);
        }

        by_date.into_values().collect()
    }
}

/// Country with the most visitors; the first listed wins a tie.
fn top_country(countries: &[CountryCount]) -> Option<CountryCount> {
    countries
        .iter()
        .fold(None::<&CountryCount>, |best, c| match best {
            Some(b) if b.count >= c.count => Some(b),
            _ => Some(c),
        })
        .cloned()
}
