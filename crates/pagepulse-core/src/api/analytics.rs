//! Per-site analytics endpoints and the dashboard loader.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{
    validate_site_id, AnalyticsKind, AnalyticsQuery, BrowserCount, CountryCount, Dashboard,
    DeviceCount, NewVsReturning, PageViews, SessionMetrics, SourceCount,
};

use super::{ApiClient, ApiError};

fn validate_query(query: &AnalyticsQuery) -> Result<(), ApiError> {
    if query.is_inverted() {
        return Err(ApiError::InvalidInput(
            "Start date is after end date".to_string(),
        ));
    }
    Ok(())
}

/// Keep a section that loaded; log and remember the first error otherwise.
fn section<T>(
    kind: AnalyticsKind,
    result: Result<T, ApiError>,
    first_error: &mut Option<ApiError>,
) -> Option<T> {
    match result {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(section = kind.label(), error = %e, "Failed to load dashboard section");
            first_error.get_or_insert(e);
            None
        }
    }
}

impl ApiClient {
    async fn fetch_analytics<T: DeserializeOwned>(
        &self,
        kind: AnalyticsKind,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<T, ApiError> {
        validate_site_id(site_id)?;
        validate_query(query)?;

        let path = kind.path(site_id);
        if query.is_empty() {
            self.get(&path).await
        } else {
            self.get_with_params(&path, query).await
        }
    }

    pub async fn fetch_page_views(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<PageViews, ApiError> {
        self.fetch_analytics(AnalyticsKind::Pages, site_id, query).await
    }

    pub async fn fetch_sessions(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<SessionMetrics, ApiError> {
        self.fetch_analytics(AnalyticsKind::Sessions, site_id, query).await
    }

    pub async fn fetch_new_vs_returning(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<NewVsReturning, ApiError> {
        self.fetch_analytics(AnalyticsKind::NewVsReturning, site_id, query)
            .await
    }

    pub async fn fetch_sources(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<Vec<SourceCount>, ApiError> {
        self.fetch_analytics(AnalyticsKind::Sources, site_id, query).await
    }

    pub async fn fetch_devices(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<Vec<DeviceCount>, ApiError> {
        self.fetch_analytics(AnalyticsKind::Devices, site_id, query).await
    }

    pub async fn fetch_browsers(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<Vec<BrowserCount>, ApiError> {
        self.fetch_analytics(AnalyticsKind::Browsers, site_id, query).await
    }

    pub async fn fetch_geography(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<Vec<CountryCount>, ApiError> {
        self.fetch_analytics(AnalyticsKind::Geography, site_id, query).await
    }

    /// Fetch every dashboard section concurrently.
    ///
    /// Sections that fail are left empty. The call only fails if the input is
    /// invalid or no section could be loaded at all, in which case the first
    /// error is returned (typically `Unauthorized` once the session is gone).
    pub async fn load_dashboard(
        &self,
        site_id: &str,
        query: &AnalyticsQuery,
    ) -> Result<Dashboard, ApiError> {
        validate_site_id(site_id)?;
        validate_query(query)?;

        let (page_views, sessions, new_vs_returning, sources, devices, browsers, geography) = futures::join!(
            self.fetch_page_views(site_id, query),
            self.fetch_sessions(site_id, query),
            self.fetch_new_vs_returning(site_id, query),
            self.fetch_sources(site_id, query),
            self.fetch_devices(site_id, query),
            self.fetch_browsers(site_id, query),
            self.fetch_geography(site_id, query),
        );

        let mut first_error = None;
        let dashboard = Dashboard {
            site_id: site_id.to_string(),
            page_views: section(AnalyticsKind::Pages, page_views, &mut first_error),
            sessions: section(AnalyticsKind::Sessions, sessions, &mut first_error),
            new_vs_returning: section(
                AnalyticsKind::NewVsReturning,
                new_vs_returning,
                &mut first_error,
            ),
            sources: section(AnalyticsKind::Sources, sources, &mut first_error),
            devices: section(AnalyticsKind::Devices, devices, &mut first_error),
            browsers: section(AnalyticsKind::Browsers, browsers, &mut first_error),
            geography: section(AnalyticsKind::Geography, geography, &mut first_error),
        };

        match (dashboard.loaded_sections(), first_error) {
            (0, Some(e)) => Err(e),
            (loaded, _) => {
                debug!(site_id, loaded, "Dashboard loaded");
                Ok(dashboard)
            }
        }
    }
}
