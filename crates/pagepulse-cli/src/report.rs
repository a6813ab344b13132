//! Plain-text rendering of sites and dashboards.

use pagepulse_core::models::{AnalyticsKind, AnalyticsQuery, Breakdown, Dashboard, Site};

use crate::format::{format_count, format_duration, format_share, or_dash, truncate_string};

/// Rows shown per breakdown table
const BREAKDOWN_LIMIT: usize = 10;

/// Column width for page URLs and breakdown labels
const LABEL_WIDTH: usize = 32;

pub fn render_sites(sites: &[Site]) -> String {
    if sites.is_empty() {
        return "No sites yet. Add one with `pagepulse add-site <domain>`.".to_string();
    }

    let mut lines = vec![format!("{:<38}  {}", "SITE ID", "DOMAIN")];
    lines.extend(
        sites
            .iter()
            .map(|site| format!("{:<38}  {}", site.site_id, site.domain)),
    );
    lines.join("\n")
}

pub fn describe_range(query: &AnalyticsQuery) -> String {
    match (query.start, query.end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        (Some(start), None) => format!("since {}", start),
        (None, Some(end)) => format!("until {}", end),
        (None, None) => "all time".to_string(),
    }
}

pub fn render_dashboard(dashboard: &Dashboard, query: &AnalyticsQuery) -> String {
    let mut lines = vec![
        format!("Dashboard for {} ({})", dashboard.site_id, describe_range(query)),
        String::new(),
    ];

    let summary = dashboard.summary();
    let kpis = [
        ("Page views", or_dash(summary.total_page_views, format_count)),
        ("Sessions", or_dash(summary.session_count, format_count)),
        ("Avg. session", or_dash(summary.avg_session_seconds, format_duration)),
        ("New users", or_dash(summary.new_users, format_count)),
        ("Returning users", or_dash(summary.returning_users, format_count)),
        ("Top country", or_dash(summary.top_country, |c| c.country)),
    ];
    lines.extend(
        kpis.iter()
            .map(|(label, value)| format!("  {:<16} {}", label, value)),
    );

    let trend = dashboard.merged_trend();
    if !trend.is_empty() {
        lines.push(String::new());
        lines.push("Daily trend".to_string());
        lines.push(format!("  {:<12} {:>10} {:>10}", "DATE", "VIEWS", "SESSIONS"));
        for point in &trend {
            lines.push(format!(
                "  {:<12} {:>10} {:>10}",
                point.date,
                or_dash(point.views, format_count),
                or_dash(point.sessions, format_count),
            ));
        }
    }

    if let Some(pages) = dashboard.page_views.as_ref().filter(|p| !p.top_pages.is_empty()) {
        lines.push(String::new());
        lines.push("Top pages".to_string());
        for page in pages.top_pages.iter().take(BREAKDOWN_LIMIT) {
            lines.push(format!(
                "  {:<width$} {:>10}",
                truncate_string(&page.url, LABEL_WIDTH),
                format_count(page.views),
                width = LABEL_WIDTH,
            ));
        }
    }

    push_breakdown(&mut lines, "Sources", dashboard.sources.as_deref());
    push_breakdown(&mut lines, "Devices", dashboard.devices.as_deref());
    push_breakdown(&mut lines, "Browsers", dashboard.browsers.as_deref());
    push_breakdown(&mut lines, "Countries", dashboard.geography.as_deref());

    let missing = missing_sections(dashboard);
    if !missing.is_empty() {
        lines.push(String::new());
        lines.push(format!("Unavailable: {}", missing.join(", ")));
    }

    lines.join("\n")
}

fn push_breakdown<T: Breakdown>(lines: &mut Vec<String>, title: &str, items: Option<&[T]>) {
    let Some(items) = items.filter(|items| !items.is_empty()) else {
        return;
    };

    let total = items
        .iter()
        .map(Breakdown::count)
        .fold(0u64, u64::saturating_add);
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| b.count().cmp(&a.count()));

    lines.push(String::new());
    lines.push(title.to_string());
    for item in sorted.into_iter().take(BREAKDOWN_LIMIT) {
        lines.push(format!(
            "  {:<width$} {:>10} {:>7}",
            truncate_string(item.label(), LABEL_WIDTH),
            format_count(item.count()),
            format_share(item.count(), total),
            width = LABEL_WIDTH,
        ));
    }
}

fn missing_sections(dashboard: &Dashboard) -> Vec<&'static str> {
    AnalyticsKind::ALL
        .into_iter()
        .filter(|kind| match kind {
            AnalyticsKind::Pages => dashboard.page_views.is_none(),
            AnalyticsKind::Sessions => dashboard.sessions.is_none(),
            AnalyticsKind::NewVsReturning => dashboard.new_vs_returning.is_none(),
            AnalyticsKind::Sources => dashboard.sources.is_none(),
            AnalyticsKind::Devices => dashboard.devices.is_none(),
            AnalyticsKind::Browsers => dashboard.browsers.is_none(),
            AnalyticsKind::Geography => dashboard.geography.is_none(),
        })
        .map(AnalyticsKind::label)
        .collect()
}
