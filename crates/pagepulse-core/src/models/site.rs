use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Where the hosted tracker script is served from by default.
pub const DEFAULT_TRACKER_URL: &str = "http://localhost:3000/tracker.js";

/// A registered analytics target (one customer website).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Site {
    pub id: i64,
    pub site_id: String,
    pub domain: String,
}

impl Site {
    /// HTML to paste into the tracked site's pages.
    pub fn embed_snippet(&self, tracker_url: &str) -> Result<String, ApiError> {
        embed_snippet(&self.site_id, tracker_url)
    }
}

/// Response to site registration; the backend only echoes the new ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CreatedSite {
    pub site_id: String,
}

/// Site IDs are backend-issued UUIDs (plus `_` for hand-made IDs). They end
/// up in URL paths and inside a JS string literal, so nothing else is allowed.
pub fn is_valid_site_id(site_id: &str) -> bool {
    !site_id.is_empty()
        && site_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_site_id(site_id: &str) -> Result<(), ApiError> {
    if is_valid_site_id(site_id) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("Invalid site id: {site_id:?}")))
    }
}

/// HTML snippet that tags pages with `site_id` and loads the tracker.
///
/// Rejects IDs that are not plain identifiers and tracker URLs that would
/// break out of the `src` attribute.
pub fn embed_snippet(site_id: &str, tracker_url: &str) -> Result<String, ApiError> {
    validate_site_id(site_id)?;
    if tracker_url.is_empty() || tracker_url.contains(['"', '<', '>', '\n']) {
        return Err(ApiError::InvalidInput(format!(
            "Invalid tracker URL: {tracker_url:?}"
        )));
    }
    Ok(format!(
        "<script>\n  window.__SITE_ID__ = \"{}\";\n</script>\n<script src=\"{}\"></script>",
        site_id, tracker_url
    ))
}
