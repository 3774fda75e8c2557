use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::models::{generate_id, RenderingMode, TargetStatus};

pub const DEFAULT_STOCK_INDICATOR: &str = "in stock";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// A monitored page plus the configuration used to check it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "StoredTarget")]
pub struct Target {
    pub id: String,
    pub name: String,
    pub url: String,
    pub rendering_mode: RenderingMode,
    pub stock_indicator: String,
    pub element_selector: Option<String>,
    /// Seconds between checks.
    pub check_interval: u64,
    pub last_checked: Option<DateTime<Utc>>,
    pub status: TargetStatus,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTarget {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(url(message = "url must be an absolute URL"))]
    pub url: String,
    pub rendering_mode: RenderingMode,
    #[validate(length(min = 1, message = "stock indicator must not be empty"))]
    pub stock_indicator: Option<String>,
    pub element_selector: Option<String>,
    pub check_interval: Option<u64>,
}

impl Target {
    pub fn new(new_target: NewTarget) -> Self {
        Self {
            id: generate_id(),
            name: new_target.name,
            url: new_target.url,
            rendering_mode: new_target.rendering_mode,
            stock_indicator: new_target
                .stock_indicator
                .unwrap_or_else(|| DEFAULT_STOCK_INDICATOR.to_string()),
            element_selector: new_target.element_selector.filter(|s| !s.trim().is_empty()),
            check_interval: new_target.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            last_checked: None,
            status: TargetStatus::NotChecked,
            image_url: None,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    /// Applies the fields set in `edit`. An empty selector clears it. Run
    /// state (status, last check, image) is kept.
    pub fn apply_edit(&mut self, edit: TargetEdit) {
        if let Some(name) = edit.name {
            self.name = name;
        }
        if let Some(url) = edit.url {
            self.url = url;
        }
        if let Some(mode) = edit.rendering_mode {
            self.rendering_mode = mode;
        }
        if let Some(indicator) = edit.stock_indicator {
            self.stock_indicator = indicator;
        }
        if let Some(selector) = edit.element_selector {
            self.element_selector = Some(selector).filter(|s| !s.trim().is_empty());
        }
        if let Some(interval) = edit.check_interval {
            self.check_interval = interval;
        }
    }
}

/// Partial change to a stored target; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TargetEdit {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(url(message = "url must be an absolute URL"))]
    pub url: Option<String>,
    pub rendering_mode: Option<RenderingMode>,
    #[validate(length(min = 1, message = "stock indicator must not be empty"))]
    pub stock_indicator: Option<String>,
    pub element_selector: Option<String>,
    pub check_interval: Option<u64>,
}

impl TargetEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.rendering_mode.is_none()
            && self.stock_indicator.is_none()
            && self.element_selector.is_none()
            && self.check_interval.is_none()
    }
}

/// On-disk shape. Accepts records written before ids and rendering modes
/// existed (`isDynamic`, local `%Y-%m-%d %H:%M:%S` timestamps).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTarget {
    #[serde(default)]
    id: Option<String>,
    name: String,
    url: String,
    #[serde(default)]
    rendering_mode: Option<RenderingMode>,
    #[serde(default)]
    is_dynamic: Option<bool>,
    #[serde(default)]
    stock_indicator: Option<String>,
    #[serde(default)]
    element_selector: Option<String>,
    #[serde(default)]
    check_interval: Option<u64>,
    #[serde(default)]
    last_checked: Option<String>,
    #[serde(default)]
    status: Option<TargetStatus>,
    #[serde(default)]
    image_url: Option<String>,
}

impl From<StoredTarget> for Target {
    fn from(stored: StoredTarget) -> Self {
        let rendering_mode = match (stored.rendering_mode, stored.is_dynamic) {
            (Some(mode), _) => mode,
            (None, Some(true)) => RenderingMode::Rendered,
            _ => RenderingMode::Static,
        };

        Self {
            id: stored.id.filter(|id| !id.is_empty()).unwrap_or_else(generate_id),
            name: stored.name,
            url: stored.url,
            rendering_mode,
            stock_indicator: stored
                .stock_indicator
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_STOCK_INDICATOR.to_string()),
            element_selector: stored.element_selector.filter(|s| !s.trim().is_empty()),
            check_interval: stored.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            last_checked: stored.last_checked.as_deref().and_then(parse_timestamp),
            status: stored.status.unwrap_or_default(),
            image_url: stored.image_url,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
