use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::extractor::{Extractor, PageView};
use crate::models::{RenderingMode, Target, TargetStatus};
use crate::notifier::{NotificationEvent, Notifier};
use crate::scraper::WebScraper;
use crate::tracker::{AvailabilityState, AvailabilityTracker};
use crate::utils::error::FetchError;

/// Result of one check cycle for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub target_id: String,
    pub status: TargetStatus,
    /// `None` when the page could not be fetched.
    pub available: Option<bool>,
    pub image_url: Option<String>,
    pub notified: bool,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub total_time_ms: u64,
}

impl CheckOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Write the observed status back onto the stored record. The image is
    /// only replaced when a new one was found.
    pub fn apply_to(&self, target: &mut Target) {
        target.status = self.status;
        target.last_checked = Some(self.checked_at);
        if let Some(image_url) = &self.image_url {
            target.image_url = Some(image_url.clone());
        }
    }
}

struct PageSignals {
    available: bool,
    image_url: Option<String>,
}

/// Runs one check: fetch, extract, update the tracker, alert on restock.
pub struct TargetMonitor {
    scraper: Arc<WebScraper>,
    extractor: Extractor,
    tracker: Mutex<AvailabilityTracker>,
    notifier: Arc<dyn Notifier>,
}

impl TargetMonitor {
    pub fn new(scraper: Arc<WebScraper>, extractor: Extractor, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            scraper,
            extractor,
            tracker: Mutex::new(AvailabilityTracker::new()),
            notifier,
        }
    }

    pub async fn check_target(&self, target: &Target) -> CheckOutcome {
        let start_time = Instant::now();
        debug!(target_id = %target.id, url = %target.url, "Checking target");

        let signals = match self.inspect(target).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(target_id = %target.id, name = %target.name, "Check failed: {}", e);
                return CheckOutcome {
                    target_id: target.id.clone(),
                    status: TargetStatus::Error,
                    available: None,
                    image_url: None,
                    notified: false,
                    error: Some(e.to_string()),
                    checked_at: Utc::now(),
                    total_time_ms: start_time.elapsed().as_millis() as u64,
                };
            }
        };

        let transition = self.tracker.lock().await.observe(&target.id, signals.available);
        if transition.changed() {
            info!(
                target_id = %target.id,
                name = %target.name,
                "Availability {:?} -> {:?}",
                transition.previous,
                transition.current
            );
        }

        let mut notified = false;
        if transition.should_notify() {
            let event = NotificationEvent::restocked(target, signals.image_url.clone());
            match self.notifier.notify(&event).await {
                Ok(()) => notified = true,
                // Not retried; the tracker keeps the new state either way
                Err(e) => error!(target_id = %target.id, "Failed to send restock alert: {}", e),
            }
        }

        CheckOutcome {
            target_id: target.id.clone(),
            status: TargetStatus::from_availability(signals.available),
            available: Some(signals.available),
            image_url: signals.image_url,
            notified,
            error: None,
            checked_at: Utc::now(),
            total_time_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    async fn inspect(&self, target: &Target) -> Result<PageSignals, FetchError> {
        match target.rendering_mode {
            RenderingMode::Static => {
                let page = self.scraper.fetch_static(&target.url).await?;
                let view = PageView::Static(&page);
                Ok(PageSignals {
                    available: self.extractor.matches_stock_indicator(
                        view,
                        &target.stock_indicator,
                        target.element_selector.as_deref(),
                    ),
                    image_url: self.extractor.find_representative_image(view),
                })
            }
            RenderingMode::Rendered => {
                let extractor = self.extractor.clone();
                let indicator = target.stock_indicator.clone();
                let selector = target.element_selector.clone();

                self.scraper
                    .with_rendered(&target.url, move |page| {
                        let view = PageView::Rendered(page);
                        PageSignals {
                            available: extractor.matches_stock_indicator(view, &indicator, selector.as_deref()),
                            image_url: extractor.find_representative_image(view),
                        }
                    })
                    .await
            }
        }
    }

    pub async fn availability(&self, target_id: &str) -> AvailabilityState {
        self.tracker.lock().await.state(target_id)
    }

    pub async fn forget(&self, target_id: &str) {
        self.tracker.lock().await.forget(target_id);
    }
}
