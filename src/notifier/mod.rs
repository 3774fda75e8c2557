use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::models::Target;
use crate::utils::error::NotifyError;

pub mod email;

pub use email::EmailNotifier;

/// A target moved from unavailable to available.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub target_id: String,
    pub target_name: String,
    pub url: String,
    pub image_url: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn restocked(target: &Target, image_url: Option<String>) -> Self {
        Self {
            target_id: target.id.clone(),
            target_name: target.name.clone(),
            url: target.url.clone(),
            image_url,
            detected_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> String {
        format!("Product Available: {}", self.target_name)
    }

    pub fn text_body(&self) -> String {
        format!(
            "Great news! The product \"{}\" is now available!\nYou can find it here: {}",
            self.target_name, self.url
        )
    }
}

/// Delivers restock alerts. Delivery is attempted once; callers log failures
/// and carry on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Writes alerts to the log. Used when no mail transport is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!(
            target_id = %event.target_id,
            url = %event.url,
            "{}",
            event.subject()
        );
        Ok(())
    }
}

/// Email when SMTP sender and recipient are configured, the log otherwise.
pub fn from_config(config: &SmtpConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    if config.is_configured() {
        Ok(Arc::new(EmailNotifier::from_config(config)?))
    } else {
        warn!("SMTP sender or recipient not configured; restock alerts will only be logged");
        Ok(Arc::new(LogNotifier))
    }
}
