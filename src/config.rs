use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; RestockWatcher/0.1; +https://github.com/yourusername/restock-watcher)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    /// Static fetch timeout, seconds.
    pub request_timeout: u64,
    /// Rendered navigation timeout, seconds.
    pub navigation_timeout: u64,
    /// Bound on waiting for the stock element in rendered pages, seconds.
    pub element_wait: u64,
    /// Time allowed to launch or connect to the browser, seconds.
    pub launch_timeout: u64,
    pub chrome_path: Option<String>,
    /// DevTools websocket of a remote browser. Takes precedence over launching Chrome.
    pub remote_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub targets_path: PathBuf,
    /// Floor for per-target intervals, seconds.
    pub min_check_interval: u64,
    pub default_check_interval: u64,
    pub shutdown_grace: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
    pub from_name: String,
    pub to_address: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: 30,
            navigation_timeout: 30,
            element_wait: 10,
            launch_timeout: 30,
            chrome_path: None,
            remote_endpoint: None,
        }
    }
}

impl SchedulerConfig {
    pub fn min_check_interval(&self) -> Duration {
        Duration::from_secs(self.min_check_interval)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            targets_path: PathBuf::from("products.json"),
            min_check_interval: 60,
            default_check_interval: 300,
            shutdown_grace: 15,
        }
    }
}

impl SmtpConfig {
    /// Sender and recipient are both required before mail can go out.
    pub fn is_configured(&self) -> bool {
        self.from_address.is_some() && self.to_address.is_some()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: None,
            from_name: "Restock Watcher".to_string(),
            to_address: None,
            use_tls: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "restock-watcher.log".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            scheduler: SchedulerConfig::default(),
            notifications: NotificationsConfig {
                smtp: SmtpConfig::default(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let defaults = Config::try_from(&AppConfig::default())?;

        let s = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, ignored by git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        // Variable names used by earlier deployments of the mailer
        let smtp = &mut config.notifications.smtp;
        if smtp.from_address.is_none() {
            smtp.from_address = env::var("SENDER_EMAIL").ok();
        }
        if smtp.username.is_none() {
            smtp.username = env::var("SENDER_EMAIL").ok();
        }
        if smtp.password.is_none() {
            smtp.password = env::var("SENDER_PASSWORD").ok();
        }
        if smtp.to_address.is_none() {
            smtp.to_address = env::var("RECEIVER_EMAIL").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(ConfigError::Message("Scraper user_agent must not be empty".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.navigation_timeout == 0 {
            return Err(ConfigError::Message("Scraper navigation_timeout must be greater than 0".into()));
        }

        if self.scraper.element_wait == 0 {
            return Err(ConfigError::Message("Scraper element_wait must be greater than 0".into()));
        }

        if self.scraper.launch_timeout == 0 {
            return Err(ConfigError::Message("Scraper launch_timeout must be greater than 0".into()));
        }

        if let Some(endpoint) = &self.scraper.remote_endpoint {
            if Url::parse(endpoint).is_err() {
                return Err(ConfigError::Message("Invalid remote_endpoint URL format".into()));
            }
        }

        if self.scheduler.min_check_interval == 0 {
            return Err(ConfigError::Message("Scheduler min_check_interval must be greater than 0".into()));
        }

        if self.scheduler.default_check_interval < self.scheduler.min_check_interval {
            return Err(ConfigError::Message(
                "Scheduler default_check_interval cannot be below min_check_interval".into(),
            ));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        Ok(())
    }
}
