use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::models::RenderingMode;
use crate::utils::error::{AppError, FetchError};

/// Slack for reading the document back once the page has loaded.
const RENDER_GRACE: Duration = Duration::from_secs(5);

/// Markup retrieved for a URL, either from the HTTP response or serialized
/// from a rendered document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPage {
    pub url: String,
    pub final_url: String, // After redirects
    pub html: String,
}

/// A live document held open by a rendering session. Dropping the value
/// releases the session.
pub trait RenderedPage: Send {
    fn url(&self) -> String;

    /// Serialized markup of the document as it currently stands.
    fn content(&self) -> Result<String, FetchError>;

    /// Inner text of the first element matching `selector`, waiting at most
    /// `timeout` for it to appear. `None` when it never shows up.
    fn wait_for_text(&self, selector: &str, timeout: Duration) -> Option<String>;
}

/// Opens rendering sessions. Implementations block, so callers run them on
/// the blocking pool.
pub trait RenderingProvider: Send + Sync {
    /// Acquire a session, navigate to `url` and wait for the page to load.
    fn open(&self, url: &str) -> Result<Box<dyn RenderedPage>, FetchError>;
}

/// Source of static markup for the on-demand and monitoring paths.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, mode: RenderingMode) -> Result<RawPage, FetchError>;
}

/// Launches (or connects to) Chrome for every session.
pub struct ChromeProvider {
    config: ScraperConfig,
}

struct ChromeSession {
    tab: Arc<Tab>,
    // Dropped after the tab is closed; kills a locally launched process.
    _browser: Browser,
}

impl ChromeProvider {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn connect(&self) -> anyhow::Result<Browser> {
        if let Some(endpoint) = &self.config.remote_endpoint {
            return Browser::connect(endpoint.clone());
        }

        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        Browser::new(launch_options)
    }
}

impl RenderingProvider for ChromeProvider {
    fn open(&self, url: &str) -> Result<Box<dyn RenderedPage>, FetchError> {
        let browser = self
            .connect()
            .map_err(|e| FetchError::unreachable(url, format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| FetchError::unreachable(url, format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.config.navigation_timeout());

        // From here on the guard owns the tab, so every early return closes it.
        let session = ChromeSession { tab, _browser: browser };

        session
            .tab
            .set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| FetchError::unreachable(url, format!("Failed to set user agent: {}", e)))?;

        session
            .tab
            .navigate_to(url)
            .map_err(|e| FetchError::unreachable(url, format!("Navigation failed: {}", e)))?;

        session
            .tab
            .wait_until_navigated()
            .map_err(|e| FetchError::unreachable(url, format!("Page load failed: {}", e)))?;

        Ok(Box::new(session))
    }
}

impl RenderedPage for ChromeSession {
    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn content(&self) -> Result<String, FetchError> {
        self.tab
            .get_content()
            .map_err(|e| FetchError::unreachable(self.tab.get_url(), format!("Failed to get page content: {}", e)))
    }

    fn wait_for_text(&self, selector: &str, timeout: Duration) -> Option<String> {
        let element = match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(element) => element,
            Err(e) => {
                debug!("Element '{}' not found within {:?}: {}", selector, timeout, e);
                return None;
            }
        };
        element.get_inner_text().ok()
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!("Failed to close tab cleanly: {}", e);
        }
    }
}

/// Content fetcher: plain HTTP for static pages, one rendering session at a
/// time for rendered pages.
pub struct WebScraper {
    client: reqwest::Client,
    renderer: Arc<dyn RenderingProvider>,
    render_gate: Arc<Mutex<()>>,
    config: ScraperConfig,
}

impl WebScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, AppError> {
        let renderer = Arc::new(ChromeProvider::new(config.clone()));
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(
        config: ScraperConfig,
        renderer: Arc<dyn RenderingProvider>,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            renderer,
            render_gate: Arc::new(Mutex::new(())),
            config,
        })
    }

    /// Upper bound on one rendered session: browser launch or connect,
    /// navigation, the element wait, then reading the document back.
    pub fn rendered_deadline(&self) -> Duration {
        self.config.launch_timeout()
            + self.config.navigation_timeout()
            + self.config.element_wait()
            + RENDER_GRACE
    }

    /// Single GET; any non-2xx status is reported as unreachable.
    pub async fn fetch_static(&self, url: &str) -> Result<RawPage, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::unreachable(url, format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        Ok(RawPage {
            url: url.to_string(),
            final_url,
            html,
        })
    }

    /// Run `inspect` against the live document at `url`. The session is
    /// opened for this call only and is released before this returns or,
    /// if the call timed out, as soon as the blocking work finishes.
    pub async fn with_rendered<T, F>(&self, url: &str, inspect: F) -> Result<T, FetchError>
    where
        F: FnOnce(&dyn RenderedPage) -> T + Send + 'static,
        T: Send + 'static,
    {
        // The guard travels into the blocking task so a timed-out session
        // still blocks the next one until it is really gone.
        let gate = Arc::clone(&self.render_gate).lock_owned().await;
        let renderer = Arc::clone(&self.renderer);
        let owned_url = url.to_string();

        let task = tokio::task::spawn_blocking(move || {
            let _gate = gate;
            let page = renderer.open(&owned_url)?;
            let output = inspect(page.as_ref());
            drop(page);
            Ok::<T, FetchError>(output)
        });

        let bound = self.rendered_deadline();
        match tokio::time::timeout(bound, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(FetchError::unreachable(
                url,
                format!("Rendering task failed: {}", join_error),
            )),
            Err(_) => {
                warn!(url, "Rendered fetch exceeded {:?}", bound);
                Err(FetchError::timeout(url))
            }
        }
    }

    pub async fn fetch_rendered(&self, url: &str) -> Result<RawPage, FetchError> {
        let requested = url.to_string();
        let (final_url, html) = self
            .with_rendered(url, |page| page.content().map(|html| (page.url(), html)))
            .await??;

        Ok(RawPage {
            url: requested,
            final_url: if final_url.is_empty() { url.to_string() } else { final_url },
            html,
        })
    }
}

#[async_trait]
impl PageFetcher for WebScraper {
    async fn fetch(&self, url: &str, mode: RenderingMode) -> Result<RawPage, FetchError> {
        match mode {
            RenderingMode::Static => self.fetch_static(url).await,
            RenderingMode::Rendered => self.fetch_rendered(url).await,
        }
    }
}
