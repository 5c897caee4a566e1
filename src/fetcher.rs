//! Two-tier content fetching: a cheap HTTP GET fast path with a
//! headless-browser fallback for script-rendered pages.
//!
//! The scheduler sees a single `fetch` operation and never branches on which
//! tier produced the content. Empty content is a soft failure.

use crate::config::Config;
use crate::error::{AppError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{sleep, timeout};

const FAST_PATH_ATTEMPTS: u32 = 3;
const SHORT_BACKOFF: Duration = Duration::from_millis(500);
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);
const RENDER_ATTEMPTS: u32 = 2;
const RENDER_RETRY_SLEEP: Duration = Duration::from_secs(2);

/// Installed before any page script runs so automation markers are hidden
/// from fingerprinting checks.
const STEALTH_INIT_SCRIPT: &str = r#"
    delete navigator.__proto__.webdriver;
    window.chrome = { runtime: {} };
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
"#;

/// Which strategy produced the returned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchTier {
    Static,
    Rendered,
}

/// Shared fetcher holding the HTTP client and the lazily-launched browser.
pub(crate) struct ContentFetcher {
    config: Arc<Config>,
    client: Client,
    browser: OnceCell<Arc<Browser>>,
}

impl ContentFetcher {
    pub(crate) fn new(config: Arc<Config>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.random_user_agent())
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            config,
            client,
            browser: OnceCell::new(),
        })
    }

    /// The shared HTTP client, reused by the document miner and the
    /// subdomain-discovery collaborator.
    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Fetches the final HTML for a URL. Tries the fast path first and
    /// escalates to the rendering engine when the result looks like a
    /// script-only shell. Returns empty content on unrecoverable failure.
    pub(crate) async fn fetch(&self, url: &str) -> (String, FetchTier) {
        let static_html = self.fetch_static(url).await;
        if !looks_like_script_shell(&static_html) {
            return (static_html, FetchTier::Static);
        }

        if !self.config.browser_fallback {
            return (static_html, FetchTier::Static);
        }

        tracing::debug!(target: "fetch", "Escalating to rendered fetch for {}", url);
        match self.fetch_rendered(url).await {
            Ok(html) if !html.trim().is_empty() => (html, FetchTier::Rendered),
            Ok(_) => (static_html, FetchTier::Static),
            Err(e) => {
                tracing::warn!(target: "fetch", "Rendered fetch failed for {}: {}", url, e);
                (static_html, FetchTier::Static)
            }
        }
    }

    /// Plain GET with a small retry budget. 403/429 responses get one longer
    /// backoff; anything else non-200 burns an attempt with a short backoff.
    async fn fetch_static(&self, url: &str) -> String {
        for attempt in 1..=FAST_PATH_ATTEMPTS {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => return body,
                            Err(e) => {
                                tracing::warn!(target: "fetch", "Failed to read body from {}: {}", url, e);
                            }
                        }
                    } else if status == reqwest::StatusCode::FORBIDDEN
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    {
                        tracing::warn!(target: "fetch", "Got {} from {}, backing off", status, url);
                        if attempt < FAST_PATH_ATTEMPTS {
                            sleep(RATE_LIMIT_BACKOFF).await;
                            continue;
                        }
                    } else {
                        tracing::debug!(target: "fetch", "HTTP {} from {}", status, url);
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        tracing::warn!(target: "fetch", "Timeout fetching {}", url);
                    } else {
                        tracing::warn!(target: "fetch", "Request error fetching {}: {}", url, e);
                    }
                }
            }
            if attempt < FAST_PATH_ATTEMPTS {
                sleep(SHORT_BACKOFF * attempt).await;
            }
        }
        String::new()
    }

    /// Lazily launches the shared headless browser on first use.
    async fn browser(&self) -> Result<&Arc<Browser>> {
        self.browser
            .get_or_try_init(|| async {
                tracing::info!(target: "fetch", "Launching headless browser");
                let browser_config = BrowserConfig::builder()
                    .no_sandbox()
                    .args(vec![
                        "--disable-blink-features=AutomationControlled",
                        "--disable-extensions",
                        "--disable-plugins",
                    ])
                    .build()
                    .map_err(|e| AppError::Config(format!("Browser config: {}", e)))?;

                let (browser, mut handler) = Browser::launch(browser_config).await?;
                tokio::spawn(async move { while handler.next().await.is_some() {} });
                Ok(Arc::new(browser))
            })
            .await
    }

    /// Drives the rendering engine for one URL, retrying once on failure.
    async fn fetch_rendered(&self, url: &str) -> Result<String> {
        let browser = self.browser().await?;
        let mut last_error: Option<AppError> = None;

        for attempt in 1..=RENDER_ATTEMPTS {
            match self.render_once(browser, url).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    tracing::warn!(
                        target: "fetch",
                        "Render attempt {}/{} failed for {}: {}",
                        attempt,
                        RENDER_ATTEMPTS,
                        url,
                        e
                    );
                    last_error = Some(e);
                    if attempt < RENDER_ATTEMPTS {
                        sleep(RENDER_RETRY_SLEEP).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Task(format!("Rendering failed for {}", url))))
    }

    /// One isolated page: countermeasures installed before navigation, the
    /// page closed afterwards regardless of outcome.
    async fn render_once(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = browser.new_page("about:blank").await?;
        let result = self.drive_page(&page, url).await;
        if let Err(e) = page.close().await {
            tracing::debug!(target: "fetch", "Failed to close page for {}: {}", url, e);
        }
        result
    }

    async fn drive_page(&self, page: &Page, url: &str) -> Result<String> {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_INIT_SCRIPT,
        ))
        .await?;

        page.set_user_agent(self.config.random_user_agent()).await?;

        let (width, height) = random_viewport();
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(width)
            .height(height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| AppError::Task(format!("Viewport params: {}", e)))?;
        page.execute(metrics).await?;

        timeout(self.config.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| AppError::Task(format!("Navigation timed out for {}", url)))??;

        // Short randomized settle so client-rendered content has a chance
        // to appear before capture.
        sleep(random_settle_delay()).await;

        Ok(page.content().await?)
    }
}

fn random_viewport() -> (i64, i64) {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (rng.gen_range(1024..=1920), rng.gen_range(768..=1080))
}

fn random_settle_delay() -> Duration {
    use rand::Rng;
    Duration::from_millis(rand::thread_rng().gen_range(1000..2500))
}

/// Fast-path content that warrants escalation: nothing at all, or a page
/// that tells the visitor to turn on JavaScript.
pub(crate) fn looks_like_script_shell(html: &str) -> bool {
    if html.trim().is_empty() {
        return true;
    }
    let lowered = html.to_lowercase();
    lowered.contains("<noscript") || lowered.contains("enable javascript")
}
