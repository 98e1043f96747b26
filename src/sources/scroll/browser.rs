//! Browser session abstraction for the scroll strategy, backed by Chromium
//! through chromiumoxide.

use crate::config::ScrollConfig;
use crate::error::{CollectError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";
const PAGE_HEIGHT_JS: &str = "document.body.scrollHeight";

/// A single live page the scroll stream drives.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether an element matching `selector` is currently rendered.
    async fn has_element(&mut self, selector: &str) -> Result<bool>;

    /// Serialized HTML of the current DOM.
    async fn content(&mut self) -> Result<String>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    async fn page_height(&mut self) -> Result<u64>;

    /// Tear the session down. Failures are logged, never returned.
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Script answering whether `selector` matches anything. An absent node is
/// `false`; only a broken session surfaces as an error.
fn marker_query_js(selector: &str) -> Result<String> {
    Ok(format!(
        "document.querySelector({}) !== null",
        serde_json::to_string(selector)?
    ))
}

fn browser_error(context: &str, e: impl std::fmt::Display) -> CollectError {
    CollectError::UpstreamUnavailable(format!("browser {}: {}", context, e))
}

/// Find a Chrome/Chromium binary on the PATH.
pub fn find_chrome() -> Option<PathBuf> {
    ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

pub struct ChromiumLauncher {
    config: ScrollConfig,
}

impl ChromiumLauncher {
    pub fn new(config: ScrollConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        for arg in &self.config.extra_args {
            builder = builder.arg(arg.as_str());
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        let chrome = self
            .config
            .chrome_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(find_chrome);
        if let Some(path) = chrome {
            debug!("Using Chrome binary at {}", path.display());
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| CollectError::Config(format!("failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("launch failed", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(browser_error("could not open a page", e));
            }
        };
        info!("Launched headless browser session");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| browser_error("navigation failed", e))?;
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool> {
        self.page
            .evaluate(marker_query_js(selector)?)
            .await
            .map_err(|e| browser_error("marker query failed", e))?
            .into_value::<bool>()
            .map_err(|e| browser_error("marker query returned a non-boolean", e))
    }

    async fn content(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_error("could not read page content", e))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM_JS)
            .await
            .map_err(|e| browser_error("scroll failed", e))?;
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64> {
        self.page
            .evaluate(PAGE_HEIGHT_JS)
            .await
            .map_err(|e| browser_error("height query failed", e))?
            .into_value::<u64>()
            .map_err(|e| browser_error("height query returned a non-number", e))
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;
        if let Err(e) = page.close().await {
            debug!("Closing page failed: {}", e);
        }
        if let Err(e) = browser.close().await {
            warn!("Closing browser failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Waiting for browser exit failed: {}", e);
        }
        handler_task.abort();
        debug!("Browser session closed");
    }
}
