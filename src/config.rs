use crate::constants::*;
use crate::error::{CollectError, Result};
use crate::http::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "tweet_scraper.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub search: SearchConfig,
    pub scroll: ScrollConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Prefix prepended to the feed URL; empty fetches the feed directly.
    pub proxy_url: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Minimum delay between two yielded items.
    pub min_item_delay_ms: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub base_url: String,
    pub content_marker: String,
    pub marker_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub max_scroll_cycles: u32,
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_FEED_PROXY_URL.to_string(),
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl FeedConfig {
    /// Full URL of the subject's RSS feed, routed through the proxy when one is set.
    pub fn feed_url(&self, subject: &str) -> String {
        format!(
            "{}{}/{}/rss",
            self.proxy_url,
            self.base_url.trim_end_matches('/'),
            subject
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            page_size: DEFAULT_SEARCH_PAGE_SIZE,
            min_item_delay_ms: DEFAULT_SEARCH_ITEM_DELAY_MS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl SearchConfig {
    pub fn search_url(&self) -> String {
        format!("{}/search", self.base_url.trim_end_matches('/'))
    }

    pub fn min_item_delay(&self) -> Duration {
        Duration::from_millis(self.min_item_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCROLL_BASE_URL.to_string(),
            content_marker: DEFAULT_CONTENT_MARKER.to_string(),
            marker_timeout_ms: DEFAULT_MARKER_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            max_scroll_cycles: DEFAULT_MAX_SCROLL_CYCLES,
            chrome_path: None,
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

impl ScrollConfig {
    pub fn profile_url(&self, subject: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), subject)
    }

    pub fn marker_timeout(&self) -> Duration {
        Duration::from_millis(self.marker_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `tweet_scraper.toml` when it
    /// exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CollectError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TWEET_FEED_PROXY_URL") {
            self.feed.proxy_url = v;
        }
        if let Some(v) = lookup("TWEET_FEED_BASE_URL") {
            self.feed.base_url = v;
        }
        if let Some(v) = lookup("TWEET_SEARCH_BASE_URL") {
            self.search.base_url = v;
        }
        if let Some(v) = lookup("TWEET_SCROLL_BASE_URL") {
            self.scroll.base_url = v;
        }
        if let Some(v) = lookup("TWEET_CHROME_PATH").filter(|v| !v.trim().is_empty()) {
            self.scroll.chrome_path = Some(v);
        }
        if let Some(v) = lookup("TWEET_OUTPUT_DIR") {
            self.output.dir = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            return Err(CollectError::Config("search.page_size must be positive".into()));
        }
        if self.scroll.content_marker.trim().is_empty() {
            return Err(CollectError::Config("scroll.content_marker must not be empty".into()));
        }
        if scraper::Selector::parse(&self.scroll.content_marker).is_err() {
            return Err(CollectError::Config(format!(
                "scroll.content_marker '{}' is not a valid CSS selector",
                self.scroll.content_marker
            )));
        }
        Ok(())
    }
}
