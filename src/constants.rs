use once_cell::sync::Lazy;
use regex::Regex;

/// Strategy name constants to keep the CLI, config and logs consistent

// User-facing strategy names (used in CLI)
pub const FEED_STRATEGY: &str = "feed";
pub const SEARCH_STRATEGY: &str = "search";
pub const SCROLL_STRATEGY: &str = "scroll";

// Accepted range for the number of posts requested per run
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 1000;
pub const DEFAULT_LIMIT: usize = 20;

// Progress never reports completion before the run concludes
pub const PROGRESS_CEILING: f64 = 0.99;

// Feed defaults
pub const DEFAULT_FEED_PROXY_URL: &str = "https://api.allorigins.win/raw?url=";
pub const DEFAULT_FEED_BASE_URL: &str = "https://nitter.net";

// Search defaults
pub const DEFAULT_SEARCH_BASE_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_SEARCH_PAGE_SIZE: usize = 20;
pub const DEFAULT_SEARCH_ITEM_DELAY_MS: u64 = 100;

// Scroll defaults
pub const DEFAULT_SCROLL_BASE_URL: &str = "https://x.com";
pub const DEFAULT_CONTENT_MARKER: &str = r#"article[data-testid="tweet"]"#;
pub const DEFAULT_MARKER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_SCROLL_CYCLES: u32 = 50;
pub const UNCHANGED_HEIGHT_CYCLES: u32 = 2;

// Shared HTTP defaults
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
pub const USER_AGENT: &str = concat!("tweet_scraper/", env!("CARGO_PKG_VERSION"));

/// Get all supported strategy names
pub fn get_supported_strategies() -> Vec<&'static str> {
    vec![FEED_STRATEGY, SEARCH_STRATEGY, SCROLL_STRATEGY]
}

/// Strip surrounding whitespace and a single leading `@` from a profile name.
pub fn normalize_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).trim().to_string()
}

static PROFILE_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("static regex"));

/// Whether `subject` is a bare profile handle, safe to embed in URLs and file names.
pub fn is_valid_subject(subject: &str) -> bool {
    PROFILE_HANDLE.is_match(subject)
}
