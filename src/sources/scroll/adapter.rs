use super::browser::{BrowserLauncher, BrowserSession};
use crate::config::ScrollConfig;
use crate::constants::{SCROLL_STRATEGY, UNCHANGED_HEIGHT_CYCLES};
use crate::error::{CollectError, Result};
use crate::types::{RawItem, RawItemStream, SourceAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

static TEXT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid="tweetText"]"#).expect("static selector"));
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("static selector"));
static STATUS_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/status/"]"#).expect("static selector"));
static REPLY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid="reply"]"#).expect("static selector"));
static RETWEET_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid="retweet"]"#).expect("static selector"));
static LIKE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"[data-testid="like"]"#).expect("static selector"));

pub struct ScrollAdapter {
    launcher: Box<dyn BrowserLauncher>,
    config: ScrollConfig,
    marker: Selector,
}

impl ScrollAdapter {
    pub fn new(launcher: Box<dyn BrowserLauncher>, config: ScrollConfig) -> Result<Self> {
        let marker = Selector::parse(&config.content_marker).map_err(|e| {
            CollectError::Config(format!(
                "invalid content marker '{}': {:?}",
                config.content_marker, e
            ))
        })?;
        Ok(Self {
            launcher,
            config,
            marker,
        })
    }

    async fn wait_for_marker(&self, session: &mut dyn BrowserSession, subject: &str) -> Result<()> {
        let timeout = self.config.marker_timeout();
        let deadline = Instant::now() + timeout;
        loop {
            if session.has_element(&self.config.content_marker).await? {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(CollectError::subject_not_found(
                    subject,
                    format!("no posts rendered within {:?}", timeout),
                ));
            }
            tokio::time::sleep(MARKER_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn prepare(&self, session: &mut dyn BrowserSession, subject: &str) -> Result<()> {
        let url = self.config.profile_url(subject);
        debug!("Navigating to {}", url);
        session.navigate(&url).await?;
        self.wait_for_marker(session, subject).await
    }
}

#[async_trait]
impl SourceAdapter for ScrollAdapter {
    fn strategy(&self) -> &'static str {
        SCROLL_STRATEGY
    }

    #[instrument(skip(self))]
    async fn open(&self, subject: &str) -> Result<Box<dyn RawItemStream>> {
        let mut session = self.launcher.launch().await?;
        if let Err(e) = self.prepare(session.as_mut(), subject).await {
            session.close().await;
            return Err(e);
        }
        info!("Profile page for @{} rendered", subject);

        Ok(Box::new(ScrollStream {
            session,
            marker: self.marker.clone(),
            base_url: self.config.base_url.clone(),
            settle_delay: self.config.settle_delay(),
            max_cycles: self.config.max_scroll_cycles,
            buffer: VecDeque::new(),
            emitted: HashSet::new(),
            primed: false,
            cycles: 0,
            unchanged: 0,
            last_height: 0,
            exhausted: false,
        }))
    }
}

struct ScrollStream {
    session: Box<dyn BrowserSession>,
    marker: Selector,
    base_url: String,
    settle_delay: Duration,
    max_cycles: u32,
    buffer: VecDeque<RawItem>,
    /// Identities of posts already handed out in this session.
    emitted: HashSet<String>,
    primed: bool,
    cycles: u32,
    unchanged: u32,
    last_height: u64,
    exhausted: bool,
}

impl ScrollStream {
    /// Extract every rendered post and queue the ones not seen before.
    async fn harvest(&mut self) -> Result<usize> {
        let html = self.session.content().await?;
        let mut fresh = 0;
        for (index, item) in extract_items(&html, &self.marker, &self.base_url)
            .into_iter()
            .enumerate()
        {
            if !self.emitted.insert(item_identity(&item, index)) {
                continue;
            }
            self.buffer.push_back(item);
            fresh += 1;
        }
        Ok(fresh)
    }

    async fn scroll_cycle(&mut self) -> Result<()> {
        self.session.scroll_to_bottom().await?;
        tokio::time::sleep(self.settle_delay).await;
        self.cycles += 1;

        let height = self.session.page_height().await?;
        if height == self.last_height {
            self.unchanged += 1;
        } else {
            self.unchanged = 0;
            self.last_height = height;
        }

        let fresh = self.harvest().await?;
        debug!(
            "Scroll cycle {}: height {}, {} new posts, {} unchanged cycles",
            self.cycles, height, fresh, self.unchanged
        );
        if self.unchanged >= UNCHANGED_HEIGHT_CYCLES {
            info!("Page height stopped changing after {} scroll cycles", self.cycles);
            self.exhausted = true;
        }
        Ok(())
    }
}

#[async_trait]
impl RawItemStream for ScrollStream {
    async fn next_item(&mut self) -> Result<Option<RawItem>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }
            if !self.primed {
                self.primed = true;
                self.last_height = self.session.page_height().await?;
                self.harvest().await?;
                continue;
            }
            if self.cycles >= self.max_cycles {
                warn!("Stopping after the maximum of {} scroll cycles", self.max_cycles);
                self.exhausted = true;
                continue;
            }
            self.scroll_cycle().await?;
        }
    }

    async fn close(self: Box<Self>) {
        debug!(
            "Scroll stream closed after {} cycles, {} posts emitted",
            self.cycles,
            self.emitted.len()
        );
        self.session.close().await;
    }
}

/// Stable key for a rendered post: its permalink, else its text and time,
/// else its position on the page.
fn item_identity(item: &RawItem, index: usize) -> String {
    if let Some(href) = item["href"].as_str() {
        return format!("href:{}", href);
    }
    match (item["text"].as_str(), item["datetime"].as_str()) {
        (None, None) => format!("index:{}", index),
        (text, datetime) => format!(
            "content:{}|{}",
            text.unwrap_or_default(),
            datetime.unwrap_or_default()
        ),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn count_text(article: ElementRef<'_>, selector: &Selector) -> String {
    article
        .select(selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// Pull raw post items out of a rendered profile page, in document order.
pub fn extract_items(html: &str, marker: &Selector, base_url: &str) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    document
        .select(marker)
        .map(|article| {
            let text = article.select(&TEXT_SELECTOR).next().map(element_text);
            let time = article.select(&TIME_SELECTOR).next();
            let datetime = time.and_then(|t| t.value().attr("datetime"));
            // The permalink wraps the timestamp; quoted posts carry their own links.
            let href = time
                .and_then(|t| t.parent())
                .and_then(ElementRef::wrap)
                .filter(|a| a.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
                .or_else(|| {
                    article
                        .select(&STATUS_LINK_SELECTOR)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                });

            json!({
                "text": text,
                "datetime": datetime,
                "href": href,
                "replies": count_text(article, &REPLY_SELECTOR),
                "retweets": count_text(article, &RETWEET_SELECTOR),
                "likes": count_text(article, &LIKE_SELECTOR),
                "base_url": base_url,
            })
        })
        .collect()
}
