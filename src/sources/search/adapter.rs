use crate::config::SearchConfig;
use crate::constants::SEARCH_STRATEGY;
use crate::error::{CollectError, Result};
use crate::http::{build_client, get_with_retry, RetryPolicy};
use crate::types::{RawItem, RawItemStream, SourceAdapter};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// One page of results from the search backend.
#[derive(Debug, Deserialize)]
struct SearchPage {
    items: Vec<RawItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct SearchAdapter {
    client: Client,
    config: SearchConfig,
}

impl SearchAdapter {
    pub fn new(config: SearchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    pub fn query_for(subject: &str) -> String {
        format!("from:{}", subject)
    }
}

#[async_trait]
impl SourceAdapter for SearchAdapter {
    fn strategy(&self) -> &'static str {
        SEARCH_STRATEGY
    }

    #[instrument(skip(self))]
    async fn open(&self, subject: &str) -> Result<Box<dyn RawItemStream>> {
        let mut stream = SearchStream {
            client: self.client.clone(),
            url: self.config.search_url(),
            subject: subject.to_string(),
            query: Self::query_for(subject),
            page_size: self.config.page_size,
            policy: self.config.retry_policy(),
            min_delay: self.config.min_item_delay(),
            cursor: None,
            buffer: VecDeque::new(),
            pages: 0,
            finished: false,
            last_yield: None,
        };
        // The first page decides whether the subject exists at all.
        stream.fetch_page().await?;
        info!(
            "Search for {} opened with {} items on the first page",
            stream.query,
            stream.buffer.len()
        );
        Ok(Box::new(stream))
    }
}

struct SearchStream {
    client: Client,
    url: String,
    subject: String,
    query: String,
    page_size: usize,
    policy: RetryPolicy,
    min_delay: Duration,
    cursor: Option<String>,
    buffer: VecDeque<RawItem>,
    pages: usize,
    finished: bool,
    last_yield: Option<Instant>,
}

impl SearchStream {
    async fn fetch_page(&mut self) -> Result<()> {
        let mut query = vec![("q", self.query.clone()), ("count", self.page_size.to_string())];
        if let Some(cursor) = &self.cursor {
            query.push(("cursor", cursor.clone()));
        }

        let response = get_with_retry(&self.client, &self.url, &query, &self.policy).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CollectError::subject_not_found(
                &self.subject,
                "search backend has no such profile",
            ));
        }
        if !status.is_success() {
            return Err(CollectError::UpstreamUnavailable(format!(
                "search for {} returned HTTP {}",
                self.query,
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        let page: SearchPage = serde_json::from_slice(&body).map_err(|e| {
            CollectError::MalformedFeed(format!("unexpected search page shape: {}", e))
        })?;
        self.pages += 1;
        debug!(
            "Search page {} returned {} items (next cursor: {:?})",
            self.pages,
            page.items.len(),
            page.next_cursor
        );

        let next_cursor = page.next_cursor.filter(|c| !c.is_empty());
        self.finished = page.items.is_empty()
            || next_cursor.is_none()
            || next_cursor == self.cursor;
        self.cursor = next_cursor;
        self.buffer.extend(page.items);
        Ok(())
    }

    /// Hold back the next item until `min_delay` has passed since the last one.
    async fn pace(&mut self) {
        if let Some(last) = self.last_yield {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        self.last_yield = Some(Instant::now());
    }
}

#[async_trait]
impl RawItemStream for SearchStream {
    async fn next_item(&mut self) -> Result<Option<RawItem>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.pace().await;
                return Ok(Some(item));
            }
            if self.finished {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    async fn close(self: Box<Self>) {
        debug!(
            "Search stream for {} closed after {} pages",
            self.query, self.pages
        );
    }
}
