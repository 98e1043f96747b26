use crate::config::FeedConfig;
use crate::constants::FEED_STRATEGY;
use crate::error::{CollectError, Result};
use crate::http::{build_client, get_with_retry};
use crate::types::{RawItem, RawItemStream, SourceAdapter};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, instrument};

pub struct FeedAdapter {
    client: Client,
    config: FeedConfig,
}

impl FeedAdapter {
    pub fn new(config: FeedConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    /// Parse an RSS document into raw items, one per `<item>`.
    pub fn parse_feed(subject: &str, body: &[u8]) -> Result<Vec<RawItem>> {
        let channel = rss::Channel::read_from(body)
            .map_err(|e| CollectError::MalformedFeed(format!("RSS parse error: {}", e)))?;

        let items = channel
            .items()
            .iter()
            .map(|item| {
                json!({
                    "subject": subject,
                    "title": item.title(),
                    "pubDate": item.pub_date(),
                    "link": item.link(),
                    "guid": item.guid().map(|g| g.value()),
                    "description": item.description(),
                })
            })
            .collect();
        Ok(items)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn strategy(&self) -> &'static str {
        FEED_STRATEGY
    }

    #[instrument(skip(self))]
    async fn open(&self, subject: &str) -> Result<Box<dyn RawItemStream>> {
        let url = self.config.feed_url(subject);
        debug!("Fetching feed {}", url);

        let response =
            get_with_retry(&self.client, &url, &[], &self.config.retry_policy()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::UpstreamUnavailable(format!(
                "Could not fetch data for @{}: feed returned HTTP {}",
                subject,
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        let items = Self::parse_feed(subject, &body)?;
        info!("Feed for @{} contains {} items", subject, items.len());

        Ok(Box::new(FeedStream {
            items: items.into_iter(),
        }))
    }
}

/// The whole document is parsed up front; the connection is already released.
struct FeedStream {
    items: std::vec::IntoIter<RawItem>,
}

#[async_trait]
impl RawItemStream for FeedStream {
    async fn next_item(&mut self) -> Result<Option<RawItem>> {
        Ok(self.items.next())
    }

    async fn close(self: Box<Self>) {
        debug!("Feed stream closed with {} unread items", self.items.len());
    }
}
