use crate::error::{CollectError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Raw item as produced by a source adapter, before normalization.
pub type RawItem = serde_json::Value;

/// Engagement counts attached to a post. Missing counts stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub replies: u64,
    pub retweets: u64,
    pub likes: u64,
}

/// One collected post in the shape shared by every acquisition strategy.
///
/// Records are built once by a mapper and never mutated afterwards; the
/// `with_*` methods consume the record while it is still being assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    text: String,
    timestamp: DateTime<Utc>,
    source_id: String,
    link: Option<String>,
    metrics: Metrics,
}

impl NormalizedRecord {
    pub fn new(
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
        source_id: impl Into<String>,
    ) -> Result<Self> {
        let text = text.into().trim().to_string();
        let source_id = source_id.into().trim().to_string();
        if text.is_empty() {
            return Err(CollectError::unmappable("text is empty"));
        }
        if source_id.is_empty() {
            return Err(CollectError::unmappable("sourceId is empty"));
        }
        Ok(Self {
            text,
            timestamp,
            source_id,
            link: None,
            metrics: Metrics::default(),
        })
    }

    pub fn with_link(mut self, link: Option<String>) -> Self {
        self.link = link.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }
}

/// A recoverable problem with a single raw item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionWarning {
    pub kind: ErrorKind,
    /// Zero-based position of the raw item in the stream.
    pub position: usize,
    pub message: String,
}

impl fmt::Display for CollectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item {}: {} ({})", self.position, self.message, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    LimitReached,
    Exhausted,
    Cancelled,
}

/// Outcome of a run that did not fail terminally.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    pub subject: String,
    pub strategy: String,
    pub records: Vec<NormalizedRecord>,
    pub warnings: Vec<CollectionWarning>,
    pub stop_reason: StopReason,
    pub items_pulled: usize,
    pub duplicates_skipped: usize,
    pub elapsed: Duration,
}

impl CollectionResult {
    pub fn is_short(&self, limit: usize) -> bool {
        self.records.len() < limit
    }
}

/// Lazy, single-use sequence of raw items opened for one subject.
#[async_trait::async_trait]
pub trait RawItemStream: Send {
    /// Pull the next raw item, or `None` once the upstream is exhausted.
    async fn next_item(&mut self) -> Result<Option<RawItem>>;

    /// Release every resource held by the stream.
    async fn close(self: Box<Self>);
}

/// One acquisition strategy.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn strategy(&self) -> &'static str;

    async fn open(&self, subject: &str) -> Result<Box<dyn RawItemStream>>;
}

/// Strategy-specific translation of a raw item. Must not perform I/O.
pub trait RecordMapper: Send + Sync {
    fn map(&self, raw: &RawItem) -> Result<NormalizedRecord>;
}

/// Receives run progress as a fraction in `[0.0, 1.0]`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, fraction: f64);
}
