#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tweet_scraper::types::{ProgressSink, RawItem, RawItemStream, SourceAdapter};
use tweet_scraper::{CollectError, Result};

/// What the fake stream hands out on each pull.
#[derive(Clone)]
pub enum Step {
    Item(Value),
    Fail,
}

/// Shared view of what happened to a fake adapter during a run.
#[derive(Clone, Default)]
pub struct Probe {
    pub opened: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
    pub pulls: Arc<AtomicUsize>,
}

impl Probe {
    pub fn opened(&self) -> bool {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

pub struct FakeAdapter {
    steps: Vec<Step>,
    open_error: Option<fn(&str) -> CollectError>,
    probe: Probe,
}

impl FakeAdapter {
    pub fn new(steps: Vec<Step>) -> (Box<Self>, Probe) {
        let probe = Probe::default();
        let adapter = Box::new(Self {
            steps,
            open_error: None,
            probe: probe.clone(),
        });
        (adapter, probe)
    }

    pub fn with_items(items: Vec<Value>) -> (Box<Self>, Probe) {
        Self::new(items.into_iter().map(Step::Item).collect())
    }

    pub fn failing_open(error: fn(&str) -> CollectError) -> (Box<Self>, Probe) {
        let (mut adapter, probe) = Self::new(Vec::new());
        adapter.open_error = Some(error);
        (adapter, probe)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for FakeAdapter {
    fn strategy(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, subject: &str) -> Result<Box<dyn RawItemStream>> {
        if let Some(error) = self.open_error {
            return Err(error(subject));
        }
        self.probe.opened.store(true, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            steps: self.steps.clone().into(),
            probe: self.probe.clone(),
        }))
    }
}

struct FakeStream {
    steps: VecDeque<Step>,
    probe: Probe,
}

#[async_trait::async_trait]
impl RawItemStream for FakeStream {
    async fn next_item(&mut self) -> Result<Option<RawItem>> {
        self.probe.pulls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Item(item)) => Ok(Some(item)),
            Some(Step::Fail) => Err(CollectError::UpstreamUnavailable(
                "connection reset".into(),
            )),
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Collects every progress report.
#[derive(Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<f64>>,
}

impl RecordingProgress {
    pub fn reports(&self) -> Vec<f64> {
        self.reports.lock().unwrap().clone()
    }

    pub fn assert_monotonic_and_complete(&self) {
        let reports = self.reports();
        assert!(!reports.is_empty(), "no progress reported");
        for pair in reports.windows(2) {
            assert!(pair[0] <= pair[1], "progress went backwards: {:?}", reports);
        }
        assert_eq!(*reports.last().unwrap(), 1.0);
        assert_eq!(reports.iter().filter(|f| **f == 1.0).count(), 1);
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, fraction: f64) {
        self.reports.lock().unwrap().push(fraction);
    }
}

/// A well-formed item in the search backend's shape.
pub fn post(id: u64, text: &str) -> Value {
    json!({
        "id": id.to_string(),
        "rawContent": text,
        "date": format!("2024-09-01T12:{:02}:00+00:00", id % 60),
        "url": format!("https://x.com/jack/status/{}", id),
        "replyCount": 1,
        "retweetCount": 2,
        "likeCount": 3
    })
}

pub fn posts(count: u64) -> Vec<Value> {
    (1..=count).map(|id| post(id, &format!("post number {}", id))).collect()
}
