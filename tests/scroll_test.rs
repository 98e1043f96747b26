mod common;

use common::RecordingProgress;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tweet_scraper::config::ScrollConfig;
use tweet_scraper::progress::NoopProgress;
use tweet_scraper::sources::scroll::{BrowserLauncher, BrowserSession};
use tweet_scraper::sources::{ScrollAdapter, ScrollMapper};
use tweet_scraper::{CollectError, CollectionEngine, ErrorKind, Result, StopReason};

fn article(id: u32) -> String {
    format!(
        r#"<article data-testid="tweet">
             <a href="/jack/status/{id}"><time datetime="2024-09-01T12:00:{id:02}.000Z">Sep 1</time></a>
             <div data-testid="tweetText">post {id}</div>
             <div data-testid="like"><span>1.5K</span></div>
           </article>"#
    )
}

/// A rendered page showing posts `1..=count`.
fn page(count: u32) -> String {
    let articles: String = (1..=count).map(article).collect();
    format!("<html><body>{}</body></html>", articles)
}

#[derive(Clone, Default)]
struct SessionProbe {
    scrolls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

/// Replays scripted `(html, height)` frames; each scroll advances one frame.
struct FakeSession {
    frames: Vec<(String, u64)>,
    current: usize,
    crashed: bool,
    probe: SessionProbe,
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn has_element(&mut self, _selector: &str) -> Result<bool> {
        if self.crashed {
            return Err(CollectError::UpstreamUnavailable(
                "browser marker query failed: websocket closed".into(),
            ));
        }
        Ok(self.frames[self.current].0.contains("<article"))
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.frames[self.current].0.clone())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.probe.scrolls.fetch_add(1, Ordering::SeqCst);
        self.current = (self.current + 1).min(self.frames.len() - 1);
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64> {
        Ok(self.frames[self.current].1)
    }

    async fn close(self: Box<Self>) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeLauncher {
    frames: Vec<(String, u64)>,
    fail: bool,
    crashed: bool,
    probe: SessionProbe,
}

#[async_trait::async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if self.fail {
            return Err(CollectError::UpstreamUnavailable(
                "browser launch failed: no chrome binary".into(),
            ));
        }
        Ok(Box::new(FakeSession {
            frames: self.frames.clone(),
            current: 0,
            crashed: self.crashed,
            probe: self.probe.clone(),
        }))
    }
}

fn config(max_scroll_cycles: u32) -> ScrollConfig {
    ScrollConfig {
        marker_timeout_ms: 50,
        settle_delay_ms: 0,
        max_scroll_cycles,
        ..ScrollConfig::default()
    }
}

fn adapter(
    frames: Vec<(String, u64)>,
    max_scroll_cycles: u32,
) -> (Box<ScrollAdapter>, SessionProbe) {
    let probe = SessionProbe::default();
    let launcher = FakeLauncher {
        frames,
        probe: probe.clone(),
        ..FakeLauncher::default()
    };
    let adapter = ScrollAdapter::new(Box::new(launcher), config(max_scroll_cycles)).unwrap();
    (Box::new(adapter), probe)
}

#[tokio::test]
async fn test_scroll_stops_when_height_settles() {
    let (adapter, probe) = adapter(
        vec![
            (page(2), 1000),
            (page(4), 2000),
            (page(4), 2000),
            (page(4), 2000),
        ],
        50,
    );
    let progress = RecordingProgress::default();

    let result = CollectionEngine::new()
        .collect("jack", 10, adapter, &ScrollMapper, &progress)
        .await
        .unwrap();

    let ids: Vec<&str> = result.records.iter().map(|r| r.source_id()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(result.records[0].link(), Some("https://x.com/jack/status/1"));
    assert_eq!(result.records[0].metrics().likes, 1500);
    assert_eq!(result.duplicates_skipped, 0);
    assert_eq!(result.stop_reason, StopReason::Exhausted);
    assert_eq!(probe.scrolls.load(Ordering::SeqCst), 3);
    assert!(probe.closed.load(Ordering::SeqCst));
    progress.assert_monotonic_and_complete();
}

#[tokio::test]
async fn test_scroll_limit_met_without_scrolling() {
    let (adapter, probe) = adapter(vec![(page(3), 1000), (page(6), 2000)], 50);

    let result = CollectionEngine::new()
        .collect("jack", 2, adapter, &ScrollMapper, &NoopProgress)
        .await
        .unwrap();

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.stop_reason, StopReason::LimitReached);
    assert_eq!(probe.scrolls.load(Ordering::SeqCst), 0);
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_scroll_respects_cycle_cap() {
    let frames = (1..=6).map(|n| (page(n), u64::from(n) * 100)).collect();
    let (adapter, probe) = adapter(frames, 2);

    let result = CollectionEngine::new()
        .collect("jack", 10, adapter, &ScrollMapper, &NoopProgress)
        .await
        .unwrap();

    assert_eq!(result.records.len(), 3);
    assert_eq!(result.stop_reason, StopReason::Exhausted);
    assert_eq!(probe.scrolls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_scroll_missing_marker_is_subject_not_found() {
    let missing = "<html><body>This account doesn't exist</body></html>";
    let (adapter, probe) = adapter(vec![(missing.into(), 800)], 50);
    let progress = RecordingProgress::default();

    let err = CollectionEngine::new()
        .collect("ghost", 10, adapter, &ScrollMapper, &progress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubjectNotFound);
    assert!(err.to_string().contains("ghost"));
    assert!(probe.closed.load(Ordering::SeqCst));
    assert!(progress.reports().is_empty());
}

#[tokio::test]
async fn test_scroll_launch_failure_is_terminal() {
    let launcher = FakeLauncher {
        fail: true,
        ..FakeLauncher::default()
    };
    let adapter = ScrollAdapter::new(Box::new(launcher), config(50)).unwrap();

    let err = CollectionEngine::new()
        .collect("jack", 10, Box::new(adapter), &ScrollMapper, &NoopProgress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
}

#[test]
fn test_invalid_marker_is_config_error() {
    let launcher = FakeLauncher {
        fail: true,
        ..FakeLauncher::default()
    };
    let config = ScrollConfig {
        content_marker: "article[".into(),
        ..ScrollConfig::default()
    };
    let err = ScrollAdapter::new(Box::new(launcher), config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_post_without_permalink_warns_once() {
    let promoted =
        r#"<article data-testid="tweet"><div data-testid="tweetText">Promoted</div></article>"#;
    let frames = (1..=5)
        .map(|n| {
            let html = page(n).replacen("<body>", &format!("<body>{}", promoted), 1);
            (html, u64::from(n) * 100)
        })
        .collect();
    let (adapter, _probe) = adapter(frames, 50);

    let result = CollectionEngine::new()
        .collect("jack", 100, adapter, &ScrollMapper, &NoopProgress)
        .await
        .unwrap();

    assert_eq!(result.records.len(), 5);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, ErrorKind::UnmappableItem);
    assert_eq!(result.warnings[0].position, 0);
    assert_eq!(result.items_pulled, 6);
}

#[tokio::test]
async fn test_browser_failure_while_waiting_is_not_subject_not_found() {
    let probe = SessionProbe::default();
    let launcher = FakeLauncher {
        frames: vec![(page(1), 100)],
        crashed: true,
        probe: probe.clone(),
        ..FakeLauncher::default()
    };
    let adapter = ScrollAdapter::new(Box::new(launcher), config(50)).unwrap();

    let err = CollectionEngine::new()
        .collect("jack", 10, Box::new(adapter), &ScrollMapper, &NoopProgress)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    assert!(probe.closed.load(Ordering::SeqCst));
}
