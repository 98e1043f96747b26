//! Progress sinks the collection engine can report to.

use crate::types::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::info;

const BAR_RESOLUTION: u64 = 1000;

/// The bar currently drawn on stderr, if any. Console logging suspends it
/// while writing so log lines do not tear the bar.
static ACTIVE_BAR: Lazy<Mutex<Option<ProgressBar>>> = Lazy::new(|| Mutex::new(None));

pub(crate) fn active_bar() -> Option<ProgressBar> {
    ACTIVE_BAR.lock().ok().and_then(|bar| bar.clone())
}

fn set_active_bar(bar: Option<ProgressBar>) {
    if let Ok(mut active) = ACTIVE_BAR.lock() {
        *active = bar;
    }
}

/// Discards every update.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _fraction: f64) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, fraction: f64) {
        self(fraction)
    }
}

/// Emits progress as tracing events, one per whole ten percent.
pub struct LogProgress {
    subject: String,
    last_decile: std::sync::atomic::AtomicU64,
}

impl LogProgress {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            last_decile: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, fraction: f64) {
        use std::sync::atomic::Ordering;
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u64;
        if self.last_decile.fetch_max(decile, Ordering::Relaxed) < decile {
            info!(subject = %self.subject, "Collection {:.0}% complete", fraction * 100.0);
        }
    }
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(subject: &str) -> Self {
        let bar = ProgressBar::new(BAR_RESOLUTION);
        let style = ProgressStyle::with_template("{spinner} [{bar:40}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(format!("Fetching tweets from @{}...", subject));
        set_active_bar(Some(bar.clone()));
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_RESOLUTION as f64).round() as u64;
        self.bar.set_position(position);
        if fraction >= 1.0 {
            self.bar.finish_with_message("done");
        }
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        set_active_bar(None);
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |f: f64| seen.lock().unwrap().push(f);
        sink.report(0.25);
        sink.report(1.0);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 1.0]);
    }

    #[test]
    fn test_log_progress_tracks_highest_decile() {
        let sink = LogProgress::new("jack");
        sink.report(0.35);
        sink.report(0.1);
        assert_eq!(
            sink.last_decile.load(std::sync::atomic::Ordering::Relaxed),
            3
        );
    }

    #[test]
    fn test_bar_is_registered_for_console_logging_while_alive() {
        let bar = BarProgress::new("jack");
        assert!(active_bar().is_some());
        bar.report(0.5);
        bar.report(1.0);
        drop(bar);
        assert!(active_bar().is_none());
    }
}
