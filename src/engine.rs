//! Drives one acquisition strategy to a bounded, deduplicated result set.
//!
//! A run moves through `Idle -> Opening -> Pulling -> {Mapping, Accepting,
//! Skipping} -> Done | Failed`. Per-item problems loop back to `Pulling`;
//! only adapter failures reach `Failed`. The stream is closed on every exit
//! path before `collect` returns.

use crate::constants::{
    is_valid_subject, normalize_subject, MAX_LIMIT, MIN_LIMIT, PROGRESS_CEILING,
};
use crate::error::{CollectError, Result};
use crate::types::{
    CollectionResult, CollectionWarning, NormalizedRecord, ProgressSink, RawItem, RawItemStream,
    RecordMapper, SourceAdapter, StopReason,
};
use metrics::{counter, histogram};
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Opening,
    Pulling,
    Mapping,
    Accepting,
    Skipping,
    Done,
    Failed,
}

enum Pulled {
    Item(RawItem),
    Exhausted,
    Cancelled,
    Failed(CollectError),
}

/// Mutable state owned by a single run.
struct Run {
    state: RunState,
    limit: usize,
    records: Vec<NormalizedRecord>,
    warnings: Vec<CollectionWarning>,
    seen: HashSet<String>,
    pulled: usize,
    duplicates: usize,
}

impl Run {
    fn new(limit: usize) -> Self {
        Self {
            state: RunState::Idle,
            limit,
            records: Vec::with_capacity(limit.min(128)),
            warnings: Vec::new(),
            seen: HashSet::new(),
            pulled: 0,
            duplicates: 0,
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn is_full(&self) -> bool {
        self.records.len() >= self.limit
    }

    fn progress(&self) -> f64 {
        (self.records.len() as f64 / self.limit as f64).min(PROGRESS_CEILING)
    }

    /// Map one raw item and accept or skip it. Never fails the run.
    fn process(&mut self, raw: &RawItem, mapper: &dyn RecordMapper) {
        let position = self.pulled;
        self.pulled += 1;

        self.transition(RunState::Mapping);
        match mapper.map(raw) {
            Ok(record) => {
                if self.seen.insert(record.source_id().to_string()) {
                    self.transition(RunState::Accepting);
                    debug!("Accepted {}", record.source_id());
                    self.records.push(record);
                } else {
                    self.transition(RunState::Skipping);
                    debug!("Skipping duplicate {}", record.source_id());
                    self.duplicates += 1;
                }
            }
            Err(e) => {
                self.transition(RunState::Skipping);
                warn!("Skipping item {}: {}", position, e);
                self.warnings.push(CollectionWarning {
                    kind: e.kind(),
                    position,
                    message: e.to_string(),
                });
            }
        }
        self.transition(RunState::Pulling);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionEngine {
    cancel: Option<CancellationToken>,
}

impl CollectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs stop between pulls once `token` is cancelled.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
        }
    }

    pub fn validate_request(subject: &str, limit: usize) -> Result<String> {
        let subject = normalize_subject(subject);
        if subject.is_empty() {
            return Err(CollectError::InvalidRequest(
                "Please enter a Twitter username".into(),
            ));
        }
        if !is_valid_subject(&subject) {
            return Err(CollectError::InvalidRequest(format!(
                "'{}' is not a valid username (letters, digits and _, at most 15)",
                subject
            )));
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
            return Err(CollectError::InvalidRequest(format!(
                "limit must be between {} and {}, got {}",
                MIN_LIMIT, MAX_LIMIT, limit
            )));
        }
        Ok(subject)
    }

    /// Collect up to `limit` records for `subject` from `adapter`.
    ///
    /// The adapter is consumed by the run. Terminal adapter errors are
    /// returned as `Err` with no records; a stream that runs dry before
    /// `limit` is a successful short collection.
    #[instrument(skip(self, adapter, mapper, progress), fields(strategy = adapter.strategy()))]
    pub async fn collect(
        &self,
        subject: &str,
        limit: usize,
        adapter: Box<dyn SourceAdapter>,
        mapper: &dyn RecordMapper,
        progress: &dyn ProgressSink,
    ) -> Result<CollectionResult> {
        let subject = Self::validate_request(subject, limit)?;
        let strategy = adapter.strategy();
        let started = Instant::now();
        counter!("tweet_collect_runs_total", "strategy" => strategy).increment(1);

        let mut run = Run::new(limit);
        run.transition(RunState::Opening);
        info!("Opening {} source for @{}", strategy, subject);
        let mut stream = match adapter.open(&subject).await {
            Ok(stream) => stream,
            Err(e) => {
                run.transition(RunState::Failed);
                return Err(Self::fail(strategy, e));
            }
        };
        run.transition(RunState::Pulling);

        let stop_reason = loop {
            if run.is_full() {
                break StopReason::LimitReached;
            }
            match self.pull(&mut stream).await {
                Pulled::Item(raw) => {
                    run.process(&raw, mapper);
                    progress.report(run.progress());
                }
                Pulled::Exhausted => break StopReason::Exhausted,
                Pulled::Cancelled => {
                    warn!("Run for @{} cancelled", subject);
                    break StopReason::Cancelled;
                }
                Pulled::Failed(e) => {
                    stream.close().await;
                    run.transition(RunState::Failed);
                    return Err(Self::fail(strategy, e));
                }
            }
        };

        stream.close().await;
        run.transition(RunState::Done);
        progress.report(1.0);

        let elapsed = started.elapsed();
        counter!("tweet_records_accepted_total", "strategy" => strategy)
            .increment(run.records.len() as u64);
        counter!("tweet_items_unmappable_total", "strategy" => strategy)
            .increment(run.warnings.len() as u64);
        counter!("tweet_items_duplicate_total", "strategy" => strategy)
            .increment(run.duplicates as u64);
        histogram!("tweet_collect_duration_seconds", "strategy" => strategy)
            .record(elapsed.as_secs_f64());

        info!(
            "Collected {} of {} tweets from @{} ({} pulled, {} duplicates, {} warnings, {:?})",
            run.records.len(),
            limit,
            subject,
            run.pulled,
            run.duplicates,
            run.warnings.len(),
            stop_reason
        );

        Ok(CollectionResult {
            subject,
            strategy: strategy.to_string(),
            records: run.records,
            warnings: run.warnings,
            stop_reason,
            items_pulled: run.pulled,
            duplicates_skipped: run.duplicates,
            elapsed,
        })
    }

    async fn pull(&self, stream: &mut Box<dyn RawItemStream>) -> Pulled {
        let outcome = match &self.cancel {
            Some(token) if token.is_cancelled() => return Pulled::Cancelled,
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Pulled::Cancelled,
                    outcome = stream.next_item() => outcome,
                }
            }
            None => stream.next_item().await,
        };
        match outcome {
            Ok(Some(raw)) => Pulled::Item(raw),
            Ok(None) => Pulled::Exhausted,
            Err(e) => Pulled::Failed(e),
        }
    }

    fn fail(strategy: &'static str, e: CollectError) -> CollectError {
        error!("Collection failed ({}): {}", e.kind(), e);
        counter!("tweet_collect_failures_total", "strategy" => strategy, "kind" => e.kind().as_str())
            .increment(1);
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request_normalizes_subject() {
        assert_eq!(CollectionEngine::validate_request(" @jack ", 5).unwrap(), "jack");
    }

    #[test]
    fn test_validate_request_bounds() {
        assert!(CollectionEngine::validate_request("jack", 1).is_ok());
        assert!(CollectionEngine::validate_request("jack", 1000).is_ok());
        assert!(CollectionEngine::validate_request("jack", 0).is_err());
        assert!(CollectionEngine::validate_request("jack", 1001).is_err());
        assert!(CollectionEngine::validate_request("  @ ", 10).is_err());
    }

    #[test]
    fn test_validate_request_rejects_path_and_url_characters() {
        for subject in ["../../escaped", "a/b", "jack?x", "jack#y", "two words", "@@jack"] {
            let err = CollectionEngine::validate_request(subject, 5).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest, "{}", subject);
        }
        assert_eq!(CollectionEngine::validate_request("@Jack_99", 5).unwrap(), "Jack_99");
    }

    #[test]
    fn test_progress_is_capped_below_completion() {
        let mut run = Run::new(2);
        assert_eq!(run.progress(), 0.0);
        run.seen.insert("a".into());
        run.records.push(
            NormalizedRecord::new("x", chrono::Utc::now(), "a").unwrap(),
        );
        assert_eq!(run.progress(), 0.5);
        run.records.push(
            NormalizedRecord::new("y", chrono::Utc::now(), "b").unwrap(),
        );
        assert_eq!(run.progress(), PROGRESS_CEILING);
    }
}
