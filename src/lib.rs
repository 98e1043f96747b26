pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod export;
pub mod http;
pub mod logging;
pub mod progress;
pub mod sources;
pub mod types;

pub use engine::CollectionEngine;
pub use error::{CollectError, ErrorKind, Result};
pub use types::{
    CollectionResult, CollectionWarning, Metrics, NormalizedRecord, ProgressSink, RawItem,
    RawItemStream, RecordMapper, SourceAdapter, StopReason,
};
