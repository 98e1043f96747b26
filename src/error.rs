use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("subject '{subject}' not found: {reason}")]
    SubjectNotFound { subject: String, reason: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed feed: {0}")]
    MalformedFeed(String),

    #[error("unmappable item: {0}")]
    UnmappableItem(String),

    #[error("duplicate item: {0}")]
    DuplicateItem(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Taxonomy every [`CollectError`] falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    SubjectNotFound,
    UpstreamUnavailable,
    MalformedFeed,
    UnmappableItem,
    DuplicateItem,
    InvalidRequest,
    Config,
    Io,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SubjectNotFound => "SubjectNotFound",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::MalformedFeed => "MalformedFeed",
            ErrorKind::UnmappableItem => "UnmappableItem",
            ErrorKind::DuplicateItem => "DuplicateItem",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::Config => "Config",
            ErrorKind::Io => "Io",
            ErrorKind::Serialization => "Serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::SubjectNotFound { .. } => ErrorKind::SubjectNotFound,
            CollectError::UpstreamUnavailable(_) | CollectError::Http(_) => {
                ErrorKind::UpstreamUnavailable
            }
            CollectError::MalformedFeed(_) => ErrorKind::MalformedFeed,
            CollectError::UnmappableItem(_) => ErrorKind::UnmappableItem,
            CollectError::DuplicateItem(_) => ErrorKind::DuplicateItem,
            CollectError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CollectError::Config(_) | CollectError::Toml(_) => ErrorKind::Config,
            CollectError::Json(_) => ErrorKind::Serialization,
            CollectError::Io(_) => ErrorKind::Io,
        }
    }

    /// Recoverable errors affect a single item and never end a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::UnmappableItem | ErrorKind::DuplicateItem
        )
    }

    pub fn unmappable(message: impl Into<String>) -> Self {
        CollectError::UnmappableItem(message.into())
    }

    pub fn subject_not_found(subject: &str, reason: impl Into<String>) -> Self {
        CollectError::SubjectNotFound {
            subject: subject.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectError>;
