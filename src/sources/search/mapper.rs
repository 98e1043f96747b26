use crate::error::{CollectError, Result};
use crate::sources::trailing_segment;
use crate::types::{Metrics, NormalizedRecord, RawItem, RecordMapper};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub struct SearchMapper;

impl SearchMapper {
    fn parse_date(value: &str) -> Result<DateTime<Utc>> {
        let value = value.trim();
        DateTime::parse_from_rfc3339(value)
            .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z"))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CollectError::unmappable(format!("invalid date '{}': {}", value, e)))
    }

    fn id_of(raw: &RawItem) -> Option<String> {
        match &raw["id"] {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => raw["url"].as_str().and_then(trailing_segment),
        }
    }

    fn count(value: &Value) -> u64 {
        match value {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

impl RecordMapper for SearchMapper {
    fn map(&self, raw: &RawItem) -> Result<NormalizedRecord> {
        let text = ["rawContent", "content", "text"]
            .iter()
            .find_map(|key| raw[*key].as_str().filter(|t| !t.trim().is_empty()))
            .ok_or_else(|| CollectError::unmappable("content not found"))?;

        let date = raw["date"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("date not found"))?;
        let timestamp = Self::parse_date(date)?;

        let source_id =
            Self::id_of(raw).ok_or_else(|| CollectError::unmappable("id not found"))?;

        let metrics = Metrics {
            replies: Self::count(&raw["replyCount"]),
            retweets: Self::count(&raw["retweetCount"]),
            likes: Self::count(&raw["likeCount"]),
        };

        Ok(NormalizedRecord::new(text, timestamp, source_id)?
            .with_link(raw["url"].as_str().map(str::to_string))
            .with_metrics(metrics))
    }
}
