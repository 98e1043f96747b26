use crate::error::{CollectError, Result};
use crate::sources::trailing_segment;
use crate::types::{NormalizedRecord, RawItem, RecordMapper};
use chrono::{DateTime, Utc};

pub struct FeedMapper;

impl FeedMapper {
    /// Feed titles are rendered as `username: text`; drop that prefix when it
    /// names the subject.
    fn strip_subject_prefix<'a>(title: &'a str, subject: Option<&str>) -> &'a str {
        let title = title.trim_start();
        let Some(subject) = subject.filter(|s| !s.is_empty()) else {
            return title;
        };
        for prefix in [format!("{}:", subject), format!("@{}:", subject)] {
            if let Some(head) = title.get(..prefix.len()) {
                if head.eq_ignore_ascii_case(&prefix) {
                    return &title[prefix.len()..];
                }
            }
        }
        title
    }

    fn parse_pub_date(value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CollectError::unmappable(format!("invalid pubDate '{}': {}", value, e)))
    }
}

impl RecordMapper for FeedMapper {
    fn map(&self, raw: &RawItem) -> Result<NormalizedRecord> {
        let title = raw["title"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("title not found"))?;
        let text = Self::strip_subject_prefix(title, raw["subject"].as_str());

        let pub_date = raw["pubDate"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("pubDate not found"))?;
        let timestamp = Self::parse_pub_date(pub_date)?;

        let link = raw["link"].as_str().map(str::trim).filter(|l| !l.is_empty());
        let source_id = link
            .and_then(trailing_segment)
            .or_else(|| raw["guid"].as_str().and_then(trailing_segment))
            .ok_or_else(|| CollectError::unmappable("no status id in link or guid"))?;

        Ok(NormalizedRecord::new(text, timestamp, source_id)?
            .with_link(link.map(str::to_string)))
    }
}
