use crate::error::{CollectError, Result};
use crate::types::{Metrics, NormalizedRecord, RawItem, RecordMapper};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("static regex"));

pub struct ScrollMapper;

impl ScrollMapper {
    /// Parse a rendered engagement count such as `12`, `1,204`, `3.4K` or `1.2M`.
    /// Anything unreadable counts as zero.
    pub fn parse_display_count(value: &str) -> u64 {
        let Some(token) = value.split_whitespace().next() else {
            return 0;
        };
        let token = token.replace(',', "");
        let (number, multiplier) = match token.chars().last() {
            Some('K' | 'k') => (&token[..token.len() - 1], 1_000.0),
            Some('M' | 'm') => (&token[..token.len() - 1], 1_000_000.0),
            Some('B' | 'b') => (&token[..token.len() - 1], 1_000_000_000.0),
            _ => (token.as_str(), 1.0),
        };
        number
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| (n * multiplier).round() as u64)
            .unwrap_or(0)
    }

    fn status_id(href: &str) -> Option<String> {
        STATUS_ID
            .captures(href)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn resolve_link(base_url: Option<&str>, href: &str) -> String {
        base_url
            .and_then(|base| Url::parse(base).ok())
            .and_then(|base| base.join(href).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| href.to_string())
    }
}

impl RecordMapper for ScrollMapper {
    fn map(&self, raw: &RawItem) -> Result<NormalizedRecord> {
        let text = raw["text"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("post text not found"))?;

        let datetime = raw["datetime"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("datetime not found"))?;
        let timestamp = DateTime::parse_from_rfc3339(datetime.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                CollectError::unmappable(format!("invalid datetime '{}': {}", datetime, e))
            })?;

        let href = raw["href"]
            .as_str()
            .ok_or_else(|| CollectError::unmappable("permalink not found"))?;
        let source_id = Self::status_id(href)
            .ok_or_else(|| CollectError::unmappable(format!("no status id in '{}'", href)))?;

        let metrics = Metrics {
            replies: Self::parse_display_count(raw["replies"].as_str().unwrap_or_default()),
            retweets: Self::parse_display_count(raw["retweets"].as_str().unwrap_or_default()),
            likes: Self::parse_display_count(raw["likes"].as_str().unwrap_or_default()),
        };
        let link = Self::resolve_link(raw["base_url"].as_str(), href);

        Ok(NormalizedRecord::new(text, timestamp, source_id)?
            .with_link(Some(link))
            .with_metrics(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_display_count() {
        assert_eq!(ScrollMapper::parse_display_count("12"), 12);
        assert_eq!(ScrollMapper::parse_display_count("1,204"), 1204);
        assert_eq!(ScrollMapper::parse_display_count("3.4K"), 3400);
        assert_eq!(ScrollMapper::parse_display_count("1.2M"), 1_200_000);
        assert_eq!(ScrollMapper::parse_display_count("7 Replies"), 7);
        assert_eq!(ScrollMapper::parse_display_count(""), 0);
        assert_eq!(ScrollMapper::parse_display_count("Like"), 0);
    }

    #[test]
    fn test_maps_rendered_post() {
        let raw = json!({
            "text": "just setting up my twttr",
            "datetime": "2006-03-21T20:50:14.000Z",
            "href": "/jack/status/20",
            "replies": "12",
            "retweets": "",
            "likes": "3.4K",
            "base_url": "https://x.com"
        });
        let record = ScrollMapper.map(&raw).unwrap();
        assert_eq!(record.source_id(), "20");
        assert_eq!(record.link(), Some("https://x.com/jack/status/20"));
        assert_eq!(
            record.metrics(),
            Metrics {
                replies: 12,
                retweets: 0,
                likes: 3400
            }
        );
        assert_eq!(record.timestamp().to_rfc3339(), "2006-03-21T20:50:14+00:00");
    }

    #[test]
    fn test_missing_permalink_is_unmappable() {
        let raw = json!({
            "text": "orphan",
            "datetime": "2006-03-21T20:50:14.000Z",
            "href": null
        });
        assert_eq!(ScrollMapper.map(&raw).unwrap_err().kind(), ErrorKind::UnmappableItem);

        let raw = json!({
            "text": "not a status",
            "datetime": "2006-03-21T20:50:14.000Z",
            "href": "/jack/photo"
        });
        assert_eq!(ScrollMapper.map(&raw).unwrap_err().kind(), ErrorKind::UnmappableItem);
    }
}
