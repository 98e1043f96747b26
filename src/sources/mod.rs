// Acquisition strategies. Each one pairs a SourceAdapter with the
// RecordMapper that understands its raw items.

pub mod feed;
pub mod scroll;
pub mod search;

use crate::config::Config;
use crate::constants::{FEED_STRATEGY, SCROLL_STRATEGY, SEARCH_STRATEGY};
use crate::error::Result;
use crate::types::{RecordMapper, SourceAdapter};

pub use feed::{FeedAdapter, FeedMapper};
pub use scroll::{ChromiumLauncher, ScrollAdapter, ScrollMapper};
pub use search::{SearchAdapter, SearchMapper};

/// An adapter ready for one run, with its mapper.
pub struct Source {
    pub adapter: Box<dyn SourceAdapter>,
    pub mapper: Box<dyn RecordMapper>,
}

/// Build the source for `strategy`, or `None` if the name is unknown.
pub fn create_source(strategy: &str, config: &Config) -> Result<Option<Source>> {
    let source = match strategy {
        FEED_STRATEGY => Source {
            adapter: Box::new(FeedAdapter::new(config.feed.clone())?),
            mapper: Box::new(FeedMapper),
        },
        SEARCH_STRATEGY => Source {
            adapter: Box::new(SearchAdapter::new(config.search.clone())?),
            mapper: Box::new(SearchMapper),
        },
        SCROLL_STRATEGY => {
            let launcher = ChromiumLauncher::new(config.scroll.clone());
            Source {
                adapter: Box::new(ScrollAdapter::new(
                    Box::new(launcher),
                    config.scroll.clone(),
                )?),
                mapper: Box::new(ScrollMapper),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(source))
}

/// Last non-empty path segment of a URL or path, ignoring query and fragment.
pub(crate) fn trailing_segment(link: &str) -> Option<String> {
    let path = link.split(['#', '?']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
