// Syndication feed strategy: an RSS document fetched through a proxy.

pub mod adapter;
pub mod mapper;

pub use adapter::FeedAdapter;
pub use mapper::FeedMapper;
