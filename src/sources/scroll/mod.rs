// Browser scroll-and-scrape strategy.

pub mod adapter;
pub mod browser;
pub mod mapper;

pub use adapter::{extract_items, ScrollAdapter};
pub use browser::{BrowserLauncher, BrowserSession, ChromiumLauncher};
pub use mapper::ScrollMapper;
