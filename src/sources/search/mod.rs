// Search iterator strategy: a paginated `from:<subject>` query.

pub mod adapter;
pub mod mapper;

pub use adapter::SearchAdapter;
pub use mapper::SearchMapper;
