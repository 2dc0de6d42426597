//! Page retrieval, content extraction, and the fetch worker pool.
//!
//! This crate provides:
//! - [`Fetcher`] / [`HttpFetcher`]: retrieve the page body for one key
//! - [`adapters`]: source-specific extractors turning a page into raw field sets
//! - [`FetchWorkerPool`]: bounded-concurrency fetch + extract with retry

pub mod adapters;
pub mod fetcher;
pub mod pool;

pub use adapters::{Extractor, SelectorExtractor, TextExtractor, WordByWordExtractor, for_source};
pub use fetcher::{FetchError, Fetcher, HttpFetcher, UrlTemplate};
pub use pool::{FetchOutcome, FetchWorkerPool, RetryPolicy};
