//! Provides a thread-safe, asynchronous (futures aware) coalescing cache.
//!
//! To use this module, enable a crate feature called "future".

mod builder;
mod cache;
mod fetcher;
mod request_coalescer;

pub use {builder::CacheBuilder, cache::Cache, fetcher::Fetcher};
