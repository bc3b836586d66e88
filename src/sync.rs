//! Provides a thread-safe, blocking coalescing cache.
//!
//! To use this module, enable a crate feature called "sync".

mod builder;
mod cache;
mod fetcher;
mod request_coalescer;

pub use {builder::CacheBuilder, cache::Cache, fetcher::Fetcher};
