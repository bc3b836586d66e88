#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]
// Without a cache flavor enabled only the shared core is compiled.
#![cfg_attr(not(any(feature = "future", feature = "sync")), allow(dead_code))]

//! A cache in front of a batch lookup that hands back partial results and
//! coalesces concurrent requests.
//!
//! A cache is built around a _fetcher_, which resolves a set of keys to values
//! in one call, usually by going to a remote service. `fetch` returns the
//! cached values for the requested keys and asks the fetcher only for the keys
//! that are missing:
//!
//! - If every key is cached, the fetcher is not called.
//! - If another caller is already fetching exactly the same missing keys, the
//!   new caller waits for that call instead of making its own, and both get the
//!   same outcome.
//! - A fetched value is cached only if it passes the cache's _cacheability_
//!   predicate. Values that do not pass are still returned.
//! - A failed fetch caches nothing, and its error is handed to every caller
//!   that waited on it.
//!
//! Values stay cached until `invalidate` is called. There is no expiration,
//! no size bound and no eviction.
//!
//! # Cache Flavors
//!
//! - Asynchronous (futures aware) cache: [`future::Cache`][future-cache-struct]
//!   (requires the `future` feature)
//! - Blocking cache for multi-threaded programs: [`sync::Cache`][sync-cache-struct]
//!   (requires the `sync` feature)
//!
//! [future-cache-struct]: ./future/struct.Cache.html
//! [sync-cache-struct]: ./sync/struct.Cache.html
//!
//! # Logging
//!
//! With the `logging` feature enabled, the caches emit `debug` and `trace`
//! messages through the [`log`][log-crate] crate, prefixed with the cache name
//! if one was set on the builder.
//!
//! [log-crate]: https://docs.rs/log
//!
//! # Minimum Supported Rust Versions
//!
//! This crate's minimum supported Rust version (MSRV) is 1.65.

pub(crate) mod common;
pub mod stats;

#[cfg(feature = "future")]
#[cfg_attr(docsrs, doc(cfg(feature = "future")))]
pub mod future;

#[cfg(feature = "sync")]
#[cfg_attr(docsrs, doc(cfg(feature = "sync")))]
pub mod sync;

pub use common::cacheability::{AlwaysCache, Cacheability};

#[cfg(all(doctest, feature = "sync", feature = "future"))]
mod doctests {
    // https://doc.rust-lang.org/rustdoc/write-documentation/documentation-tests.html#include-items-only-when-collecting-doctests
    #[doc = include_str!("../README.md")]
    struct ReadMeDoctests;
}
