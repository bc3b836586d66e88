use super::{Cache, Fetcher};
use crate::common::cacheability::{AlwaysCache, Cacheability};

use std::hash::Hash;

/// Builds a [`Cache`][cache-struct] with various configuration knobs.
///
/// [cache-struct]: ./struct.Cache.html
///
/// # Examples
///
/// ```rust
/// use coalescing_cache::sync::CacheBuilder;
/// use std::collections::{HashMap, HashSet};
///
/// let cache = CacheBuilder::new(|ids: HashSet<u64>| {
///     Ok::<_, String>(ids.into_iter().map(|id| (id, id * 100)).collect::<HashMap<_, _>>())
/// })
/// // A name shows up in the log messages.
/// .name("prices")
/// .initial_capacity(100)
/// // Zero prices are treated as placeholders and never cached.
/// .cache_if(|price: &u64| *price > 0)
/// .build();
///
/// let prices = cache.fetch([0, 1, 2]).unwrap();
/// assert_eq!(prices.len(), 3);
/// assert_eq!(cache.entry_count(), 2);
/// ```
pub struct CacheBuilder<K, V, E> {
    name: Option<String>,
    initial_capacity: Option<usize>,
    fetcher: Box<dyn Fetcher<K, V, Error = E>>,
    cacheability: Box<dyn Cacheability<V>>,
    record_stats: bool,
}

impl<K, V, E> CacheBuilder<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Construct a new `CacheBuilder` that will be used to build a `Cache`
    /// resolving missing keys with `fetcher`.
    pub fn new<F>(fetcher: F) -> Self
    where
        F: Fetcher<K, V, Error = E> + 'static,
    {
        Self {
            name: None,
            initial_capacity: None,
            fetcher: Box::new(fetcher),
            cacheability: Box::new(AlwaysCache),
            record_stats: false,
        }
    }

    /// Builds a `Cache<K, V, E>`.
    pub fn build(self) -> Cache<K, V, E> {
        Cache::with_everything(
            self.name,
            self.initial_capacity,
            self.fetcher,
            self.cacheability,
            self.record_stats,
        )
    }
}

impl<K, V, E> CacheBuilder<K, V, E> {
    /// Sets the name of the cache. Currently the name is used for
    /// identification only in logging messages.
    pub fn name(self, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Sets the initial capacity of the cache map.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        Self {
            initial_capacity: Some(capacity),
            ..self
        }
    }

    /// Sets the predicate deciding which fetched values are cached. By default
    /// every value is cached.
    pub fn cache_if(self, cacheability: impl Cacheability<V> + 'static) -> Self {
        Self {
            cacheability: Box::new(cacheability),
            ..self
        }
    }

    /// Enables recording of [`CacheStats`][stats-struct].
    ///
    /// [stats-struct]: ../stats/struct.CacheStats.html
    pub fn record_stats(self) -> Self {
        Self {
            record_stats: true,
            ..self
        }
    }
}
