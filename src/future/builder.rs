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
/// use coalescing_cache::future::CacheBuilder;
/// use std::collections::{HashMap, HashSet};
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Eligibility {
///     Eligible,
///     Ineligible,
///     Unknown,
/// }
///
/// async fn check(ids: HashSet<String>) -> Result<HashMap<String, Eligibility>, String> {
///     Ok(ids.into_iter().map(|id| (id, Eligibility::Unknown)).collect())
/// }
///
/// let cache = CacheBuilder::new(check)
///     .name("eligibility")
///     // "Unknown" verdicts are returned but never cached, so they are
///     // checked again on the next fetch.
///     .cache_if(|e: &Eligibility| *e != Eligibility::Unknown)
///     .record_stats()
///     .build();
///
/// assert_eq!(cache.name(), Some("eligibility"));
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

#[cfg(test)]
mod tests {
    use super::CacheBuilder;

    use std::collections::{HashMap, HashSet};

    async fn lengths(keys: HashSet<String>) -> Result<HashMap<String, usize>, ()> {
        Ok(keys.into_iter().map(|k| (k.clone(), k.len())).collect())
    }

    #[tokio::test]
    async fn build_cache() {
        let cache = CacheBuilder::new(lengths).build();

        assert_eq!(cache.name(), None);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats(), Default::default());

        let cache = CacheBuilder::new(lengths)
            .name("lengths")
            .initial_capacity(16)
            .cache_if(|len: &usize| *len > 1)
            .record_stats()
            .build();

        assert_eq!(cache.name(), Some("lengths"));

        let fetched = cache
            .fetch(["a".to_string(), "abc".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(cache.contains_key("abc"));
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.stats().fetch_count(), 1);
    }
}
