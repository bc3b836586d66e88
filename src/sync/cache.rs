use super::{
    fetcher::Fetcher,
    request_coalescer::{FetchResult, RequestCoalescer},
    CacheBuilder,
};
use crate::{common::cacheability::Cacheability, stats::CacheStats};

use std::{
    borrow::Borrow,
    collections::{HashMap, HashSet},
    fmt,
    hash::Hash,
    sync::Arc,
};

/// A thread-safe cache in front of a blocking batch [`Fetcher`].
///
/// `fetch` returns the cached values for the keys it already holds and asks
/// the fetcher for the rest, in a single call carrying only the missing keys.
/// Threads whose missing keys are exactly the same set share one fetcher call:
/// the first one runs it, the others block until it returns. Values stay
/// cached until [`invalidate`][Self::invalidate] is called.
///
/// # Examples
///
/// Here's an example of several threads asking for the same products at once:
///
/// ```rust
/// use coalescing_cache::sync::Cache;
///
/// use std::{
///     collections::{HashMap, HashSet},
///     sync::atomic::{AtomicUsize, Ordering},
///     sync::Arc,
///     thread,
///     time::Duration,
/// };
///
/// const NUM_THREADS: usize = 8;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let my_calls = Arc::clone(&calls);
///
/// let cache = Cache::new(move |ids: HashSet<u32>| {
///     my_calls.fetch_add(1, Ordering::AcqRel);
///     // A slow lookup.
///     thread::sleep(Duration::from_millis(200));
///     Ok::<_, std::io::Error>(ids.into_iter().map(|id| (id, format!("product {id}"))).collect::<HashMap<_, _>>())
/// });
///
/// let threads: Vec<_> = (0..NUM_THREADS)
///     .map(|_| {
///         // To share the same cache across the threads, clone it.
///         // This is a cheap operation.
///         let my_cache = cache.clone();
///         thread::spawn(move || my_cache.fetch([1, 2, 3]).unwrap())
///     })
///     .collect();
///
/// for t in threads {
///     assert_eq!(t.join().expect("Failed").len(), 3);
/// }
///
/// // Every call after the first one was served from the cache or joined the
/// // pending fetch.
/// assert_eq!(cache.entry_count(), 3);
/// ```
pub struct Cache<K, V, E> {
    inner: Arc<RequestCoalescer<K, V, E>>,
}

impl<K, V, E> Clone for Cache<K, V, E> {
    /// Makes a clone of this shared cache.
    ///
    /// This operation is cheap as it only creates thread-safe reference counted
    /// pointers to the shared internal data structures.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> fmt::Debug for Cache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name())
            .field("entry_count", &self.entry_count())
            .field("in_flight_count", &self.in_flight_count())
            .finish()
    }
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Constructs a new `Cache` that resolves missing keys with `fetcher` and
    /// caches every resolved value.
    ///
    /// To set a cacheability predicate or enable statistics, use the
    /// [`CacheBuilder`][builder-struct].
    ///
    /// [builder-struct]: ./struct.CacheBuilder.html
    pub fn new<F>(fetcher: F) -> Self
    where
        F: Fetcher<K, V, Error = E> + 'static,
    {
        CacheBuilder::new(fetcher).build()
    }

    /// Returns a [`CacheBuilder`][builder-struct], which can build a `Cache`
    /// with various configuration knobs.
    ///
    /// [builder-struct]: ./struct.CacheBuilder.html
    pub fn builder<F>(fetcher: F) -> CacheBuilder<K, V, E>
    where
        F: Fetcher<K, V, Error = E> + 'static,
    {
        CacheBuilder::new(fetcher)
    }

    pub(crate) fn with_everything(
        name: Option<String>,
        initial_capacity: Option<usize>,
        fetcher: Box<dyn Fetcher<K, V, Error = E>>,
        cacheability: Box<dyn Cacheability<V>>,
        record_stats: bool,
    ) -> Self {
        Self {
            inner: Arc::new(RequestCoalescer::new(
                name,
                initial_capacity,
                fetcher,
                cacheability,
                crate::stats::stats_counter(record_stats),
            )),
        }
    }

    /// Returns the values for `keys`, fetching the ones that are not cached.
    ///
    /// If every key is cached, no fetcher call is made. Otherwise the fetcher is
    /// called once, on this thread, with only the missing keys, unless another
    /// thread is already fetching exactly the same missing keys; then this
    /// thread blocks until that call returns.
    ///
    /// Fetched values that pass the cacheability predicate are cached. The rest
    /// are still returned.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error, shared by every thread that waited on the
    /// failed call. Nothing is cached from a failed call.
    ///
    /// # Panics
    ///
    /// Panics if the fetcher panics while this thread is running it. Threads
    /// waiting on that call are not affected; they start over.
    pub fn fetch<I>(&self, keys: I) -> Result<HashMap<K, V>, Arc<E>>
    where
        I: IntoIterator<Item = K>,
    {
        let keys: HashSet<K> = keys.into_iter().collect();
        match self.inner.fetch(&keys) {
            FetchResult::AllCached(v) | FetchResult::Fetched(v) | FetchResult::Coalesced(v) => {
                Ok(v)
            }
            FetchResult::FetchErr(e) => Err(e),
        }
    }

    /// Discards all cached values.
    ///
    /// Fetches that are already running are not cancelled; their callers get
    /// their results, but the results are not written to the cache. After the
    /// cache is cleared, [`Fetcher::invalidate`] is called.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }

    /// Stores `value` for `key` without calling the fetcher, if it passes the
    /// cacheability predicate. Returns `true` if it was stored.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.inner.insert(key, value)
    }

    /// Returns a _clone_ of the cached value for the key, without fetching.
    ///
    /// The key may be any borrowed form of the cache's key type, but `Hash` and
    /// `Eq` on the borrowed form _must_ match those for the key type.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.store().get(key)
    }

    /// Returns `true` if a value for the key is cached.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.store().contains_key(key)
    }

    /// Returns the number of cached values.
    pub fn entry_count(&self) -> usize {
        self.inner.store().entry_count()
    }

    /// Returns the number of fetcher calls currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.store().in_flight_count()
    }

    /// Returns a copy of every cached key and value.
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.inner.store().snapshot()
    }

    /// Returns the name of this cache, if one was given to the builder.
    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    /// Returns a snapshot of the statistics. All counters are zero unless the
    /// cache was built with [`CacheBuilder::record_stats`].
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
