use futures_util::future::{BoxFuture, FutureExt};
use std::{
    collections::{HashMap, HashSet},
    future::Future,
};

/// Resolves a batch of keys to values, asynchronously.
///
/// The cache calls [`resolve`][Self::resolve] with exactly the keys that are
/// neither cached nor already being fetched. The returned map may hold only a
/// subset of them; keys without a value are simply absent from the result of
/// `Cache::fetch`. An error is handed, unchanged, to every caller waiting on
/// that call.
///
/// Any `Fn(HashSet<K>) -> impl Future<Output = Result<HashMap<K, V>, E>>` is a
/// `Fetcher`:
///
/// ```rust
/// use coalescing_cache::future::Cache;
/// use std::collections::{HashMap, HashSet};
///
/// use std::convert::Infallible;
///
/// // Resolves every key to its length.
/// let cache: Cache<String, usize, Infallible> = Cache::new(|keys: HashSet<String>| async move {
///     let lengths: HashMap<String, usize> = keys.into_iter().map(|k| (k.clone(), k.len())).collect();
///     Ok::<_, Infallible>(lengths)
/// });
/// ```
pub trait Fetcher<K, V>: Send + Sync {
    type Error: Send + Sync + 'static;

    fn resolve(&self, keys: HashSet<K>) -> BoxFuture<'_, Result<HashMap<K, V>, Self::Error>>;

    /// Called by `Cache::invalidate` after the cache has been cleared, so that
    /// a fetcher with caches of its own can drop them too.
    fn invalidate(&self) {}
}

impl<K, V, E, F, Fut> Fetcher<K, V> for F
where
    F: Fn(HashSet<K>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<K, V>, E>> + Send + 'static,
    E: Send + Sync + 'static,
{
    type Error = E;

    fn resolve(&self, keys: HashSet<K>) -> BoxFuture<'_, Result<HashMap<K, V>, E>> {
        self(keys).boxed()
    }
}
