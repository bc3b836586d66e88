use std::collections::{HashMap, HashSet};

/// Resolves a batch of keys to values, blocking the calling thread.
///
/// The cache calls [`resolve`][Self::resolve] with exactly the keys that are
/// neither cached nor already being fetched, on the thread of the caller that
/// started the fetch. The returned map may hold only a subset of them. An error
/// is handed, unchanged, to every caller waiting on that call.
///
/// Any `Fn(HashSet<K>) -> Result<HashMap<K, V>, E>` is a `Fetcher`.
///
/// A fetcher must not call `fetch` on the cache it serves for the same keys;
/// that call would wait on itself.
pub trait Fetcher<K, V>: Send + Sync {
    type Error: Send + Sync + 'static;

    fn resolve(&self, keys: HashSet<K>) -> Result<HashMap<K, V>, Self::Error>;

    /// Called by `Cache::invalidate` after the cache has been cleared, so that
    /// a fetcher with caches of its own can drop them too.
    fn invalidate(&self) {}
}

impl<K, V, E, F> Fetcher<K, V> for F
where
    F: Fn(HashSet<K>) -> Result<HashMap<K, V>, E> + Send + Sync,
    E: Send + Sync + 'static,
{
    type Error = E;

    fn resolve(&self, keys: HashSet<K>) -> Result<HashMap<K, V>, E> {
        self(keys)
    }
}
