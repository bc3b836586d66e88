/// Decides whether a freshly resolved value may be stored in the cache.
///
/// The cache calls [`should_cache`][Self::should_cache] once for every value a
/// fetcher returns. Values that are rejected are still handed back to the
/// callers of that fetch, but they are not stored, so the next fetch for their
/// key goes to the fetcher again. Use this for indeterminate results (e.g. an
/// "unknown" eligibility verdict) that should always be retried.
///
/// Any `Fn(&V) -> bool` closure is a `Cacheability`.
///
/// The predicate must be pure and fast: it runs while the cache's internal lock
/// is held.
pub trait Cacheability<V>: Send + Sync {
    fn should_cache(&self, value: &V) -> bool;
}

/// The default [`Cacheability`]: every resolved value is cached.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysCache;

impl<V> Cacheability<V> for AlwaysCache {
    #[inline]
    fn should_cache(&self, _value: &V) -> bool {
        true
    }
}

impl<V, F> Cacheability<V> for F
where
    F: Fn(&V) -> bool + Send + Sync,
{
    #[inline]
    fn should_cache(&self, value: &V) -> bool {
        self(value)
    }
}
