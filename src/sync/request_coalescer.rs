use super::fetcher::Fetcher;
use crate::{
    common::{
        self,
        cacheability::Cacheability,
        store::{merge_results, Lookup, Merge, Store, Ticket},
        time::Stopwatch,
    },
    stats::{CacheStats, SharedStatsCounter},
};

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    sync::Arc,
};
use triomphe::Arc as TrioArc;

pub(crate) enum FetchResult<K, V, E> {
    /// Every key was cached. No fetcher call was made.
    AllCached(HashMap<K, V>),
    /// This caller ran the fetcher.
    Fetched(HashMap<K, V>),
    /// This caller waited on a fetcher call made by another caller.
    Coalesced(HashMap<K, V>),
    FetchErr(Arc<E>),
}

// `None` means the fetcher panicked before producing a result.
pub(crate) type WaiterValue<K, V, E> = Option<Result<Arc<HashMap<K, V>>, Arc<E>>>;
pub(crate) type Waiter<K, V, E> = TrioArc<RwLock<WaiterValue<K, V, E>>>;
pub(crate) type WaiterStore<K, V, E> = Store<K, V, Waiter<K, V, E>>;

struct WaiterGuard<'a, K, V, E>
// NOTE: The Drop trait requires these bounds here.
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    ticket: Option<Ticket<K>>,
    store: &'a Mutex<WaiterStore<K, V, E>>,
    write_lock: RwLockWriteGuard<'a, WaiterValue<K, V, E>>,
}

impl<'a, K, V, E> WaiterGuard<'a, K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn complete(
        mut self,
        result: Result<Arc<HashMap<K, V>>, Arc<E>>,
        cacheability: &dyn Cacheability<V>,
    ) -> Merge {
        let merge = match self.ticket.take() {
            Some(ticket) => {
                let fetched = result.as_ref().ok().map(|f| &**f);
                self.store.lock().complete(ticket, fetched, cacheability)
            }
            None => Merge::default(),
        };
        *self.write_lock = Some(result);
        merge
    }
}

impl<'a, K, V, E> Drop for WaiterGuard<'a, K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        // Only reached with a ticket when the fetcher panicked. The waiter
        // value stays `None`, so the waiters will start over.
        if let Some(ticket) = self.ticket.take() {
            self.store.lock().abandon(ticket);
        }
    }
}

pub(crate) struct RequestCoalescer<K, V, E> {
    name: Option<String>,
    store: Mutex<WaiterStore<K, V, E>>,
    fetcher: Box<dyn Fetcher<K, V, Error = E>>,
    cacheability: Box<dyn Cacheability<V>>,
    stats: SharedStatsCounter,
}

impl<K, V, E> RequestCoalescer<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(
        name: Option<String>,
        initial_capacity: Option<usize>,
        fetcher: Box<dyn Fetcher<K, V, Error = E>>,
        cacheability: Box<dyn Cacheability<V>>,
        stats: SharedStatsCounter,
    ) -> Self {
        Self {
            name,
            store: Mutex::new(Store::with_capacity(initial_capacity)),
            fetcher,
            cacheability,
            stats,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, WaiterStore<K, V, E>> {
        self.store.lock()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// # Panics
    /// Panics if the fetcher panicked while this caller was running it, or if
    /// the fetches it waited on kept panicking.
    pub(crate) fn fetch(&self, keys: &HashSet<K>) -> FetchResult<K, V, E> {
        use FetchResult::*;

        if keys.is_empty() {
            return AllCached(HashMap::new());
        }

        if let Some(hit) = self.store.lock().get_all(keys) {
            self.stats.record_hits(hit.len());
            #[cfg(feature = "logging")]
            log::trace!(
                "{}all {} keys are cached",
                common::log_prefix(self.name()),
                hit.len()
            );
            return AllCached(hit);
        }

        // Counters are recorded on the first lookup only, so a restart after a
        // panicking fetcher does not count the same keys twice.
        let mut recorded = false;
        let mut retries = 0;

        loop {
            let waiter: Waiter<K, V, E> = TrioArc::new(RwLock::new(None));
            // NOTE: The write lock must be held before the waiter is registered,
            // so that any thread joining our request blocks on it.
            let write_lock = waiter.write();

            let lookup = self
                .store
                .lock()
                .lookup_or_register(keys, |_| TrioArc::clone(&waiter));

            match lookup {
                Lookup::Hit(hit) => {
                    if !recorded {
                        self.stats.record_hits(hit.len());
                    }
                    return AllCached(hit);
                }
                Lookup::Lead { cached, ticket, .. } => {
                    if !recorded {
                        self.stats.record_hits(cached.len());
                        self.stats.record_misses(ticket.len());
                    }
                    return self.lead(cached, ticket, write_lock);
                }
                Lookup::Join {
                    cached,
                    missing,
                    waiter: existing,
                } => {
                    drop(write_lock);
                    if !recorded {
                        self.stats.record_hits(cached.len());
                        self.stats.record_misses(missing);
                        self.stats.record_coalesced();
                        recorded = true;
                    }

                    #[cfg(feature = "logging")]
                    log::debug!(
                        "{}found a pending fetch for the {} missing keys; waiting for it",
                        common::log_prefix(self.name()),
                        missing
                    );

                    // Somebody else's request already exists, so block until
                    // its result becomes available.
                    let result = existing.read().clone();

                    match result {
                        Some(Ok(fetched)) => return Coalesced(merge_results(cached, &fetched)),
                        Some(Err(e)) => return FetchErr(e),
                        // The fetcher panicked in another thread.
                        None => {
                            #[cfg(feature = "logging")]
                            log::warn!(
                                "{}a fetch for {} keys panicked in another thread; retrying",
                                common::log_prefix(self.name()),
                                missing
                            );

                            retries += 1;
                            common::panic_if_retry_exhausted(retries, common::MAX_RETRIES);
                            // Retry from the beginning.
                            continue;
                        }
                    }
                }
            }
        }
    }

    fn lead(
        &self,
        cached: HashMap<K, V>,
        ticket: Ticket<K>,
        write_lock: RwLockWriteGuard<'_, WaiterValue<K, V, E>>,
    ) -> FetchResult<K, V, E> {
        #[cfg(feature = "logging")]
        log::debug!(
            "{}no cached values for {} keys; starting a fetch",
            common::log_prefix(self.name()),
            ticket.len()
        );

        let keys = ticket.keys().clone();
        // If the fetcher panics, dropping this guard withdraws our request and
        // releases the waiters.
        let guard = WaiterGuard {
            ticket: Some(ticket),
            store: &self.store,
            write_lock,
        };

        let watch = Stopwatch::start();
        let result = self.fetcher.resolve(keys);
        let fetch_time = watch.elapsed_nanos();

        match result {
            Ok(fetched) => {
                self.stats.record_fetch_success(fetch_time);
                let fetched = Arc::new(fetched);
                let merge = guard.complete(Ok(Arc::clone(&fetched)), self.cacheability.as_ref());
                self.stats.record_rejections(merge.rejected);
                debug_assert!(merge.stored + merge.rejected <= fetched.len());

                #[cfg(feature = "logging")]
                if merge.stale {
                    log::debug!(
                        "{}the cache was invalidated during a fetch; not caching its {} values",
                        common::log_prefix(self.name()),
                        fetched.len()
                    );
                } else {
                    log::trace!(
                        "{}cached {} of {} fetched values",
                        common::log_prefix(self.name()),
                        merge.stored,
                        fetched.len()
                    );
                }

                FetchResult::Fetched(merge_results(cached, &fetched))
            }
            Err(e) => {
                self.stats.record_fetch_failure(fetch_time);
                let err = Arc::new(e);
                guard.complete(Err(Arc::clone(&err)), self.cacheability.as_ref());
                FetchResult::FetchErr(err)
            }
        }
    }

    pub(crate) fn insert(&self, key: K, value: V) -> bool {
        if !self.cacheability.should_cache(&value) {
            self.stats.record_rejections(1);
            return false;
        }
        self.store.lock().insert(key, value);
        true
    }

    pub(crate) fn invalidate(&self) {
        self.store.lock().invalidate();

        #[cfg(feature = "logging")]
        log::debug!("{}invalidated all entries", common::log_prefix(self.name()));

        self.fetcher.invalidate();
    }
}
