use super::fetcher::Fetcher;
use crate::{
    common::{
        self,
        cacheability::Cacheability,
        store::{merge_results, Lookup, Store, Ticket},
        time::Stopwatch,
    },
    stats::{CacheStats, SharedStatsCounter},
};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, MutexGuard};
use std::{
    any::Any,
    collections::{HashMap, HashSet},
    hash::Hash,
    panic::AssertUnwindSafe,
    sync::Arc,
};

pub(crate) enum FetchResult<K, V, E> {
    /// Every key was cached. No fetcher call was made.
    AllCached(HashMap<K, V>),
    /// This caller started the fetcher call.
    Fetched(HashMap<K, V>),
    /// This caller joined a fetcher call started by another caller.
    Coalesced(HashMap<K, V>),
    FetchErr(Arc<E>),
}

type PanicPayload = Box<dyn Any + Send>;

/// The outcome of one fetcher call, handed to every caller of the request.
pub(crate) enum FetchOutcome<K, V, E> {
    Done(Result<Arc<HashMap<K, V>>, Arc<E>>),
    /// The fetcher panicked. The first caller to take the payload resumes the
    /// panic; the others start over.
    FetcherPanicked(Arc<Mutex<Option<PanicPayload>>>),
}

impl<K, V, E> Clone for FetchOutcome<K, V, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Done(result) => Self::Done(result.clone()),
            Self::FetcherPanicked(payload) => Self::FetcherPanicked(Arc::clone(payload)),
        }
    }
}

/// A fetcher call in flight, shared by its callers.
///
/// The registry holds a clone until the call completes, so the call is never
/// dropped half-way: it is driven by whichever caller is still polling, and if
/// every caller went away, the next caller for the same keys resumes it.
pub(crate) type SharedFetch<K, V, E> = Shared<BoxFuture<'static, FetchOutcome<K, V, E>>>;
pub(crate) type FetchStore<K, V, E> = Store<K, V, SharedFetch<K, V, E>>;

pub(crate) struct RequestCoalescer<K, V, E> {
    name: Option<String>,
    store: Arc<Mutex<FetchStore<K, V, E>>>,
    fetcher: Arc<dyn Fetcher<K, V, Error = E>>,
    cacheability: Arc<dyn Cacheability<V>>,
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
            store: Arc::new(Mutex::new(Store::with_capacity(initial_capacity))),
            fetcher: Arc::from(fetcher),
            cacheability: Arc::from(cacheability),
            stats,
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, FetchStore<K, V, E>> {
        self.store.lock()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// # Panics
    /// Panics if the fetcher panicked and this caller was the first to observe
    /// it, or if the fetches it waited on kept panicking.
    pub(crate) async fn fetch(&self, keys: &HashSet<K>) -> FetchResult<K, V, E> {
        use FetchResult::*;

        if keys.is_empty() {
            return AllCached(HashMap::new());
        }

        let hit = self.store.lock().get_all(keys);
        if let Some(hit) = hit {
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
            let lookup = self
                .store
                .lock()
                .lookup_or_register(keys, |ticket| self.start_fetch(ticket.clone()));

            let (cached, missing, pending, started) = match lookup {
                Lookup::Hit(hit) => {
                    if !recorded {
                        self.stats.record_hits(hit.len());
                    }
                    return AllCached(hit);
                }
                Lookup::Lead {
                    cached,
                    ticket,
                    waiter,
                } => {
                    #[cfg(feature = "logging")]
                    log::debug!(
                        "{}no cached values for {} keys; starting a fetch",
                        common::log_prefix(self.name()),
                        ticket.len()
                    );
                    (cached, ticket.len(), waiter, true)
                }
                Lookup::Join {
                    cached,
                    missing,
                    waiter,
                } => {
                    #[cfg(feature = "logging")]
                    log::debug!(
                        "{}found a pending fetch for the {} missing keys; waiting for it",
                        common::log_prefix(self.name()),
                        missing
                    );
                    (cached, missing, waiter, false)
                }
            };

            if !recorded {
                self.stats.record_hits(cached.len());
                self.stats.record_misses(missing);
                if !started {
                    self.stats.record_coalesced();
                }
                recorded = true;
            }

            match pending.await {
                FetchOutcome::Done(Ok(fetched)) => {
                    let merged = merge_results(cached, &fetched);
                    return if started {
                        Fetched(merged)
                    } else {
                        Coalesced(merged)
                    };
                }
                FetchOutcome::Done(Err(e)) => return FetchErr(e),
                FetchOutcome::FetcherPanicked(payload) => {
                    let payload = payload.lock().take();
                    if let Some(payload) = payload {
                        std::panic::resume_unwind(payload);
                    }

                    #[cfg(feature = "logging")]
                    log::warn!(
                        "{}a fetch for {} keys panicked; retrying",
                        common::log_prefix(self.name()),
                        missing
                    );

                    retries += 1;
                    common::panic_if_retry_exhausted(retries, common::MAX_RETRIES);
                    // Retry from the beginning.
                }
            }
        }
    }

    /// Builds the fetcher call for `ticket`. Nothing runs until a caller polls
    /// it. On completion it retires the request and merges the results, once,
    /// whichever caller happens to drive it.
    fn start_fetch(&self, ticket: Ticket<K>) -> SharedFetch<K, V, E> {
        // Weak, as the registry inside the store holds this future.
        let store = Arc::downgrade(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let cacheability = Arc::clone(&self.cacheability);
        let stats = Arc::clone(&self.stats);
        #[cfg(feature = "logging")]
        let prefix = common::log_prefix(self.name());

        async move {
            let keys = ticket.keys().clone();
            let watch = Stopwatch::start();
            // Catch a panic here. Otherwise it would poison the shared future
            // and every caller waiting on it would panic too.
            let result = AssertUnwindSafe(async { fetcher.resolve(keys).await })
                .catch_unwind()
                .await;
            let fetch_time = watch.elapsed_nanos();

            let store = store.upgrade();

            match result {
                Ok(Ok(fetched)) => {
                    stats.record_fetch_success(fetch_time);
                    let fetched = Arc::new(fetched);
                    if let Some(store) = store {
                        let merge = store
                            .lock()
                            .complete(ticket, Some(&fetched), cacheability.as_ref());
                        stats.record_rejections(merge.rejected);
                        debug_assert!(merge.stored + merge.rejected <= fetched.len());

                        #[cfg(feature = "logging")]
                        if merge.stale {
                            log::debug!(
                                "{}the cache was invalidated during a fetch; not caching its {} values",
                                prefix,
                                fetched.len()
                            );
                        } else {
                            log::trace!(
                                "{}cached {} of {} fetched values",
                                prefix,
                                merge.stored,
                                fetched.len()
                            );
                        }
                    }
                    FetchOutcome::Done(Ok(fetched))
                }
                Ok(Err(e)) => {
                    stats.record_fetch_failure(fetch_time);
                    if let Some(store) = store {
                        store.lock().complete(ticket, None, cacheability.as_ref());
                    }
                    FetchOutcome::Done(Err(Arc::new(e)))
                }
                Err(payload) => {
                    if let Some(store) = store {
                        store.lock().abandon(ticket);
                    }

                    #[cfg(feature = "logging")]
                    log::warn!("{}the fetcher panicked", prefix);

                    FetchOutcome::FetcherPanicked(Arc::new(Mutex::new(Some(payload))))
                }
            }
        }
        .boxed()
        .shared()
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
