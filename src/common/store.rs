use super::{cacheability::Cacheability, key_set::KeySet};

use std::{
    borrow::Borrow,
    collections::{hash_map::RandomState, HashMap, HashSet},
    hash::Hash,
};

/// The shared mutable state of a cache: the cache map, the registry of
/// in-flight requests, and the invalidation generation.
///
/// `Store` does no locking itself. Both `sync::Cache` and `future::Cache` keep
/// it behind a single mutex, and every method here is one critical section.
/// `W` is the waiter handle the caching front-end parks its callers on.
pub(crate) struct Store<K, V, W> {
    entries: HashMap<K, V>,
    in_flight: HashMap<KeySet<K>, InFlight<W>>,
    key_hasher: RandomState,
    generation: u64,
    next_request_id: u64,
}

struct InFlight<W> {
    request_id: u64,
    waiter: W,
}

/// Identifies a registered in-flight request. Whoever drives the fetcher call
/// must eventually give it back through [`Store::complete`] or
/// [`Store::abandon`].
#[derive(Clone, Debug)]
pub(crate) struct Ticket<K> {
    key_set: KeySet<K>,
    request_id: u64,
    generation: u64,
}

impl<K> Ticket<K>
where
    K: Eq + Hash,
{
    /// The keys to resolve with the fetcher.
    pub(crate) fn keys(&self) -> &HashSet<K> {
        self.key_set.keys()
    }

    pub(crate) fn len(&self) -> usize {
        self.key_set.len()
    }
}

pub(crate) enum Lookup<K, V, W> {
    /// Every requested key is cached.
    Hit(HashMap<K, V>),
    /// A request for exactly the missing keys is already pending.
    Join {
        cached: HashMap<K, V>,
        missing: usize,
        waiter: W,
    },
    /// A new request was registered with `waiter`; the caller must see that
    /// the fetcher runs.
    Lead {
        cached: HashMap<K, V>,
        ticket: Ticket<K>,
        waiter: W,
    },
}

/// What a completed fetch did to the cache map.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Merge {
    pub(crate) stored: usize,
    pub(crate) rejected: usize,
    /// The results were not written because the cache was invalidated after
    /// the request was registered.
    pub(crate) stale: bool,
}

impl<K, V, W> Store<K, V, W>
where
    K: Eq + Hash + Clone,
    V: Clone,
    W: Clone,
{
    pub(crate) fn with_capacity(initial_capacity: Option<usize>) -> Self {
        Self {
            entries: HashMap::with_capacity(initial_capacity.unwrap_or_default()),
            in_flight: HashMap::new(),
            key_hasher: RandomState::new(),
            generation: 0,
            next_request_id: 0,
        }
    }

    /// Returns the cached values for `keys` if every one of them is cached.
    pub(crate) fn get_all(&self, keys: &HashSet<K>) -> Option<HashMap<K, V>> {
        keys.iter()
            .map(|k| self.entries.get(k).map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// Partitions `keys` and decides whether the caller is served from cache,
    /// joins a pending request, or leads a new one. `new_waiter` is called, and
    /// its waiter registered, only in the last case.
    pub(crate) fn lookup_or_register<F>(
        &mut self,
        keys: &HashSet<K>,
        new_waiter: F,
    ) -> Lookup<K, V, W>
    where
        F: FnOnce(&Ticket<K>) -> W,
    {
        let (cached, missing) = self.partition(keys);
        if missing.is_empty() {
            return Lookup::Hit(cached);
        }

        let key_set = KeySet::new(missing, &self.key_hasher);
        if let Some(pending) = self.in_flight.get(&key_set) {
            return Lookup::Join {
                cached,
                missing: key_set.len(),
                waiter: pending.waiter.clone(),
            };
        }

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let ticket = Ticket {
            key_set: key_set.clone(),
            request_id,
            generation: self.generation,
        };
        let waiter = new_waiter(&ticket);
        self.in_flight.insert(
            key_set,
            InFlight {
                request_id,
                waiter: waiter.clone(),
            },
        );

        Lookup::Lead {
            cached,
            ticket,
            waiter,
        }
    }

    /// Retires the request of `ticket` and, on success, stores the fetched
    /// values that pass `cacheability`. Registry removal and the merge happen
    /// together, so a concurrent `invalidate` is ordered entirely before or
    /// entirely after both.
    pub(crate) fn complete(
        &mut self,
        ticket: Ticket<K>,
        fetched: Option<&HashMap<K, V>>,
        cacheability: &dyn Cacheability<V>,
    ) -> Merge {
        self.remove_in_flight(&ticket);

        let mut merge = Merge::default();
        let Some(fetched) = fetched else {
            return merge;
        };

        if ticket.generation != self.generation {
            merge.stale = true;
            return merge;
        }

        for (key, value) in fetched {
            if cacheability.should_cache(value) {
                self.entries.insert(key.clone(), value.clone());
                merge.stored += 1;
            } else {
                merge.rejected += 1;
            }
        }
        merge
    }

    /// Retires the request of `ticket` without touching the cache map. Used
    /// when the fetcher panicked.
    pub(crate) fn abandon(&mut self, ticket: Ticket<K>) {
        self.remove_in_flight(&ticket);
    }

    /// Clears the cache map. In-flight requests keep running but will not write
    /// their results.
    pub(crate) fn invalidate(&mut self) {
        self.entries.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).cloned()
    }

    pub(crate) fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn snapshot(&self) -> HashMap<K, V> {
        self.entries.clone()
    }

    fn partition(&self, keys: &HashSet<K>) -> (HashMap<K, V>, HashSet<K>) {
        let mut cached = HashMap::with_capacity(keys.len());
        let mut missing = HashSet::new();
        for key in keys {
            match self.entries.get(key) {
                Some(value) => {
                    cached.insert(key.clone(), value.clone());
                }
                None => {
                    missing.insert(key.clone());
                }
            }
        }
        (cached, missing)
    }

    fn remove_in_flight(&mut self, ticket: &Ticket<K>) {
        // The entry may already belong to a newer request for the same keys if
        // ours was withdrawn earlier.
        if matches!(
            self.in_flight.get(&ticket.key_set),
            Some(pending) if pending.request_id == ticket.request_id
        ) {
            self.in_flight.remove(&ticket.key_set);
        }
    }
}

/// Merges the caller's cached values with the values fetched for the missing
/// keys. Fetched values win if both contain a key.
pub(crate) fn merge_results<K, V>(mut cached: HashMap<K, V>, fetched: &HashMap<K, V>) -> HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    cached.extend(fetched.iter().map(|(k, v)| (k.clone(), v.clone())));
    cached
}

#[cfg(test)]
mod tests {
    use super::{merge_results, Lookup, Merge, Store};
    use crate::common::cacheability::AlwaysCache;

    use std::collections::{HashMap, HashSet};

    type TestStore = Store<&'static str, u32, usize>;

    fn keys(ks: &[&'static str]) -> HashSet<&'static str> {
        ks.iter().copied().collect()
    }

    fn values(kvs: &[(&'static str, u32)]) -> HashMap<&'static str, u32> {
        kvs.iter().copied().collect()
    }

    #[test]
    fn lead_then_join_then_complete() {
        let mut store = TestStore::with_capacity(None);

        let Lookup::Lead { cached, ticket, .. } = store.lookup_or_register(&keys(&["a", "b"]), |_| 1) else {
            panic!("expected to lead the first request");
        };
        assert!(cached.is_empty());
        assert_eq!(ticket.keys(), &keys(&["a", "b"]));
        assert_eq!(store.in_flight_count(), 1);

        // Same key-set in another order joins the pending request.
        match store.lookup_or_register(&keys(&["b", "a"]), |_| 2) {
            Lookup::Join { waiter, missing, .. } => {
                assert_eq!(waiter, 1);
                assert_eq!(missing, 2);
            }
            _ => panic!("expected to join"),
        }

        // A different key-set leads its own request.
        assert!(matches!(
            store.lookup_or_register(&keys(&["a"]), |_| 3),
            Lookup::Lead { .. }
        ));
        assert_eq!(store.in_flight_count(), 2);

        let merge = store.complete(ticket, Some(&values(&[("a", 1), ("b", 2)])), &AlwaysCache);
        assert_eq!(
            merge,
            Merge {
                stored: 2,
                rejected: 0,
                stale: false
            }
        );
        assert_eq!(store.in_flight_count(), 1);

        match store.lookup_or_register(&keys(&["a", "b"]), |_| 4) {
            Lookup::Hit(hit) => assert_eq!(hit, values(&[("a", 1), ("b", 2)])),
            _ => panic!("expected a cache hit"),
        }
    }

    #[test]
    fn waiter_is_built_only_when_leading() {
        let mut store = TestStore::with_capacity(None);
        let mut built = 0;

        let lookup = store.lookup_or_register(&keys(&["a", "b"]), |ticket| {
            built += 1;
            ticket.len() * 10
        });
        let Lookup::Lead { waiter, .. } = lookup else {
            panic!("expected to lead");
        };
        assert_eq!(waiter, 20);

        let lookup = store.lookup_or_register(&keys(&["a", "b"]), |_| {
            built += 1;
            0
        });
        assert!(matches!(lookup, Lookup::Join { waiter: 20, .. }));
        assert_eq!(built, 1);
    }

    #[test]
    fn partial_hit_registers_only_missing_keys() {
        let mut store = TestStore::with_capacity(None);
        store.insert("a", 1);

        match store.lookup_or_register(&keys(&["a", "b", "c"]), |_| 0) {
            Lookup::Lead { cached, ticket, .. } => {
                assert_eq!(cached, values(&[("a", 1)]));
                assert_eq!(ticket.keys(), &keys(&["b", "c"]));
            }
            _ => panic!("expected to lead"),
        }
    }

    #[test]
    fn failure_leaves_entries_untouched() {
        let mut store = TestStore::with_capacity(None);
        store.insert("a", 1);
        let before = store.snapshot();

        let Lookup::Lead { ticket, .. } = store.lookup_or_register(&keys(&["b"]), |_| 0) else {
            panic!("expected to lead");
        };
        assert_eq!(store.complete(ticket, None, &AlwaysCache), Merge::default());
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.in_flight_count(), 0);
    }

    #[test]
    fn rejected_values_are_not_stored() {
        let mut store = TestStore::with_capacity(None);
        let Lookup::Lead { ticket, .. } = store.lookup_or_register(&keys(&["a", "b"]), |_| 0) else {
            panic!("expected to lead");
        };

        let even = |v: &u32| v % 2 == 0;
        let merge = store.complete(ticket, Some(&values(&[("a", 1), ("b", 2)])), &even);
        assert_eq!(merge.stored, 1);
        assert_eq!(merge.rejected, 1);
        assert!(!store.contains_key("a"));
        assert_eq!(store.get("b"), Some(2));
    }

    #[test]
    fn invalidation_wins_over_a_pending_merge() {
        let mut store = TestStore::with_capacity(None);
        let Lookup::Lead { ticket, .. } = store.lookup_or_register(&keys(&["a"]), |_| 0) else {
            panic!("expected to lead");
        };

        store.invalidate();
        let merge = store.complete(ticket, Some(&values(&[("a", 1)])), &AlwaysCache);
        assert!(merge.stale);
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.in_flight_count(), 0);

        // Requests registered after the invalidation write normally.
        let Lookup::Lead { ticket, .. } = store.lookup_or_register(&keys(&["a"]), |_| 0) else {
            panic!("expected to lead");
        };
        store.complete(ticket, Some(&values(&[("a", 1)])), &AlwaysCache);
        assert_eq!(store.get("a"), Some(1));
    }

    #[test]
    fn abandoned_ticket_does_not_remove_a_newer_request() {
        let mut store = TestStore::with_capacity(None);
        let Lookup::Lead { ticket: old, .. } = store.lookup_or_register(&keys(&["a"]), |_| 1) else {
            panic!("expected to lead");
        };
        store.abandon(old);
        assert_eq!(store.in_flight_count(), 0);

        let Lookup::Lead { ticket: new, .. } = store.lookup_or_register(&keys(&["a"]), |_| 2) else {
            panic!("expected to lead");
        };

        // Fabricate a stale ticket for the same key-set.
        let Lookup::Join { waiter, .. } = store.lookup_or_register(&keys(&["a"]), |_| 3) else {
            panic!("expected to join");
        };
        assert_eq!(waiter, 2);

        let stale = super::Ticket {
            key_set: new.key_set.clone(),
            request_id: new.request_id.wrapping_sub(1),
            generation: new.generation,
        };
        store.abandon(stale);
        assert_eq!(store.in_flight_count(), 1);

        store.abandon(new);
        assert_eq!(store.in_flight_count(), 0);
    }

    #[test]
    fn get_all_requires_every_key() {
        let mut store = TestStore::with_capacity(Some(4));
        store.insert("a", 1);
        store.insert("b", 2);

        assert_eq!(store.get_all(&keys(&["a", "b"])), Some(values(&[("a", 1), ("b", 2)])));
        assert_eq!(store.get_all(&keys(&["a", "c"])), None);
        assert_eq!(store.get_all(&HashSet::new()), Some(HashMap::new()));
    }

    #[test]
    fn merge_prefers_fetched_values() {
        let merged = merge_results(values(&[("a", 1), ("b", 2)]), &values(&[("b", 20), ("c", 3)]));
        assert_eq!(merged, values(&[("a", 1), ("b", 20), ("c", 3)]));
    }
}
