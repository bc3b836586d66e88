use std::{
    collections::HashSet,
    hash::{BuildHasher, Hash, Hasher},
};

/// An exact, order-independent set of keys, used to identify an in-flight
/// request in the registry.
///
/// `HashSet` does not implement `Hash`, so the set hash is precomputed as the
/// wrapping sum of the hashes of its members. Addition is commutative, so two
/// sets holding the same keys hash the same regardless of iteration order.
/// All `KeySet`s compared with each other must be built with the same
/// `BuildHasher`.
#[derive(Clone, Debug)]
pub(crate) struct KeySet<K> {
    keys: HashSet<K>,
    set_hash: u64,
}

impl<K> KeySet<K>
where
    K: Eq + Hash,
{
    pub(crate) fn new(keys: HashSet<K>, build_hasher: &impl BuildHasher) -> Self {
        let set_hash = keys.iter().fold(0u64, |acc, key| {
            let mut hasher = build_hasher.build_hasher();
            key.hash(&mut hasher);
            acc.wrapping_add(hasher.finish())
        });
        Self { keys, set_hash }
    }

    pub(crate) fn keys(&self) -> &HashSet<K> {
        &self.keys
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<K> PartialEq for KeySet<K>
where
    K: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.set_hash == other.set_hash && self.keys == other.keys
    }
}

impl<K> Eq for KeySet<K> where K: Eq + Hash {}

impl<K> Hash for KeySet<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.keys.len());
        state.write_u64(self.set_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::KeySet;

    use std::collections::{hash_map::RandomState, HashMap, HashSet};

    fn set(keys: &[&'static str]) -> HashSet<&'static str> {
        keys.iter().copied().collect()
    }

    #[test]
    fn order_independent() {
        let hasher = RandomState::new();

        let a: HashSet<_> = ["p1", "p2", "p3"].into_iter().collect();
        let b: HashSet<_> = ["p3", "p1", "p2"].into_iter().collect();

        assert_eq!(KeySet::new(a, &hasher), KeySet::new(b, &hasher));
    }

    #[test]
    fn exact_set_semantics() {
        let hasher = RandomState::new();
        let full = KeySet::new(set(&["p1", "p2"]), &hasher);

        // A subset or a superset is a different request.
        assert_ne!(full, KeySet::new(set(&["p1"]), &hasher));
        assert_ne!(full, KeySet::new(set(&["p1", "p2", "p3"]), &hasher));
        assert_ne!(full, KeySet::new(set(&["p1", "p3"]), &hasher));
    }

    #[test]
    fn usable_as_map_key() {
        let hasher = RandomState::new();
        let mut registry = HashMap::new();

        registry.insert(KeySet::new(set(&["a", "b"]), &hasher), 1);
        registry.insert(KeySet::new(set(&["c"]), &hasher), 2);

        assert_eq!(registry.get(&KeySet::new(set(&["b", "a"]), &hasher)), Some(&1));
        assert_eq!(registry.get(&KeySet::new(set(&["c"]), &hasher)), Some(&2));
        assert_eq!(registry.get(&KeySet::new(set(&["a"]), &hasher)), None);
    }

    #[test]
    fn empty_set() {
        let hasher = RandomState::new();
        let empty = KeySet::<u32>::new(HashSet::new(), &hasher);
        assert_eq!(empty.len(), 0);
        assert!(empty.keys().is_empty());
    }
}
