use crate::error::Result;
use crate::mapping_set::MappingSet;
use crate::namespace::NamespacePair;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    store: String,
    pair: NamespacePair,
    generation: u64,
}

/// Memoized mapping sets for one build invocation.
///
/// Entries are keyed by the source store's fingerprint, the namespace pair and the cache
/// generation. `invalidate` starts a new generation, so sets resolved before a failure are
/// never handed out again.
#[derive(Debug, Default)]
pub struct MappingCache {
    generation: AtomicU64,
    entries: Mutex<HashMap<CacheKey, Arc<MappingSet>>>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached projection of `store` from `from` to `to`
    pub fn resolve(&self, store: &Store, from: &str, to: &str) -> Result<Arc<MappingSet>> {
        self.get_or_insert_with(store.fingerprint(), NamespacePair::new(from, to), || {
            log::info!(":loading {from} -> {to} mappings");
            MappingSet::from_store(store, from, to)
        })
    }

    /// Cached set for `pair` of the store fingerprinted `store`, computing it with `resolve`
    /// on a miss
    pub fn get_or_insert_with<F>(
        &self,
        store: &str,
        pair: NamespacePair,
        resolve: F,
    ) -> Result<Arc<MappingSet>>
    where
        F: FnOnce() -> Result<MappingSet>,
    {
        let key = CacheKey {
            store: store.to_string(),
            pair,
            generation: self.generation(),
        };
        if let Some(hit) = self.lock().get(&key) {
            return Ok(Arc::clone(hit));
        }

        // Resolve outside the lock; a racing resolver for the same key just loses the insert.
        let set = Arc::new(resolve()?);
        let mut entries = self.lock();
        let entry = entries.entry(key).or_insert(set);
        Ok(Arc::clone(entry))
    }

    /// Drop every cached set and start a new generation
    pub fn invalidate(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.lock().clear();
        log::debug!("Mapping cache invalidated, generation {next}");
        next
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<MappingSet>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const DOC: &str = "v1\tintermediary\tnamed\nCLASS\tclass_1\tBlock\n";

    #[test]
    fn resolves_each_pair_once_per_generation() {
        let store = Store::load(DOC).unwrap();
        let cache = MappingCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = || {
            calls.fetch_add(1, Ordering::SeqCst);
            MappingSet::from_store(&store, "intermediary", "named")
        };

        let pair = NamespacePair::new("intermediary", "named");
        let id = store.fingerprint();
        let first = cache.get_or_insert_with(id, pair.clone(), resolve).unwrap();
        let second = cache.get_or_insert_with(id, pair.clone(), resolve).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.invalidate(), 1);
        assert!(cache.is_empty());
        let third = cache.get_or_insert_with(id, pair, resolve).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pairs_are_directional() {
        let store = Store::load(DOC).unwrap();
        let cache = MappingCache::new();
        let forward = cache.resolve(&store, "intermediary", "named").unwrap();
        let backward = cache.resolve(&store, "named", "intermediary").unwrap();
        assert_eq!(forward.class_name("class_1"), Some("Block"));
        assert_eq!(backward.class_name("Block"), Some("class_1"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn stores_with_the_same_pair_do_not_share_entries() {
        let old = Store::load("v1\tofficial\tnamed\nCLASS\ta\tOld\n").unwrap();
        let new = Store::load("v1\tofficial\tnamed\nCLASS\ta\tNew\n").unwrap();
        let cache = MappingCache::new();

        let first = cache.resolve(&old, "official", "named").unwrap();
        let second = cache.resolve(&new, "official", "named").unwrap();
        assert_eq!(first.class_name("a"), Some("Old"));
        assert_eq!(second.class_name("a"), Some("New"));
        assert_eq!(cache.len(), 2);

        let again = cache.resolve(&old, "official", "named").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn failed_resolution_is_not_cached() {
        let store = Store::load(DOC).unwrap();
        let cache = MappingCache::new();
        assert!(cache.resolve(&store, "official", "named").is_err());
        assert!(cache.is_empty());
    }
}
