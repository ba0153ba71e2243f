use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Fixed-capacity least-recently-used cache. Not synchronized; wrap it in a
/// lock when sharing across threads.
pub struct LruCache<K, V> {
    capacity: usize,
    items: HashMap<K, (V, u64)>,
    // access tick -> key, oldest first
    access_order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, items: HashMap::with_capacity(capacity), access_order: BTreeMap::new(), tick: 0 }
    }

    /// Get a value, marking it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.tick += 1;
        let tick = self.tick;
        let (value, last) = self.items.get_mut(key)?;
        let owned = self.access_order.remove(&*last)?;
        *last = tick;
        self.access_order.insert(tick, owned);
        Some(value.clone())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.tick += 1;
        if let Some((_, last)) = self.items.get(&key) {
            self.access_order.remove(last);
        } else if self.items.len() >= self.capacity {
            if let Some((_, oldest)) = self.access_order.pop_first() {
                self.items.remove(&oldest);
            }
        }
        self.access_order.insert(self.tick, key.clone());
        self.items.insert(key, (value, self.tick));
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.items.contains_key(key)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.access_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache: LruCache<String, u32> = LruCache::new(2);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c".into(), 3);
        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_refreshes_without_growing() {
        let mut cache: LruCache<String, u32> = LruCache::new(2);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        cache.insert("a".into(), 10);
        cache.insert("c".into(), 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut cache: LruCache<String, u32> = LruCache::new(0);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get("b"), Some(2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
