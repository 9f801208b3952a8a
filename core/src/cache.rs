// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::{Debug, Formatter};
use std::hash::Hash;

/// Default number of entries kept by an [`LruCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// LruCache is a bounded, thread-safe least-recently-used cache.
///
/// Entries live in an arena addressed by index; the hash map stores arena
/// indices and the recency list links entries through `prev`/`next`
/// indices. A single mutex guards map and list, and is only held for O(1)
/// relinking: value suppliers always run with the lock released.
///
/// Two callers missing on the same key at the same time may both run the
/// supplier. The first value inserted wins and is returned to both.
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

struct Entry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    index: HashMap<K, usize>,
    entries: Vec<Entry<K, V>>,
    /// Most recently used.
    head: Option<usize>,
    /// Least recently used.
    tail: Option<usize>,
}

impl<K, V> Default for LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<K, V> Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().entries.len())
            .finish()
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                index: HashMap::with_capacity(capacity),
                entries: Vec::with_capacity(capacity),
                head: None,
                tail: None,
            }),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the value of `key` and mark it as most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        let idx = *inner.index.get(key)?;
        inner.touch(idx);
        Some(inner.entries[idx].value.clone())
    }

    /// Get the value of `key` without changing its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.lock();
        let idx = *inner.index.get(key)?;
        Some(inner.entries[idx].value.clone())
    }

    /// Returns true if `key` is cached. Recency is not changed.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().index.contains_key(key)
    }

    /// Get the value of `key`, computing it with `supplier` on a miss.
    ///
    /// Inserting into a full cache evicts the least recently used entry.
    ///
    /// The supplier runs without the lock, so concurrent misses on the same
    /// key may each run it. Only the first result is inserted, and every
    /// caller gets that value back; later results are dropped.
    pub fn get_or_insert_with<F>(&self, key: K, supplier: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        match self.try_get_or_insert_with(key, |k| Ok::<V, Infallible>(supplier(k))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Fallible version of [`LruCache::get_or_insert_with`].
    ///
    /// Nothing is inserted when `supplier` fails.
    pub fn try_get_or_insert_with<E, F>(&self, key: K, supplier: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }

        let value = supplier(&key)?;

        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.index.get(&key) {
            inner.touch(idx);
            return Ok(inner.entries[idx].value.clone());
        }
        inner.insert(key, value.clone(), self.capacity);
        Ok(value)
    }

    /// Remove `key` from the cache, returning its value.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        let idx = inner.index.remove(key)?;
        Some(inner.remove_at(idx))
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.index.clear();
        inner.entries.clear();
        inner.head = None;
        inner.tail = None;
    }
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq + Clone,
{
    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.entries[idx].prev, self.entries[idx].next);
        match prev {
            Some(p) => self.entries[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.entries[n].prev = prev,
            None => self.tail = prev,
        }
        self.entries[idx].prev = None;
        self.entries[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.entries[idx].prev = None;
        self.entries[idx].next = self.head;
        if let Some(h) = self.head {
            self.entries[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.detach(idx);
            self.push_front(idx);
        }
    }

    /// Unlink the entry at `idx` whose key is already gone from the index.
    ///
    /// The arena stays dense: the last entry moves into the freed slot.
    fn remove_at(&mut self, idx: usize) -> V {
        self.detach(idx);

        let last = self.entries.len() - 1;
        if idx != last {
            let (prev, next) = (self.entries[last].prev, self.entries[last].next);
            match prev {
                Some(p) => self.entries[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.entries[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.index.get_mut(&self.entries[last].key) {
                *slot = idx;
            }
        }

        self.entries.swap_remove(idx).value
    }

    /// Insert a key known to be absent.
    ///
    /// When the arena is full the least recently used slot is reused, which
    /// leaves the cache in the same state as inserting then evicting.
    fn insert(&mut self, key: K, value: V, capacity: usize) {
        let entry = Entry {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };

        let idx = match self.tail {
            Some(lru) if self.entries.len() >= capacity => {
                self.detach(lru);
                let evicted = std::mem::replace(&mut self.entries[lru], entry);
                self.index.remove(&evicted.key);
                lru
            }
            _ => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };

        self.index.insert(key, idx);
        self.push_front(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_supplier_runs_only_on_miss() {
        let cache = LruCache::new(2);
        let calls = AtomicUsize::new(0);
        let supplier = |k: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            k.len()
        };

        assert_eq!(cache.get_or_insert_with("abc".to_string(), supplier), 3);
        assert_eq!(cache.get_or_insert_with("abc".to_string(), supplier), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_follows_access_order() {
        let cache = LruCache::new(3);
        for k in ["a", "b", "c"] {
            cache.get_or_insert_with(k, |k| k.to_uppercase());
        }

        // "a" becomes the most recently used, "b" is now the oldest.
        assert_eq!(cache.get("a"), Some("A".to_string()));
        cache.get_or_insert_with("d", |k| k.to_uppercase());

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("c"));
        assert!(cache.contains_key("d"));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let cache = LruCache::new(2);
        cache.get_or_insert_with(1, |_| "one");
        cache.get_or_insert_with(2, |_| "two");

        assert_eq!(cache.peek(&1), Some("one"));
        cache.get_or_insert_with(3, |_| "three");

        assert_eq!(cache.peek(&1), None);
        assert_eq!(cache.peek(&2), Some("two"));
    }

    #[test]
    fn test_failed_supplier_inserts_nothing() {
        let cache: LruCache<&str, u32> = LruCache::new(2);
        let res = cache.try_get_or_insert_with("bad", |_| Err("boom"));
        assert_eq!(res, Err("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_keeps_order() {
        let cache = LruCache::new(3);
        for k in [1, 2, 3] {
            cache.get_or_insert_with(k, |v| *v * 10);
        }

        // Removing the oldest entry moves the newest one inside the arena.
        assert_eq!(cache.remove(&1), Some(10));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.len(), 2);

        cache.get_or_insert_with(4, |v| *v * 10);
        cache.get_or_insert_with(5, |v| *v * 10);
        assert!(!cache.contains_key(&2));
        assert_eq!(cache.peek(&3), Some(30));
        assert_eq!(cache.peek(&4), Some(40));
        assert_eq!(cache.peek(&5), Some(50));
    }

    #[test]
    fn test_zero_capacity_keeps_one_entry() {
        let cache = LruCache::new(0);
        cache.get_or_insert_with(1, |v| *v);
        cache.get_or_insert_with(2, |v| *v);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek(&2), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = LruCache::new(4);
        cache.get_or_insert_with(1, |v| *v);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_insert_with(1, |v| v + 1), 2);
    }

    #[test]
    fn test_supplier_runs_without_lock() {
        let cache = Arc::new(LruCache::new(8));
        let inner = cache.clone();

        // Reading the same cache from inside the supplier would deadlock if
        // the lock were held across the call.
        let v = cache.get_or_insert_with("outer", move |_| {
            inner.get_or_insert_with("inner", |_| 1) + 1
        });

        assert_eq!(v, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_racing_misses_share_first_value() {
        let cache = Arc::new(LruCache::new(4));
        let barrier = Arc::new(Barrier::new(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2u32)
            .map(|t| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    cache.get_or_insert_with("key", move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Both threads are inside the supplier before either inserts.
                        barrier.wait();
                        t
                    })
                })
            })
            .collect();
        let values: Vec<u32> = handles
            .into_iter()
            .map(|h| h.join().expect("thread must not panic"))
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(values[0], values[1]);
        assert_eq!(cache.peek("key"), Some(values[0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_access_never_exceeds_capacity() {
        let cache = Arc::new(LruCache::new(16));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        let key = (i * 7 + t) % 40;
                        assert_eq!(cache.get_or_insert_with(key, |k| k * 2), key * 2);
                        assert!(cache.len() <= 16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread must not panic");
        }

        assert_eq!(cache.len(), 16);
    }

    /// Inserting `capacity + k` distinct keys evicts exactly the `k` least
    /// recently used ones.
    #[quickcheck]
    fn prop_evicts_least_recently_used(capacity: u8, extra: u8, touched: Vec<u8>) -> TestResult {
        let capacity = capacity as usize % 32 + 1;
        let extra = extra as usize % 32 + 1;

        let cache = LruCache::new(capacity);
        // Access order, oldest first.
        let mut order: Vec<usize> = Vec::new();
        for k in 0..capacity {
            cache.get_or_insert_with(k, |k| *k);
            order.push(k);
        }
        for t in touched {
            let k = t as usize % capacity;
            cache.get(&k);
            order.retain(|v| *v != k);
            order.push(k);
        }
        for k in capacity..capacity + extra {
            cache.get_or_insert_with(k, |k| *k);
            order.push(k);
        }

        let evicted: HashSet<usize> = order.iter().take(extra).copied().collect();
        let kept: HashSet<usize> = order.iter().skip(extra).copied().collect();

        TestResult::from_bool(
            cache.len() == capacity
                && evicted.iter().all(|k| !cache.contains_key(k))
                && kept.iter().all(|k| cache.contains_key(k)),
        )
    }
}
