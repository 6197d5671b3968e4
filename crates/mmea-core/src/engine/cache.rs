use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A construct-or-fetch table of weakly held, shared objects.
///
/// Each key maps to at most one live object. An entry keeps its object alive
/// only as long as something else holds an [`Arc`] to it; once the last strong
/// reference is dropped, the entry is dead and the next request for that key
/// constructs a fresh object.
///
/// Every key has its own build slot. Builds for different keys run in
/// parallel, while concurrent requests for the same key wait for the single
/// build in progress and then share its object.
pub struct InternTable<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

struct Entry<V> {
    value: Weak<V>,
    slot: Arc<Mutex<()>>,
}

impl<V> Entry<V> {
    fn vacant() -> Self {
        Self {
            value: Weak::new(),
            slot: Arc::new(Mutex::new(())),
        }
    }

    fn is_live(&self) -> bool {
        self.value.strong_count() > 0
    }

    /// Live, or reserved by a build that has not finished.
    fn is_retained(&self) -> bool {
        self.is_live() || Arc::strong_count(&self.slot) > 1
    }
}

/// The contents of an [`InternTable`] taken by [`InternTable::clear`].
pub struct CacheSnapshot<K, V> {
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> CacheSnapshot<K, V> {
    /// Number of entries in the snapshot whose objects are still alive.
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|e| e.is_live()).count()
    }
}

impl<K, V> fmt::Debug for CacheSnapshot<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSnapshot")
            .field("entries", &self.entries.len())
            .field("live", &self.live_len())
            .finish()
    }
}

impl<K, V> Default for InternTable<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for InternTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("InternTable")
            .field("entries", &entries.len())
            .finish()
    }
}

// Both maps only hold weak references and unit slots, so a panic mid-update
// cannot leave them in a state worth refusing.
fn recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V> InternTable<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        recover(&self.entries)
    }

    /// Number of entries whose objects are still alive.
    pub fn live_len(&self) -> usize {
        self.lock().values().filter(|e| e.is_live()).count()
    }

    /// Drops every entry whose object has been deallocated.
    pub fn purge(&self) {
        self.lock().retain(|_, e| e.is_retained());
    }

    /// Empties the table, returning its previous contents.
    ///
    /// Objects already handed out are unaffected; they simply stop being
    /// returned for their keys until the snapshot is restored.
    pub fn clear(&self) -> CacheSnapshot<K, V> {
        CacheSnapshot {
            entries: std::mem::take(&mut *self.lock()),
        }
    }

    /// Replaces the table contents with a snapshot taken by [`clear`](Self::clear).
    pub fn restore(&self, snapshot: CacheSnapshot<K, V>) {
        *self.lock() = snapshot.entries;
    }
}

impl<K: Eq + Hash + Clone, V> InternTable<K, V> {
    /// The live object registered under `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.lock().get(key).and_then(|e| e.value.upgrade())
    }

    /// Returns the live object for `key`, or builds and registers a new one.
    ///
    /// The table lock is not held while `build` runs; only the key's own slot
    /// is.
    ///
    /// # Errors
    ///
    /// Returns the error of `build` unchanged. Nothing is registered when the
    /// build fails.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(Entry::vacant);
            if let Some(existing) = entry.value.upgrade() {
                return Ok(existing);
            }
            Arc::clone(&entry.slot)
        };

        let _building = recover(&slot);
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let value = Arc::new(build()?);
        let mut entries = self.lock();
        entries.retain(|_, e| e.is_retained());
        let entry = entries.entry(key).or_insert_with(|| Entry {
            value: Weak::new(),
            slot: Arc::clone(&slot),
        });
        entry.value = Arc::downgrade(&value);
        Ok(value)
    }
}
