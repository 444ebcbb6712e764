use std::{
    collections::HashMap,
    hash::Hash,
    ops::{Deref, DerefMut},
};

use parking_lot::RwLockReadGuard;

/// A pre-sized `HashMap` wrapper using `ahash` for speed, matching the
/// teacher's session-table convention.
pub struct Table<K, V>(HashMap<K, V, ahash::RandomState>);

impl<K, V> Table<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(HashMap::with_capacity_and_hasher(
            capacity,
            ahash::RandomState::new(),
        ))
    }
}

impl<K: Eq + Hash, V> Deref for Table<K, V> {
    type Target = HashMap<K, V, ahash::RandomState>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Eq + Hash, V> DerefMut for Table<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A read-guarded view keyed by a borrowed key, so callers can deref
/// straight through to the peer record without holding onto the table type.
pub struct ReadLock<'a, 'b, K, R> {
    pub key: &'a K,
    pub lock: RwLockReadGuard<'b, R>,
}

impl<'a, 'b, K: Eq + Hash, V> Deref for ReadLock<'a, 'b, K, Table<K, V>> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        self.lock
            .get(self.key)
            .expect("ReadLock is only constructed for a key known to be present")
    }
}
