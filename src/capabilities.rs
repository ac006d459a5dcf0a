//! Injected key/value capabilities.
//!
//! The dictionary has no built-in notion of how to hash or compare its
//! keys. Both are supplied as boxed closures, together with optional
//! destructors that receive ownership of every key/value the dictionary
//! releases.

use core::hash::{BuildHasher, Hash};

pub type HashFn<K> = dyn Fn(&K) -> u64;
pub type CompareFn<K> = dyn Fn(&K, &K) -> bool;
pub type FreeFn<T> = dyn Fn(T);

pub(crate) struct Capabilities<K, V> {
    pub(crate) hash: Box<HashFn<K>>,
    pub(crate) compare: Box<CompareFn<K>>,
    pub(crate) free_key: Option<Box<FreeFn<K>>>,
    pub(crate) free_value: Option<Box<FreeFn<V>>>,
}

impl<K, V> Capabilities<K, V> {
    /// Hash/Eq capabilities derived from the key's own traits.
    pub(crate) fn from_hasher<S>(hasher: S) -> Self
    where
        K: Hash + Eq,
        S: BuildHasher + 'static,
    {
        Self {
            hash: Box::new(move |k: &K| hasher.hash_one(k)),
            compare: Box::new(|a: &K, b: &K| a == b),
            free_key: None,
            free_value: None,
        }
    }

    #[inline]
    pub(crate) fn hash(&self, k: &K) -> u64 {
        (self.hash)(k)
    }

    #[inline]
    pub(crate) fn eq(&self, a: &K, b: &K) -> bool {
        (self.compare)(a, b)
    }

    pub(crate) fn release_key(&self, k: K) {
        match &self.free_key {
            Some(f) => f(k),
            None => drop(k),
        }
    }

    pub(crate) fn release_value(&self, v: V) {
        match &self.free_value {
            Some(f) => f(v),
            None => drop(v),
        }
    }
}
