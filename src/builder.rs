//! DictBuilder: capability injection and tuning for `Dict`.

use crate::alloc::{Allocator, Global};
use crate::capabilities::{Capabilities, CompareFn, FreeFn, HashFn};
use crate::dict::Dict;
use crate::error::DictError;
use crate::policy::LoadFactors;

/// Collects the capabilities a `Dict` needs before first use.
///
/// `hash` and `compare` are required; `build` refuses to produce a
/// dictionary without them, so a missing capability is caught here
/// rather than in the middle of an insert.
pub struct DictBuilder<K, V, A = Global> {
    hash: Option<Box<HashFn<K>>>,
    compare: Option<Box<CompareFn<K>>>,
    free_key: Option<Box<FreeFn<K>>>,
    free_value: Option<Box<FreeFn<V>>>,
    load: LoadFactors,
    alloc: A,
}

impl<K, V> DictBuilder<K, V> {
    /// Builder with no capabilities, default load factors and `Global`.
    pub fn new() -> Self {
        Self {
            hash: None,
            compare: None,
            free_key: None,
            free_value: None,
            load: LoadFactors::default(),
            alloc: Global,
        }
    }
}

impl<K, V> Default for DictBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> DictBuilder<K, V, A> {
    /// Key hash. Required.
    pub fn hash<F>(mut self, hash: F) -> Self
    where
        F: Fn(&K) -> u64 + 'static,
    {
        self.hash = Some(Box::new(hash));
        self
    }

    /// Key equality. Must agree with `hash`: equal keys hash equally.
    pub fn compare<F>(mut self, compare: F) -> Self
    where
        F: Fn(&K, &K) -> bool + 'static,
    {
        self.compare = Some(Box::new(compare));
        self
    }

    /// Receives every key the dictionary releases.
    pub fn free_key<F>(mut self, free_key: F) -> Self
    where
        F: Fn(K) + 'static,
    {
        self.free_key = Some(Box::new(free_key));
        self
    }

    /// Receives every value the dictionary releases.
    pub fn free_value<F>(mut self, free_value: F) -> Self
    where
        F: Fn(V) + 'static,
    {
        self.free_value = Some(Box::new(free_value));
        self
    }

    /// Override the default 1.0 / 0.1 expand/shrink band.
    pub fn load_factors(mut self, load: LoadFactors) -> Self {
        self.load = load;
        self
    }

    /// Account tables and entries against `alloc` instead.
    pub fn allocator<B: Allocator>(self, alloc: B) -> DictBuilder<K, V, B> {
        DictBuilder {
            hash: self.hash,
            compare: self.compare,
            free_key: self.free_key,
            free_value: self.free_value,
            load: self.load,
            alloc,
        }
    }

    /// Finish configuration. Fails when `hash` or `compare` is missing or
    /// the load factors do not satisfy `0 <= shrink < expand`.
    pub fn build(self) -> Result<Dict<K, V, A>, DictError> {
        let hash = self.hash.ok_or(DictError::MissingCapability("hash"))?;
        let compare = self
            .compare
            .ok_or(DictError::MissingCapability("compare"))?;
        if !self.load.is_valid() {
            return Err(DictError::InvalidLoadFactors {
                expand: self.load.expand,
                shrink: self.load.shrink,
            });
        }
        let caps = Capabilities {
            hash,
            compare,
            free_key: self.free_key,
            free_value: self.free_value,
        };
        Ok(Dict::from_parts(caps, self.load, self.alloc))
    }
}
