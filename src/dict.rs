//! Dict: public dictionary API over `RawDict`.
//!
//! Every public entry point holds the debug reentrancy guard while the
//! raw layer runs (the window in which `hash`/`compare` execute), and
//! releases keys/values through the configured destructors only after
//! the guard is gone and the tables are consistent again.

use crate::alloc::{Allocator, Global};
use crate::builder::DictBuilder;
use crate::capabilities::{Capabilities, CompareFn, FreeFn, HashFn};
use crate::error::DictError;
use crate::iter::{Iter, IterMut};
use crate::policy::LoadFactors;
use crate::raw::{RawDict, RehashState};
use crate::reentrancy::OpGuard;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// A chained hash dictionary with incremental rehashing.
///
/// Growing or shrinking never rebuilds the bucket array in one go: each
/// mutating call (`set`, `replace`, `remove`, `remove_entry`, `del`)
/// migrates at most one bucket of the old table into the new one.
/// Lookups and iteration never advance a rehash.
pub struct Dict<K, V, A: Allocator = Global> {
    pub(crate) raw: RawDict<K, V, A>,
    guard: OpGuard,
}

impl<K, V> Dict<K, V>
where
    K: Hash + Eq,
{
    /// Empty dictionary hashing with `K: Hash` and comparing with `K: Eq`.
    /// Allocates nothing until the first insert.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Like `new`, but hashing keys with `hasher`.
    pub fn with_hasher<S>(hasher: S) -> Self
    where
        S: BuildHasher + 'static,
    {
        Self::from_parts(
            Capabilities::from_hasher(hasher),
            LoadFactors::default(),
            Global,
        )
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> Dict<K, V, A>
where
    K: Hash + Eq,
{
    /// Dictionary keyed by `K`'s own `Hash`/`Eq`, accounting through `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self::from_parts(
            Capabilities::from_hasher(DefaultHashBuilder::default()),
            LoadFactors::default(),
            alloc,
        )
    }
}

impl<K, V> Dict<K, V> {
    /// Start configuring a dictionary with injected capabilities.
    pub fn builder() -> DictBuilder<K, V> {
        DictBuilder::new()
    }
}

impl<K, V, A: Allocator> Dict<K, V, A> {
    /// Start configuring a dictionary that accounts through `alloc`.
    pub fn builder_in(alloc: A) -> DictBuilder<K, V, A> {
        DictBuilder::new().allocator(alloc)
    }

    pub(crate) fn from_parts(caps: Capabilities<K, V>, load: LoadFactors, alloc: A) -> Self {
        Self {
            raw: RawDict::new(caps, load, alloc),
            guard: OpGuard::new(),
        }
    }

    /// Number of live entries across both tables.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `value` under `key`. An existing value is replaced in place
    /// and released through `free_value`; the redundant incoming key is
    /// released through `free_key`.
    pub fn set(&mut self, key: K, value: V) -> Result<(), DictError> {
        let displaced = {
            let _g = self.guard.enter("set");
            self.raw.upsert(key, value)?
        };
        if let Some((k, v)) = displaced {
            self.raw.caps.release_key(k);
            self.raw.caps.release_value(v);
        }
        Ok(())
    }

    /// Like `set`, but hands a displaced value back instead of releasing it.
    pub fn replace(&mut self, key: K, value: V) -> Result<Option<V>, DictError> {
        let displaced = {
            let _g = self.guard.enter("replace");
            self.raw.upsert(key, value)?
        };
        Ok(displaced.map(|(k, v)| {
            self.raw.caps.release_key(k);
            v
        }))
    }

    /// Value stored under `key`. Never advances a pending rehash.
    pub fn get(&self, key: &K) -> Option<&V> {
        let _g = self.guard.enter("get");
        let k = self.raw.find(key)?;
        Some(&self.raw.entries[k].value)
    }

    /// Stored key and value for `key`.
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        let _g = self.guard.enter("get_key_value");
        let k = self.raw.find(key)?;
        let e = &self.raw.entries[k];
        Some((&e.key, &e.value))
    }

    /// Mutable access to the value under `key`. Not a mutating call for
    /// rehash purposes.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let k = {
            let _g = self.guard.enter("get_mut");
            self.raw.find(key)?
        };
        Some(&mut self.raw.entries[k].value)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        let _g = self.guard.enter("contains");
        self.raw.find(key).is_some()
    }

    /// Remove `key`, releasing the stored key through `free_key` and
    /// returning the value to the caller.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (k, v) = self.remove_entry_with("remove", key)?;
        self.raw.caps.release_key(k);
        Some(v)
    }

    /// Remove `key` and hand back both the stored key and the value; no
    /// destructor runs.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        self.remove_entry_with("remove_entry", key)
    }

    /// Remove `key`, releasing both key and value through the destructors.
    /// Returns whether the key was present.
    pub fn del(&mut self, key: &K) -> bool {
        match self.remove_entry_with("del", key) {
            Some((k, v)) => {
                self.raw.caps.release_key(k);
                self.raw.caps.release_value(v);
                true
            }
            None => false,
        }
    }

    fn remove_entry_with(&mut self, op: &'static str, key: &K) -> Option<(K, V)> {
        let _g = self.guard.enter(op);
        self.raw.remove(key)
    }

    /// Release every entry and both tables, returning to the freshly
    /// constructed state.
    pub fn clear(&mut self) {
        let entries = {
            let _g = self.guard.enter("clear");
            self.raw.take_all()
        };
        for (_, e) in entries {
            self.raw.caps.release_key(e.key);
            self.raw.caps.release_value(e.value);
        }
    }

    /// Iterate over all pairs. Order is unspecified. The borrow on `self`
    /// rules out mutation while the iterator is live.
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter::new(&self.raw)
    }

    /// Iterate over all pairs with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.raw.entries)
    }

    /// Current migration progress.
    pub fn rehash_state(&self) -> RehashState {
        self.raw.rehash
    }

    pub fn is_rehashing(&self) -> bool {
        matches!(self.raw.rehash, RehashState::Rehashing { .. })
    }

    /// Bucket counts of the active and the rehash-target table; 0 when
    /// unallocated.
    pub fn table_sizes(&self) -> [usize; 2] {
        [self.raw.tables[0].size(), self.raw.tables[1].size()]
    }

    /// Perform one migration step of a pending rehash without any other
    /// mutation. Returns whether a rehash is still pending afterwards.
    pub fn rehash_step(&mut self) -> bool {
        let _g = self.guard.enter("rehash_step");
        self.raw.migrate_step();
        matches!(self.raw.rehash, RehashState::Rehashing { .. })
    }

    /// The load-factor band this dictionary was built with.
    pub fn load_factors(&self) -> LoadFactors {
        self.raw.load
    }

    /// The allocator every table and entry is accounted against.
    pub fn allocator(&self) -> &A {
        &self.raw.alloc
    }

    /// The injected hash capability.
    pub fn hash_fn(&self) -> &HashFn<K> {
        &*self.raw.caps.hash
    }

    /// The injected key-equality capability.
    pub fn compare_fn(&self) -> &CompareFn<K> {
        &*self.raw.caps.compare
    }

    /// Key destructor, if one is configured.
    pub fn free_key_fn(&self) -> Option<&FreeFn<K>> {
        self.raw.caps.free_key.as_deref()
    }

    pub fn free_value_fn(&self) -> Option<&FreeFn<V>> {
        self.raw.caps.free_value.as_deref()
    }

    /// Replace the hash capability. Refused while entries are live, since
    /// they are chained by their old hashes.
    pub fn set_hash<F>(&mut self, hash: F) -> Result<(), DictError>
    where
        F: Fn(&K) -> u64 + 'static,
    {
        if !self.is_empty() {
            return Err(DictError::NotEmpty("hash"));
        }
        self.raw.caps.hash = Box::new(hash);
        Ok(())
    }

    /// Replace the key-equality capability. Refused while entries are live.
    pub fn set_compare<F>(&mut self, compare: F) -> Result<(), DictError>
    where
        F: Fn(&K, &K) -> bool + 'static,
    {
        if !self.is_empty() {
            return Err(DictError::NotEmpty("compare"));
        }
        self.raw.caps.compare = Box::new(compare);
        Ok(())
    }

    /// Install or clear (`None`) the key destructor. Allowed at any time.
    pub fn set_free_key(&mut self, free_key: Option<Box<FreeFn<K>>>) {
        self.raw.caps.free_key = free_key;
    }

    pub fn set_free_value(&mut self, free_value: Option<Box<FreeFn<V>>>) {
        self.raw.caps.free_value = free_value;
    }
}

impl<K, V, A: Allocator> Drop for Dict<K, V, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'a, K, V, A: Allocator> IntoIterator for &'a Dict<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, A: Allocator> fmt::Debug for Dict<K, V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MIN_TABLE_SIZE;
    use std::collections::BTreeSet;

    /// Identity hash: key `k` lands in bucket `k & (size - 1)`.
    fn ident() -> Dict<u64, u64> {
        Dict::builder()
            .hash(|k: &u64| *k)
            .compare(|a, b| a == b)
            .build()
            .unwrap()
    }

    /// Invariant: a fresh dictionary owns no tables; the first insert
    /// allocates `tables[0]` at the minimum size.
    #[test]
    fn lazy_first_allocation() {
        let mut d = ident();
        assert_eq!(d.table_sizes(), [0, 0]);
        assert_eq!(d.get(&1), None);
        assert!(!d.contains(&1));
        d.set(1, 10).unwrap();
        assert_eq!(d.table_sizes(), [MIN_TABLE_SIZE, 0]);
        assert_eq!(d.rehash_state(), RehashState::Idle);
        d.raw.assert_invariants();
    }

    /// Scenario: inserting 0..20 crosses the expand threshold on the 9th
    /// insert; the rehash finishes within 8 further calls and the final
    /// table holds 32 buckets.
    #[test]
    fn expand_is_amortized_over_following_calls() {
        let mut d = ident();
        for k in 0..8 {
            d.set(k, k * 10).unwrap();
            assert!(!d.is_rehashing());
        }
        d.set(8, 80).unwrap();
        assert_eq!(d.rehash_state(), RehashState::Rehashing { cursor: 1 });
        assert_eq!(d.table_sizes(), [8, 32]);
        d.raw.assert_invariants();

        let mut further = 0;
        for k in 9..20 {
            d.set(k, k * 10).unwrap();
            d.raw.assert_invariants();
            if d.is_rehashing() {
                further += 1;
            }
        }
        assert!(further < 8, "rehash took {} further calls", further + 1);
        assert_eq!(d.len(), 20);
        assert_eq!(d.table_sizes(), [32, 0]);
        for k in 0..20 {
            assert_eq!(d.get(&k), Some(&(k * 10)));
        }
    }

    /// Scenario: removing down to one key shrinks back to the floor once
    /// the load factor drops below 0.1; the survivor stays reachable.
    #[test]
    fn shrink_after_mass_removal() {
        let mut d = ident();
        for k in 0..20 {
            d.set(k, k).unwrap();
        }
        assert_eq!(d.table_sizes(), [32, 0]);

        let mut saw_shrink = false;
        for k in 0..19 {
            assert_eq!(d.remove(&k), Some(k));
            saw_shrink |= d.table_sizes()[1] == 8;
            d.raw.assert_invariants();
        }
        assert!(saw_shrink);
        while d.rehash_step() {}
        assert_eq!(d.table_sizes(), [8, 0]);
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&19), Some(&19));
    }

    /// Scenario: mid-rehash, an unmigrated key is served from `tables[0]`
    /// and the same key is served from `tables[1]` once its bucket drains.
    #[test]
    fn lookups_follow_the_cursor() {
        let mut d: Dict<u64, &str> = Dict::builder()
            .hash(|k: &u64| *k)
            .compare(|a, b| a == b)
            .load_factors(LoadFactors {
                expand: 0.25,
                shrink: 0.0,
            })
            .build()
            .unwrap();
        d.set(5, "a").unwrap();
        d.set(6, "b").unwrap();
        assert!(!d.is_rehashing());
        d.set(1, "c").unwrap();
        assert_eq!(d.rehash_state(), RehashState::Rehashing { cursor: 2 });
        assert_eq!(d.table_sizes(), [8, 16]);

        assert_eq!(d.raw.table_of(&1), Some(1));
        assert_eq!(d.raw.table_of(&5), Some(0));
        assert_eq!(d.get(&5), Some(&"a"));

        assert!(d.rehash_step());
        assert_eq!(d.rehash_state(), RehashState::Rehashing { cursor: 6 });
        assert_eq!(d.raw.table_of(&5), Some(1));
        assert_eq!(d.get(&5), Some(&"a"));
        assert_eq!(d.raw.table_of(&6), Some(0));

        assert!(!d.rehash_step());
        assert_eq!(d.table_sizes(), [16, 0]);
        for (k, v) in [(5, "a"), (6, "b"), (1, "c")] {
            assert_eq!(d.get(&k), Some(&v));
        }
    }

    /// Invariant: lookups never advance a pending rehash.
    #[test]
    fn reads_do_not_advance_rehash() {
        let mut d = ident();
        for k in 0..9 {
            d.set(k, k).unwrap();
        }
        let before = d.rehash_state();
        for k in 0..9 {
            let _ = d.get(&k);
            let _ = d.contains(&k);
            let _ = d.get_key_value(&k);
        }
        assert_eq!(d.iter().count(), 9);
        assert_eq!(d.rehash_state(), before);
    }

    /// Invariant: overwriting a key that still sits in an undrained bucket
    /// of `tables[0]` updates it in place instead of adding a duplicate to
    /// `tables[1]`.
    #[test]
    fn overwrite_during_rehash_updates_in_place() {
        let mut d = ident();
        for k in 0..9 {
            d.set(k, k).unwrap();
        }
        assert_eq!(d.rehash_state(), RehashState::Rehashing { cursor: 1 });
        assert_eq!(d.raw.table_of(&7), Some(0));
        assert_eq!(d.replace(7, 700).unwrap(), Some(7));
        assert_eq!(d.len(), 9);
        assert_eq!(d.get(&7), Some(&700));
        d.raw.assert_invariants();
        while d.rehash_step() {}
        assert_eq!(d.len(), 9);
        assert_eq!(d.iter().filter(|(k, _)| **k == 7).count(), 1);
    }

    /// Invariant: new keys inserted during a rehash land in `tables[1]`.
    #[test]
    fn inserts_during_rehash_target_new_table() {
        let mut d = ident();
        for k in 0..9 {
            d.set(k, k).unwrap();
        }
        // Bucket 7 of the old table has not been drained yet.
        d.set(15, 15).unwrap();
        assert!(d.is_rehashing());
        assert_eq!(d.raw.tables[1].buckets[15].map(|k| d.raw.entries[k].key), Some(15));
        assert_eq!(d.get(&15), Some(&15));
        d.raw.assert_invariants();
    }

    /// Invariant: a key that went to `tables[1]` while its old bucket is
    /// still undrained is updated in place, never inserted a second time.
    #[test]
    fn repeated_set_mid_rehash_keeps_one_copy() {
        let mut d = ident();
        for k in 0..9 {
            d.set(k, k).unwrap();
        }
        d.set(15, 1).unwrap();
        d.set(15, 2).unwrap();
        assert_eq!(d.raw.table_of(&15), Some(1));
        assert_eq!(d.raw.table_of(&7), Some(0));
        assert_eq!(d.len(), 10);
        d.raw.assert_invariants();

        assert!(d.del(&15));
        assert!(!d.contains(&15));
        d.set(15, 3).unwrap();
        while d.rehash_step() {}
        assert_eq!(d.len(), 10);
        assert_eq!(d.iter().filter(|(k, _)| **k == 15).count(), 1);
        assert_eq!(d.get(&15), Some(&3));
        d.raw.assert_invariants();
    }

    /// Scenario: iterating five keys with no rehash pending yields each once.
    #[test]
    fn iterate_small_dict() {
        let mut d = ident();
        for k in 1..=5 {
            d.set(k, k * 2).unwrap();
        }
        let mut it = d.iter();
        assert_eq!(it.len(), 5);
        let mut seen = BTreeSet::new();
        while it.has_next() {
            let (k, v) = it.next().unwrap();
            assert_eq!(*v, k * 2);
            assert!(seen.insert(*k));
        }
        assert_eq!(it.next(), None);
        assert_eq!(seen, (1..=5).collect::<BTreeSet<_>>());
    }

    /// Invariant: iteration mid-rehash visits both tables, each key once.
    #[test]
    fn iterate_during_rehash_covers_both_tables() {
        let mut d = ident();
        for k in 0..12 {
            d.set(k, k).unwrap();
        }
        assert!(d.is_rehashing());
        assert!(d.raw.tables[0].used > 0 && d.raw.tables[1].used > 0);
        let keys: Vec<u64> = d.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), 12);
        let set: BTreeSet<u64> = keys.into_iter().collect();
        assert_eq!(set, (0..12).collect::<BTreeSet<_>>());
    }

    /// Scenario: removing an absent key is a harmless no-op in every state.
    #[test]
    fn remove_missing_key() {
        let mut d = ident();
        assert_eq!(d.remove(&42), None);
        assert!(!d.del(&42));
        assert_eq!(d.len(), 0);

        for k in 0..9 {
            d.set(k, k).unwrap();
        }
        assert!(d.is_rehashing());
        let state = d.rehash_state();
        assert_eq!(d.remove(&42), None);
        assert_eq!(d.len(), 9);
        // The call still counts as a mutating call and advances the rehash.
        assert_ne!(d.rehash_state(), state);
        d.raw.assert_invariants();
    }

    /// Invariant: removal unlinks from the middle and tail of a chain.
    #[test]
    fn remove_within_collision_chain() {
        let mut d = ident();
        // 0, 8 and 16 share bucket 0 until the first resize.
        for k in [0, 8, 16] {
            d.set(k, k).unwrap();
        }
        assert_eq!(d.remove(&8), Some(8));
        assert_eq!(d.remove(&0), Some(0));
        assert_eq!(d.get(&16), Some(&16));
        assert_eq!(d.len(), 1);
        d.raw.assert_invariants();
    }

    /// Invariant: `clear` returns to the just-constructed state and the
    /// dictionary is usable again afterwards.
    #[test]
    fn clear_resets_everything() {
        let mut d = ident();
        for k in 0..12 {
            d.set(k, k).unwrap();
        }
        assert!(d.is_rehashing());
        d.clear();
        assert_eq!(d.len(), 0);
        assert_eq!(d.table_sizes(), [0, 0]);
        assert_eq!(d.rehash_state(), RehashState::Idle);
        assert_eq!(d.get(&3), None);
        d.set(3, 3).unwrap();
        assert_eq!(d.get(&3), Some(&3));
        d.raw.assert_invariants();
    }

    #[test]
    fn get_mut_and_iter_mut_update_values() {
        let mut d = ident();
        for k in 0..10 {
            d.set(k, k).unwrap();
        }
        *d.get_mut(&3).unwrap() = 33;
        assert_eq!(d.get(&3), Some(&33));
        assert_eq!(d.get_mut(&99), None);

        let it = d.iter_mut();
        assert_eq!(it.len(), 10);
        for (_, v) in it {
            *v += 1;
        }
        assert_eq!(d.get(&3), Some(&34));
        assert_eq!(d.get(&9), Some(&10));
    }

    /// Invariant: the indexing capabilities may only be swapped while empty.
    #[test]
    fn capability_setters_guard_live_entries() {
        let mut d = ident();
        d.set_hash(|k| k.wrapping_mul(31)).unwrap();
        d.set(1, 1).unwrap();
        assert_eq!(d.set_hash(|k| *k), Err(DictError::NotEmpty("hash")));
        assert_eq!(d.set_compare(|a, b| a != b), Err(DictError::NotEmpty("compare")));
        assert_eq!((d.hash_fn())(&2), 62);
        d.clear();
        assert!(d.set_compare(|a, b| a == b).is_ok());
    }

    #[test]
    fn default_constructor_uses_key_traits() {
        let mut d: Dict<String, usize> = Dict::new();
        d.set("alpha".to_string(), 1).unwrap();
        d.set("beta".to_string(), 2).unwrap();
        assert_eq!(d.get(&"alpha".to_string()), Some(&1));
        assert_eq!(format!("{:?}", Dict::<u8, u8>::default()), "{}");
    }

    /// Invariant (debug-only): a capability that calls back into the
    /// dictionary during a lookup trips the reentrancy guard.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrant_hash_panics() {
        use std::cell::Cell;
        use std::rc::Rc;

        type D = Dict<u64, u64>;
        let slot: Rc<Cell<*const D>> = Rc::new(Cell::new(core::ptr::null()));
        let s = slot.clone();
        let mut d: D = Dict::builder()
            .hash(move |k: &u64| {
                let p = s.get();
                if *k == 13 && !p.is_null() {
                    // Safety: `d` outlives the lookup and is only shared-borrowed.
                    let _ = unsafe { &*p }.contains(&1);
                }
                *k
            })
            .compare(|a, b| a == b)
            .build()
            .unwrap();
        d.set(1, 1).unwrap();
        slot.set(&d as *const D);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| d.get(&13).is_some()));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        slot.set(core::ptr::null());
    }
}
