//! RawDict: the two-table store and the incremental rehash engine.
//!
//! Entries live in a generational arena; tables only hold chain heads.
//! Migrating an entry from `tables[0]` to `tables[1]` relinks its arena
//! key and never moves the entry itself. Every entry records the hash it
//! was inserted with, so migration never calls back into user code.
//!
//! Invariants
//! - `tables[i].size()` is 0 or a power of two `>= MIN_TABLE_SIZE`.
//! - `Rehashing { cursor }` implies both tables are allocated,
//!   `cursor < tables[0].size()`, and every bucket below `cursor` in
//!   `tables[0]` is empty.
//! - A key is reachable from exactly one chain; `tables[i].used` counts
//!   the entries reachable from table `i`.
//! - While rehashing, an entry whose `tables[0]` bucket is below the
//!   cursor lives in `tables[1]`; at or past the cursor it may live in
//!   either table, since inserts made during the rehash go to `tables[1]`.
//!
//! Nothing here runs destructors: removed keys and values are handed
//! back to the caller (`Dict`), which releases them once the structure
//! is consistent again.

use crate::alloc::Allocator;
use crate::capabilities::Capabilities;
use crate::error::DictError;
use crate::policy::{LoadFactors, MIN_TABLE_SIZE};
use crate::table::{Link, Table};
use core::alloc::Layout;
use slotmap::{DefaultKey, SlotMap};
use tracing::{debug, trace, warn};

/// Migration progress of a dictionary.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RehashState {
    Idle,
    /// `cursor` is the next bucket of the old table awaiting migration.
    Rehashing { cursor: usize },
}

/// Where a found entry is chained.
struct Slot {
    table: usize,
    bucket: usize,
    prev: Link,
    key: DefaultKey,
}

#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) next: Link,
}

#[inline]
fn entry_layout<K, V>() -> Layout {
    Layout::new::<Entry<K, V>>()
}

pub(crate) struct RawDict<K, V, A> {
    pub(crate) tables: [Table; 2],
    pub(crate) rehash: RehashState,
    pub(crate) entries: SlotMap<DefaultKey, Entry<K, V>>,
    pub(crate) caps: Capabilities<K, V>,
    pub(crate) load: LoadFactors,
    pub(crate) alloc: A,
}

impl<K, V, A: Allocator> RawDict<K, V, A> {
    pub(crate) fn new(caps: Capabilities<K, V>, load: LoadFactors, alloc: A) -> Self {
        Self {
            tables: [Table::default(), Table::default()],
            rehash: RehashState::Idle,
            entries: SlotMap::with_key(),
            caps,
            load,
            alloc,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.tables[0].used + self.tables[1].used
    }

    pub(crate) fn find(&self, key: &K) -> Option<DefaultKey> {
        if !self.tables[0].is_allocated() {
            return None;
        }
        self.find_hashed(self.caps.hash(key), key)
    }

    fn find_hashed(&self, hash: u64, key: &K) -> Option<DefaultKey> {
        self.locate(hash, key).map(|s| s.key)
    }

    /// Chain position of the entry for `key`.
    ///
    /// While rehashing, a bucket below the cursor has been drained and only
    /// `tables[1]` can hold the key. At or past the cursor the key is either
    /// still waiting in `tables[0]` or was inserted after the rehash began,
    /// in which case it sits in `tables[1]`; both chains are searched.
    fn locate(&self, hash: u64, key: &K) -> Option<Slot> {
        if !self.tables[0].is_allocated() {
            return None;
        }
        let idx0 = self.tables[0].index(hash);
        let tables = match self.rehash {
            RehashState::Idle => 0..1,
            RehashState::Rehashing { cursor } if idx0 < cursor => 1..2,
            RehashState::Rehashing { .. } => 0..2,
        };
        for table in tables {
            let bucket = self.tables[table].index(hash);
            let mut prev: Link = None;
            let mut cur = self.tables[table].buckets[bucket];
            while let Some(k) = cur {
                let e = &self.entries[k];
                if e.hash == hash && self.caps.eq(&e.key, key) {
                    return Some(Slot {
                        table,
                        bucket,
                        prev,
                        key: k,
                    });
                }
                prev = cur;
                cur = e.next;
            }
        }
        None
    }

    /// Insert or update. On update the stored key is kept and the incoming
    /// key is returned together with the displaced value.
    pub(crate) fn upsert(&mut self, key: K, value: V) -> Result<Option<(K, V)>, DictError> {
        let hash = self.caps.hash(&key);
        if let Some(k) = self.find_hashed(hash, &key) {
            let old = core::mem::replace(&mut self.entries[k].value, value);
            self.check_threshold();
            return Ok(Some((key, old)));
        }

        let layout = entry_layout::<K, V>();
        self.alloc.allocate(layout)?;
        if !self.tables[0].is_allocated() {
            match Table::allocate(MIN_TABLE_SIZE, &self.alloc) {
                Ok(t) => self.tables[0] = t,
                Err(e) => {
                    self.alloc.deallocate(layout);
                    return Err(e);
                }
            }
        }

        // While rehashing, new entries only ever land in the new table.
        let t = match self.rehash {
            RehashState::Idle => 0,
            RehashState::Rehashing { .. } => 1,
        };
        let b = self.tables[t].index(hash);
        let next = self.tables[t].buckets[b];
        let k = self.entries.insert(Entry {
            key,
            value,
            hash,
            next,
        });
        self.tables[t].buckets[b] = Some(k);
        self.tables[t].used += 1;

        self.check_threshold();
        Ok(None)
    }

    /// Unlink the entry for `key` and hand back its contents. Runs the
    /// threshold check whether or not the key was present.
    pub(crate) fn remove(&mut self, key: &K) -> Option<(K, V)> {
        if !self.tables[0].is_allocated() {
            return None;
        }
        let hash = self.caps.hash(key);
        let removed = self.locate(hash, key).and_then(|slot| {
            let e = self.entries.remove(slot.key)?;
            match slot.prev {
                Some(p) => self.entries[p].next = e.next,
                None => self.tables[slot.table].buckets[slot.bucket] = e.next,
            }
            self.tables[slot.table].used -= 1;
            self.alloc.deallocate(entry_layout::<K, V>());
            Some((e.key, e.value))
        });

        self.check_threshold();
        removed
    }

    /// Once per mutating call: advance a pending rehash by one step, or
    /// start one if `tables[0]` left the load-factor band.
    fn check_threshold(&mut self) {
        if !self.tables[0].is_allocated() {
            return;
        }
        if let RehashState::Rehashing { .. } = self.rehash {
            self.migrate_step();
            return;
        }

        let used = self.tables[0].used;
        let size = self.tables[0].size();
        let Some(target) = self.load.resize_target(used, size) else {
            return;
        };
        match Table::allocate(target, &self.alloc) {
            Ok(table) => {
                debug!(from = size, to = target, used, "starting incremental rehash");
                self.tables[1] = table;
                self.rehash = RehashState::Rehashing { cursor: 0 };
                self.migrate_step();
            }
            // The triggering operation already completed; retry next call.
            Err(err) => warn!(%err, from = size, to = target, "resize deferred"),
        }
    }

    /// Move one non-empty bucket from `tables[0]` into `tables[1]`, or
    /// finish the rehash when none remain.
    pub(crate) fn migrate_step(&mut self) {
        let RehashState::Rehashing { mut cursor } = self.rehash else {
            return;
        };
        let size = self.tables[0].size();
        while cursor < size && self.tables[0].buckets[cursor].is_none() {
            cursor += 1;
        }
        if cursor == size {
            self.finish_rehash();
            return;
        }

        let mut cur = self.tables[0].buckets[cursor].take();
        let mut moved = 0;
        while let Some(k) = cur {
            let e = &mut self.entries[k];
            cur = e.next;
            let b = self.tables[1].index(e.hash);
            e.next = self.tables[1].buckets[b];
            self.tables[1].buckets[b] = Some(k);
            moved += 1;
        }
        self.tables[0].used -= moved;
        self.tables[1].used += moved;
        trace!(bucket = cursor, moved, "migrated bucket");

        if self.tables[0].used == 0 {
            // Every later bucket is empty too.
            self.finish_rehash();
        } else {
            self.rehash = RehashState::Rehashing { cursor: cursor + 1 };
        }
    }

    fn finish_rehash(&mut self) {
        debug_assert_eq!(self.tables[0].used, 0);
        let from = self.tables[0].size();
        self.tables[0].release(&self.alloc);
        self.tables.swap(0, 1);
        self.rehash = RehashState::Idle;
        debug!(
            from,
            to = self.tables[0].size(),
            used = self.tables[0].used,
            "incremental rehash complete"
        );
    }

    /// Reset to the unallocated, idle state and hand back the arena with
    /// every live entry in it.
    pub(crate) fn take_all(&mut self) -> SlotMap<DefaultKey, Entry<K, V>> {
        self.tables[0].release(&self.alloc);
        self.tables[1].release(&self.alloc);
        self.rehash = RehashState::Idle;
        let entries = core::mem::take(&mut self.entries);
        let layout = entry_layout::<K, V>();
        for _ in 0..entries.len() {
            self.alloc.deallocate(layout);
        }
        entries
    }

    /// Which table currently holds `key`.
    #[cfg(test)]
    pub(crate) fn table_of(&self, key: &K) -> Option<usize> {
        let hash = self.caps.hash(key);
        self.locate(hash, key).map(|s| s.table)
    }

    /// Check every structural invariant; used by tests after each operation.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        for t in &self.tables {
            let size = t.size();
            assert!(size == 0 || (size.is_power_of_two() && size >= MIN_TABLE_SIZE));
        }
        let mut reachable = 0;
        for (i, t) in self.tables.iter().enumerate() {
            let mut count = 0;
            for (b, head) in t.buckets.iter().enumerate() {
                let mut cur = *head;
                while let Some(k) = cur {
                    let e = &self.entries[k];
                    assert_eq!(t.index(e.hash), b, "entry chained in the wrong bucket");
                    assert_eq!(self.caps.hash(&e.key), e.hash, "stale stored hash");
                    count += 1;
                    cur = e.next;
                }
            }
            assert_eq!(count, t.used, "used count of table {i}");
            reachable += count;
        }
        assert_eq!(reachable, self.entries.len(), "arena holds unreachable entries");
        for (k, e) in &self.entries {
            assert_eq!(self.find(&e.key), Some(k), "live entry not found by lookup");
        }
        match self.rehash {
            RehashState::Idle => assert!(!self.tables[1].is_allocated()),
            RehashState::Rehashing { cursor } => {
                assert!(self.tables[1].is_allocated());
                assert!(cursor < self.tables[0].size());
                assert!(self.tables[0].buckets[..cursor].iter().all(Option::is_none));
            }
        }
    }
}
