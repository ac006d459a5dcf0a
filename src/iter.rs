//! Iteration over a `Dict`.

use crate::raw::{Entry, RawDict, RehashState};
use crate::table::Link;
use core::iter::FusedIterator;
use slotmap::DefaultKey;

/// Bucket-walking cursor over `(&K, &V)`.
///
/// Starts at the rehash cursor of `tables[0]` (everything below it has
/// already been drained) and, if a rehash was pending at construction,
/// crosses into `tables[1]` exactly once. The next entry is always
/// located ahead of time, so `has_next` is exact.
pub struct Iter<'a, K, V, A> {
    raw: &'a RawDict<K, V, A>,
    table: usize,
    bucket: usize,
    next: Link,
    crosses: bool,
    remaining: usize,
}

impl<'a, K, V, A> Iter<'a, K, V, A> {
    pub(crate) fn new(raw: &'a RawDict<K, V, A>) -> Self {
        let (start, crosses) = match raw.rehash {
            RehashState::Idle => (0, false),
            RehashState::Rehashing { cursor } => (cursor, true),
        };
        let mut it = Iter {
            raw,
            table: 0,
            bucket: start,
            next: None,
            crosses,
            remaining: raw.tables[0].used + raw.tables[1].used,
        };
        it.seek(start);
        it
    }

    /// Position on the first non-empty bucket at or after `bucket`.
    fn seek(&mut self, mut bucket: usize) {
        let raw = self.raw;
        loop {
            let t = &raw.tables[self.table];
            while bucket < t.size() {
                if let Some(k) = t.buckets[bucket] {
                    self.bucket = bucket;
                    self.next = Some(k);
                    return;
                }
                bucket += 1;
            }
            if self.table == 0 && self.crosses {
                self.table = 1;
                bucket = 0;
            } else {
                self.bucket = bucket;
                self.next = None;
                return;
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

impl<'a, K, V, A> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.next?;
        let raw = self.raw;
        let e = &raw.entries[k];
        self.next = e.next;
        if self.next.is_none() {
            self.seek(self.bucket + 1);
        }
        self.remaining -= 1;
        Some((&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A> ExactSizeIterator for Iter<'_, K, V, A> {}
impl<K, V, A> FusedIterator for Iter<'_, K, V, A> {}

/// Iterator over `(&K, &mut V)` for every live entry, in arena order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, DefaultKey, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new(entries: &'a mut slotmap::SlotMap<DefaultKey, Entry<K, V>>) -> Self {
        let remaining = entries.len();
        Self {
            it: entries.iter_mut(),
            remaining,
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (_, e) = self.it.next()?;
        self.remaining -= 1;
        Some((&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}
