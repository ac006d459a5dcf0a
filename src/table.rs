//! Bucket arrays. A `Table` only holds chain heads; the entries
//! themselves live in the dictionary's arena.

use crate::alloc::Allocator;
use crate::error::DictError;
use core::alloc::Layout;
use slotmap::DefaultKey;

pub(crate) type Link = Option<DefaultKey>;

#[derive(Debug, Default)]
pub(crate) struct Table {
    pub(crate) buckets: Vec<Link>,
    pub(crate) used: usize,
}

fn bucket_layout(size: usize) -> Result<Layout, DictError> {
    Layout::array::<Link>(size).map_err(|_| DictError::AllocFailed { bytes: usize::MAX })
}

impl Table {
    /// Allocate an empty table of `size` buckets; `size` must be a power of two.
    pub(crate) fn allocate<A: Allocator>(size: usize, alloc: &A) -> Result<Self, DictError> {
        debug_assert!(size.is_power_of_two());
        let layout = bucket_layout(size)?;
        alloc.allocate(layout)?;
        let mut buckets = Vec::new();
        if buckets.try_reserve_exact(size).is_err() {
            alloc.deallocate(layout);
            return Err(DictError::AllocFailed {
                bytes: layout.size(),
            });
        }
        buckets.resize(size, None);
        Ok(Self { buckets, used: 0 })
    }

    /// Return the bucket array to `alloc` and reset to the unallocated state.
    /// Chains must already have been detached or released.
    pub(crate) fn release<A: Allocator>(&mut self, alloc: &A) {
        if self.is_allocated() {
            if let Ok(layout) = bucket_layout(self.size()) {
                alloc.deallocate(layout);
            }
        }
        *self = Table::default();
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    #[inline]
    pub(crate) fn index(&self, hash: u64) -> usize {
        debug_assert!(self.is_allocated());
        (hash as usize) & (self.size() - 1)
    }
}
