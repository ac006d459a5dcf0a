//! Allocation strategies.
//!
//! `Dict` never asks an `Allocator` for memory directly; bucket arrays
//! and entries still live in ordinary Rust collections. Instead every
//! request is announced to the allocator first, which may refuse it.
//! Refusals surface as `DictError::AllocFailed` and leave the dictionary
//! unchanged. Each successful `allocate` is matched by exactly one
//! `deallocate` with the same layout.

use crate::error::DictError;
use core::alloc::Layout;
use core::cell::Cell;

pub trait Allocator {
    fn allocate(&self, layout: Layout) -> Result<(), DictError>;
    fn deallocate(&self, layout: Layout);
}

/// Host allocator: never refuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

impl Allocator for Global {
    #[inline]
    fn allocate(&self, _layout: Layout) -> Result<(), DictError> {
        Ok(())
    }

    #[inline]
    fn deallocate(&self, _layout: Layout) {}
}

/// Byte-budgeted allocator. Refuses any request that would push the
/// outstanding total over `limit`.
#[derive(Debug)]
pub struct Bounded {
    limit: usize,
    in_use: Cell<usize>,
    peak: Cell<usize>,
}

impl Bounded {
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: Cell::new(0),
            peak: Cell::new(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently outstanding.
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    /// High-water mark of `in_use`.
    pub fn peak(&self) -> usize {
        self.peak.get()
    }
}

impl Allocator for Bounded {
    fn allocate(&self, layout: Layout) -> Result<(), DictError> {
        let bytes = layout.size();
        let next = self
            .in_use
            .get()
            .checked_add(bytes)
            .filter(|&n| n <= self.limit)
            .ok_or(DictError::AllocFailed { bytes })?;
        self.in_use.set(next);
        self.peak.set(self.peak.get().max(next));
        Ok(())
    }

    fn deallocate(&self, layout: Layout) {
        let d = self.in_use.get();
        debug_assert!(d >= layout.size(), "deallocate without matching allocate");
        self.in_use.set(d.saturating_sub(layout.size()));
    }
}

impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<(), DictError> {
        (**self).allocate(layout)
    }

    #[inline]
    fn deallocate(&self, layout: Layout) {
        (**self).deallocate(layout)
    }
}

impl<A: Allocator + ?Sized> Allocator for std::rc::Rc<A> {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<(), DictError> {
        (**self).allocate(layout)
    }

    #[inline]
    fn deallocate(&self, layout: Layout) {
        (**self).deallocate(layout)
    }
}
