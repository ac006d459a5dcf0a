//! Debug-only guard against injected capabilities re-entering the
//! dictionary.
//!
//! `hash`, `compare` and the destructors are arbitrary user code. While a
//! dictionary operation is relinking chains its tables are transiently
//! inconsistent, so a capability that calls back into the same dictionary
//! would observe a half-migrated state. In debug builds the guard records
//! which operation is in flight and panics on nested entry, naming both.
//! In release builds it compiles to nothing.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct OpGuard {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Keeps the owning dictionary !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl OpGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Mark `op` as in flight until the returned scope is dropped.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> OpScope<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("dictionary re-entered by `{op}` while `{outer}` was in progress");
            }
            self.active.set(Some(op));
            return OpScope { owner: self };
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            return OpScope { _z: PhantomData };
        }
    }
}

impl Default for OpGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct OpScope<'a> {
    #[cfg(debug_assertions)]
    owner: &'a OpGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for OpScope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
