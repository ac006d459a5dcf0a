//! incr-dict: a single-threaded chained hash dictionary with incremental
//! (amortized) rehashing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bound the latency of every call. Growing or shrinking the
//!   bucket array never stops the world; migration from the old table to
//!   the new one is spread across subsequent mutating calls, one bucket
//!   per call.
//! - Layers:
//!   - RawDict<K, V, A>: two bucket tables over a generational entry
//!     arena, plus the rehash scheduler. Never runs destructors.
//!   - Dict<K, V, A>: public API. Adds the debug-only reentrancy guard
//!     and releases keys/values through the injected destructors.
//!   - DictBuilder<K, V, A>: capability injection (hash, compare,
//!     free_key, free_value), load factors and allocator.
//!
//! Tables and rehashing
//! - `tables[0]` is active; `tables[1]` exists only while a rehash is in
//!   progress. Sizes are powers of two, at least `MIN_TABLE_SIZE`.
//! - `RehashState::Rehashing { cursor }`: buckets of `tables[0]` below
//!   `cursor` are drained. A key whose `tables[0]` index is below the
//!   cursor is looked up in `tables[1]` only; otherwise `tables[0]` is
//!   searched first, then `tables[1]`.
//! - New entries inserted during a rehash go to `tables[1]`, so the
//!   migration finishes within `tables[0].size()` mutating calls. This is
//!   why lookups at or past the cursor fall back to `tables[1]`.
//! - Every entry stores its hash; migration never calls user code.
//!
//! Capabilities and ownership
//! - The dictionary has no built-in notion of key equality: `hash` and
//!   `compare` are injected and required before first use (`build`
//!   rejects a builder that lacks them). `Dict::new` derives both from
//!   `K: Hash + Eq`.
//! - Keys and values are owned by the dictionary until released. With a
//!   destructor configured, released keys/values are passed to it;
//!   otherwise they are dropped, or handed back by the operations that
//!   return them (`replace`, `remove`, `remove_entry`).
//!
//! Allocation
//! - Every bucket array and entry is announced to an `Allocator` first.
//!   A refusal surfaces as `DictError::AllocFailed` and leaves the
//!   dictionary unchanged; a refused resize is deferred to the next call.
//!
//! Notes and non-goals
//! - Single-threaded: `Dict` is `!Send`/`!Sync`.
//! - Iterators borrow the dictionary, so mutation during iteration does
//!   not compile.
//! - No persistence, no borrowed-form lookups (the injected capabilities
//!   operate on `&K`).

mod alloc;
mod builder;
mod capabilities;
mod dict;
mod dict_proptest;
mod error;
mod iter;
mod policy;
mod raw;
mod reentrancy;
mod table;

// Public surface
pub use alloc::{Allocator, Bounded, Global};
pub use builder::DictBuilder;
pub use capabilities::{CompareFn, FreeFn, HashFn};
pub use dict::Dict;
pub use error::DictError;
pub use iter::{Iter, IterMut};
pub use policy::{LoadFactors, EXPAND_THRESHOLD, MIN_TABLE_SIZE, SHRINK_THRESHOLD};
pub use raw::RehashState;
