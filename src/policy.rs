//! Resize policy: when to start a rehash and how large the new table is.

/// Smallest allocated table. Tables never shrink below this.
pub const MIN_TABLE_SIZE: usize = 8;
/// Default load factor above which the table grows.
pub const EXPAND_THRESHOLD: f64 = 1.0;
/// Default load factor below which the table shrinks.
pub const SHRINK_THRESHOLD: f64 = 0.1;

/// Load-factor band outside of which a rehash is started.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoadFactors {
    /// Grow once `used / size` exceeds this.
    pub expand: f64,
    /// Shrink once `used / size` falls to or below this.
    pub shrink: f64,
}

impl Default for LoadFactors {
    fn default() -> Self {
        Self {
            expand: EXPAND_THRESHOLD,
            shrink: SHRINK_THRESHOLD,
        }
    }
}

impl LoadFactors {
    pub(crate) fn is_valid(&self) -> bool {
        self.shrink >= 0.0 && self.shrink < self.expand
    }

    /// Size of the table to rehash into, or `None` when the current
    /// `size` should be kept.
    ///
    /// A table sitting exactly on the expand factor above the floor (for
    /// example 32 entries in 32 buckets) computes a target equal to its
    /// own size. That rehash would only reshuffle chains into an identical
    /// table, so it is skipped and the table grows on the next insert.
    pub(crate) fn resize_target(&self, used: usize, size: usize) -> Option<usize> {
        debug_assert!(size.is_power_of_two() && size >= MIN_TABLE_SIZE);
        let f = used as f64 / size as f64;
        if size == MIN_TABLE_SIZE && f <= self.expand {
            return None;
        }
        if self.shrink < f && f < self.expand {
            return None;
        }
        let mut target = used.max(MIN_TABLE_SIZE).checked_next_power_of_two()?;
        if f > self.expand {
            target = target.checked_mul(2)?;
        }
        (target != size).then_some(target)
    }
}
