//! A single convex range of counter values.

use std::fmt;

use crate::bound::Bound;

/// Interval `low ⋚ x ⋚ high` with an independent open/closed flag per side.
///
/// A degenerate interval `low == high` that is not closed on both sides
/// denotes the empty set; such intervals show up as artifacts of boundary
/// arithmetic and are cleaned up by
/// [`Intervals::remove_inconsistencies`][crate::intervals::Intervals::remove_inconsistencies].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub low: Bound,
    pub incl_low: bool,
    pub high: Bound,
    pub incl_high: bool,
}

impl Interval {
    pub fn new(low: impl Into<Bound>, incl_low: bool, high: impl Into<Bound>, incl_high: bool) -> Self {
        Self {
            low: low.into(),
            incl_low,
            high: high.into(),
            incl_high,
        }
    }

    /// The closed point `[value, value]`.
    pub fn point(value: impl Into<Bound>) -> Self {
        let value = value.into();
        Self::new(value, true, value, true)
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high || (self.low == self.high && !(self.incl_low && self.incl_high))
    }

    pub fn contains(&self, value: Bound) -> bool {
        let above_low = self.low < value || (self.low == value && self.incl_low);
        let below_high = value < self.high || (value == self.high && self.incl_high);
        above_low && below_high
    }

    /// Whether `other` lies within `self`, with `self` at least as inclusive
    /// wherever the two share a boundary.
    pub fn contains_interval(&self, other: &Interval) -> bool {
        let low_ok = self.low < other.low || (self.low == other.low && (self.incl_low || !other.incl_low));
        let high_ok = other.high < self.high || (other.high == self.high && (self.incl_high || !other.incl_high));
        low_ok && high_ok
    }

    /// Width of the interval, `high - low`.
    pub fn span(&self) -> Bound {
        self.high - self.low
    }

    /// Number of open sides (0, 1 or 2).
    pub fn exclusive_bounds(&self) -> usize {
        (!self.incl_low) as usize + (!self.incl_high) as usize
    }

    /// Minkowski sum. A side of the sum is closed only if both operands are closed there.
    pub fn add(&mut self, other: &Interval) {
        self.low = self.low + other.low;
        self.high = self.high + other.high;
        self.incl_low &= other.incl_low;
        self.incl_high &= other.incl_high;
    }

    /// Clamps both bounds into the closed range `[lower_bound, upper_bound]`.
    ///
    /// A clamped side becomes inclusive, since the limit itself belongs to the range.
    /// Intervals lying entirely outside the range are the caller's business.
    pub fn rescale_reach(&mut self, lower_bound: Bound, upper_bound: Bound) {
        if self.high > upper_bound {
            self.update_high(upper_bound, true);
        }
        if self.high < lower_bound {
            self.update_high(lower_bound, true);
        }

        if self.low < lower_bound {
            self.update_low(lower_bound, true);
        }
        if self.low > upper_bound {
            self.update_low(upper_bound, true);
        }
    }

    pub fn update_low(&mut self, low: Bound, incl_low: bool) {
        self.low = low;
        self.incl_low = incl_low;
    }

    pub fn update_high(&mut self, high: Bound, incl_high: bool) {
        self.high = high;
        self.incl_high = incl_high;
    }

    /// Whether `next` (starting at or after `self.low`) overlaps or touches `self`
    /// closely enough to be merged into it.
    pub(crate) fn absorbs(&self, next: &Interval) -> bool {
        if next.low < self.high {
            return true;
        }
        if next.low == self.high {
            return self.incl_high || next.incl_low || next.high == self.high;
        }
        false
    }

    /// Widens `self` to cover `next`, OR-ing inclusivity where bounds coincide.
    pub(crate) fn merge(&mut self, next: &Interval) {
        if next.low < self.low {
            self.update_low(next.low, next.incl_low);
        } else if next.low == self.low {
            self.incl_low |= next.incl_low;
        }

        if next.high > self.high {
            self.update_high(next.high, next.incl_high);
        } else if next.high == self.high {
            self.incl_high |= next.incl_high;
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.incl_low { "[" } else { "(" },
            self.low,
            self.high,
            if self.incl_high { "]" } else { ")" }
        )
    }
}
