//! Non-convex sets of counter values.
//!
//! [`Intervals`] is the abstract value the solver attaches to every
//! (node, origin) pair: a sorted list of pairwise disjoint [`Interval`]s.
//!
//! # Invariants
//!
//! - Sub-intervals are sorted ascending by their lower bound.
//! - Sub-intervals are disjoint. Two neighbours may share a boundary value only
//!   if it is exclusive on both sides, e.g. `(-5, 0) (0, 5)`. Neighbours that
//!   touch with at least one inclusive side are merged by [`Intervals::union`].
//!
//! # Examples
//!
//! ```
//! use oca_reach::intervals::Intervals;
//!
//! let mut set = Intervals::new(0, true, 10, true);
//! set.union(&Intervals::new(15, false, 16, false));
//! set.union(&Intervals::new(-5, false, -3, false));
//! assert_eq!(set.to_string(), "(-5, -3) [0, 10] (15, 16)");
//!
//! set.add(&Intervals::new(0, false, 1, true));
//! assert_eq!(set.to_string(), "(-5, -2) (0, 11] (15, 17)");
//! ```

use std::cmp::Reverse;
use std::fmt;

use crate::bound::Bound;
use crate::interval::Interval;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Intervals {
    intervals: Vec<Interval>,
}

impl Intervals {
    pub fn new(low: impl Into<Bound>, incl_low: bool, high: impl Into<Bound>, incl_high: bool) -> Self {
        Self::from_interval(Interval::new(low, incl_low, high, incl_high))
    }

    pub fn from_interval(interval: Interval) -> Self {
        Self {
            intervals: vec![interval],
        }
    }

    /// The set with no sub-intervals at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The closed point `[value, value]`.
    pub fn point(value: impl Into<Bound>) -> Self {
        Self::from_interval(Interval::point(value))
    }

    /// The values a single traversal of an edge with delta `delta` can add:
    /// `(0, delta]` for increments and `[delta, 0)` for decrements.
    ///
    /// Returns `None` for a zero delta, which leaves values untouched.
    pub fn for_delta(delta: i64) -> Option<Self> {
        match delta {
            0 => None,
            d if d > 0 => Some(Self::new(0, false, d, true)),
            d => Some(Self::new(d, true, 0, false)),
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether the set denotes no value at all.
    ///
    /// This holds for an empty list and for a list made only of degenerate
    /// points that are not closed on both sides.
    pub fn is_empty(&self) -> bool {
        self.intervals.iter().all(Interval::is_empty)
    }

    pub fn contains(&self, value: impl Into<Bound>) -> bool {
        let value = value.into();
        self.intervals.iter().any(|i| i.contains(value))
    }

    // ----------------------------------------------------------------------
    // Lattice operations
    // ----------------------------------------------------------------------

    /// Minkowski sum with `addend`, in place.
    ///
    /// The solver only ever adds a single-interval step (see [`Intervals::for_delta`]);
    /// for a multi-interval addend the result is the union of the sums with each piece.
    pub fn add(&mut self, addend: &Intervals) {
        let mut sum = Intervals::empty();
        for piece in &addend.intervals {
            let shifted = Intervals {
                intervals: self
                    .intervals
                    .iter()
                    .map(|interval| {
                        let mut interval = *interval;
                        interval.add(piece);
                        interval
                    })
                    .collect(),
            };
            sum.union(&shifted);
        }
        *self = sum;
    }

    /// Merges every sub-interval of `other` into `self`, keeping the list
    /// sorted, disjoint and maximally merged.
    pub fn union(&mut self, other: &Intervals) {
        let mut all: Vec<Interval> = self.intervals.drain(..).chain(other.intervals.iter().copied()).collect();
        // Equal lower bounds: the inclusive one first.
        all.sort_by(|a, b| a.low.cmp(&b.low).then(b.incl_low.cmp(&a.incl_low)));

        let mut merged: Vec<Interval> = Vec::with_capacity(all.len());
        for next in all {
            match merged.last_mut() {
                Some(current) if current.absorbs(&next) => current.merge(&next),
                // A degenerate point must not keep its neighbour from merging.
                Some(current) if current.is_empty() => *current = next,
                _ => merged.push(next),
            }
        }
        merged.retain(|interval| !interval.is_empty());
        self.intervals = merged;
    }

    /// Restricts the set to the closed range `[lower_bound, upper_bound]`.
    ///
    /// Sub-intervals entirely outside the range are dropped, the rest are clamped.
    pub fn rescale_reach(&mut self, lower_bound: Bound, upper_bound: Bound) {
        self.intervals
            .retain(|interval| !(interval.low > upper_bound || interval.high < lower_bound));
        for interval in self.intervals.iter_mut() {
            interval.rescale_reach(lower_bound, upper_bound);
        }
    }

    /// Applies the guard `x <= bound`.
    pub fn clip_above(&mut self, bound: i64) {
        let bound = Bound::Finite(bound);
        self.intervals
            .retain(|interval| interval.low < bound || (interval.low == bound && interval.incl_low));
        for interval in self.intervals.iter_mut() {
            if interval.high > bound {
                interval.update_high(bound, true);
            }
        }
    }

    /// Applies the guard `x >= bound`.
    pub fn clip_below(&mut self, bound: i64) {
        let bound = Bound::Finite(bound);
        self.intervals
            .retain(|interval| interval.high > bound || (interval.high == bound && interval.incl_high));
        for interval in self.intervals.iter_mut() {
            if interval.low < bound {
                interval.update_low(bound, true);
            }
        }
    }

    /// Applies the guard `x = value`: the set collapses to `[value, value]` if
    /// it contains `value`, and becomes empty otherwise.
    pub fn restrict_to_point(&mut self, value: i64) {
        if self.contains(value) {
            *self = Intervals::point(value);
        } else {
            self.intervals.clear();
        }
    }

    /// Drops every sub-interval that denotes no value.
    pub fn remove_inconsistencies(&mut self) {
        self.intervals.retain(|interval| !interval.is_empty());
    }

    // ----------------------------------------------------------------------
    // Comparison
    // ----------------------------------------------------------------------

    /// Total width of the set; on equal widths, fewer open sides weigh more.
    fn measure(&self) -> (Bound, Reverse<usize>) {
        let span = self
            .intervals
            .iter()
            .fold(Bound::ZERO, |total, interval| total + interval.span());
        let open = self.intervals.iter().map(Interval::exclusive_bounds).sum();
        (span, Reverse(open))
    }

    /// Whether `self` is a (non-strict) expansion of `prior`: its measure is
    /// not smaller, and every sub-interval of `prior` is covered by some
    /// sub-interval of `self`.
    ///
    /// This is the monotonicity test that licenses loop acceleration.
    pub fn is_expansion_of(&self, prior: &Intervals) -> bool {
        if self.measure() < prior.measure() {
            return false;
        }
        prior
            .intervals
            .iter()
            .all(|old| self.intervals.iter().any(|new| new.contains_interval(old)))
    }

    /// Whether the supremum moved up compared to `prior` (or became inclusive).
    pub fn extends_above(&self, prior: &Intervals) -> bool {
        match (self.intervals.last(), prior.intervals.last()) {
            (Some(new), Some(old)) => new.high > old.high || (new.high == old.high && new.incl_high && !old.incl_high),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Whether the infimum moved down compared to `prior` (or became inclusive).
    pub fn extends_below(&self, prior: &Intervals) -> bool {
        match (self.intervals.first(), prior.intervals.first()) {
            (Some(new), Some(old)) => new.low < old.low || (new.low == old.low && new.incl_low && !old.incl_low),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    // ----------------------------------------------------------------------
    // Extremal bounds
    // ----------------------------------------------------------------------

    pub fn inf(&self) -> Option<Bound> {
        self.intervals.first().map(|i| i.low)
    }

    pub fn is_inf_inclusive(&self) -> Option<bool> {
        self.intervals.first().map(|i| i.incl_low)
    }

    pub fn sup(&self) -> Option<Bound> {
        self.intervals.last().map(|i| i.high)
    }

    pub fn is_sup_inclusive(&self) -> Option<bool> {
        self.intervals.last().map(|i| i.incl_high)
    }

    /// Overwrites the lower bound of the lowest sub-interval. No-op on an empty list.
    pub fn update_inf(&mut self, low: Bound, incl_low: bool) {
        if let Some(first) = self.intervals.first_mut() {
            first.update_low(low, incl_low);
        }
    }

    /// Overwrites the upper bound of the highest sub-interval. No-op on an empty list.
    pub fn update_sup(&mut self, high: Bound, incl_high: bool) {
        if let Some(last) = self.intervals.last_mut() {
            last.update_high(high, incl_high);
        }
    }
}

impl From<Interval> for Intervals {
    fn from(interval: Interval) -> Self {
        Self::from_interval(interval)
    }
}

impl fmt::Display for Intervals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", interval)?;
        }
        Ok(())
    }
}
