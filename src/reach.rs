//! Per-node reachability state.

use std::collections::BTreeMap;
use std::fmt;

use crate::bound::Bound;
use crate::expression::{Expression, Operator};
use crate::intervals::Intervals;

/// Counter values known to reach one node, split by the predecessor ("origin")
/// they arrived from.
///
/// The initial node is keyed by itself for the starting value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reach {
    reachable_set: BTreeMap<String, Intervals>,
}

impl Reach {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions `intervals` into the entry for `origin`, creating it if absent.
    pub fn update_reach(&mut self, origin: &str, intervals: Intervals) {
        match self.reachable_set.get_mut(origin) {
            Some(existing) => existing.union(&intervals),
            None => {
                self.reachable_set.insert(origin.to_string(), intervals);
            }
        }
    }

    pub fn reachable_set(&self, origin: &str) -> Option<&Intervals> {
        self.reachable_set.get(origin)
    }

    pub(crate) fn reachable_set_mut(&mut self, origin: &str) -> Option<&mut Intervals> {
        self.reachable_set.get_mut(origin)
    }

    /// Origins recorded so far, in name order.
    pub fn preceding_nodes(&self) -> impl Iterator<Item = &str> {
        self.reachable_set.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Intervals)> {
        self.reachable_set.iter().map(|(origin, intervals)| (origin.as_str(), intervals))
    }

    pub fn is_empty(&self) -> bool {
        self.reachable_set.is_empty()
    }

    /// Whether some origin contributes at least one value.
    pub fn is_reachable(&self) -> bool {
        self.reachable_set.values().any(|intervals| !intervals.is_empty())
    }

    /// Restricts the entry for `origin` to the global bounds and the node's guard.
    pub fn restrict(&mut self, origin: &str, lower_bound: Bound, upper_bound: Bound, guard: Option<&Expression>) {
        if let Some(intervals) = self.reachable_set.get_mut(origin) {
            restrict(intervals, lower_bound, upper_bound, guard);
        }
    }
}

/// Clamps `intervals` to `[lower_bound, upper_bound]`, applies `guard` and
/// drops the degenerate pieces this leaves behind.
pub(crate) fn restrict(intervals: &mut Intervals, lower_bound: Bound, upper_bound: Bound, guard: Option<&Expression>) {
    intervals.rescale_reach(lower_bound, upper_bound);
    if let Some(guard) = guard {
        match guard.op() {
            Operator::Le => intervals.clip_above(guard.constant()),
            Operator::Ge => intervals.clip_below(guard.constant()),
            Operator::Eq => intervals.restrict_to_point(guard.constant()),
            Operator::Add | Operator::Sub => {}
        }
    }
    intervals.remove_inconsistencies();
}

impl fmt::Display for Reach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (origin, intervals) in &self.reachable_set {
            writeln!(f, "{}: {}", origin, intervals)?;
        }
        Ok(())
    }
}
