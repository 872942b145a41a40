//! Extended integers: the values a counter bound can take.
//!
//! The counter of a one-counter automaton is an integer, but reachable sets
//! are routinely unbounded (a loop that keeps incrementing), so every bound in
//! this crate is either a finite `i64` or one of the two infinities.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use crate::error::ParseBoundError;

/// Bound of an interval: -∞, finite value, or +∞.
///
/// The derived ordering is the natural one: `NegInf < Finite(_) < PosInf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl Bound {
    pub const ZERO: Bound = Bound::Finite(0);

    pub fn as_finite(&self) -> Option<i64> {
        match self {
            Bound::Finite(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Bound::Finite(_))
    }

    pub fn is_infinite(&self) -> bool {
        !self.is_finite()
    }
}

impl Default for Bound {
    fn default() -> Self {
        Bound::ZERO
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Finite(value)
    }
}

impl Add for Bound {
    type Output = Bound;

    fn add(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_add(b)),
            // Undefined: use top
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => Bound::PosInf,
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }
}

impl Sub for Bound {
    type Output = Bound;

    fn sub(self, other: Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a.saturating_sub(b)),
            // Width of a degenerate point sitting at infinity.
            (Bound::PosInf, Bound::PosInf) | (Bound::NegInf, Bound::NegInf) => Bound::ZERO,
            (Bound::PosInf, _) | (_, Bound::NegInf) => Bound::PosInf,
            (Bound::NegInf, _) | (_, Bound::PosInf) => Bound::NegInf,
        }
    }
}

impl Neg for Bound {
    type Output = Bound;

    fn neg(self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::Finite(n.saturating_neg()),
            Bound::PosInf => Bound::NegInf,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-inf"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "inf"),
        }
    }
}

impl FromStr for Bound {
    type Err = ParseBoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inf" | "+inf" | "infinity" | "+infinity" => Ok(Bound::PosInf),
            "-inf" | "-infinity" => Ok(Bound::NegInf),
            other => other
                .parse::<i64>()
                .map(Bound::Finite)
                .map_err(|_| ParseBoundError(other.to_string())),
        }
    }
}
