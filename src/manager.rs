//! The reachability solver.
//!
//! [`ReachManager`] computes, for every visible node and every predecessor it
//! can be entered from, an over-approximation of the counter values on entry.
//! Each round propagates the previous round's snapshot one edge further. Loops
//! whose intervals keep growing in the same direction for `threshold` rounds in
//! a row are accelerated: the growing bound jumps straight to the tightest
//! guard on the loop, or to infinity if the loop is unguarded in that
//! direction. The solver stops once a round leaves the state unchanged.
//!
//! # Examples
//!
//! ```
//! use oca_reach::automaton::Automaton;
//! use oca_reach::expression::Expression;
//! use oca_reach::manager::ReachManager;
//!
//! let mut automaton = Automaton::new("counter");
//! automaton
//!     .create_new_node("qi")
//!     .create_new_edge("qi", "q0")
//!     .create_new_edge("q0", "q1")
//!     .create_new_edge("q1", "q0");
//! automaton.set_node_invisible("qi").unwrap();
//! automaton.add_operation_to_edge("q0", "q1", Some(Expression::add(2))).unwrap();
//! automaton.find_initial_node().unwrap();
//!
//! let mut manager = ReachManager::new(automaton).unwrap();
//! manager.run();
//!
//! assert!(manager.is_finished());
//! assert!(manager.is_reachable("q1"));
//! let reach = manager.get_interval("q1", "q0").unwrap();
//! assert_eq!(reach.to_string(), "(0, inf)");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, trace, warn};

use crate::automaton::Automaton;
use crate::bound::Bound;
use crate::error::AutomatonError;
use crate::intervals::Intervals;
use crate::reach::{self, Reach};

/// Solver tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachConfig {
    /// Consecutive expanding rounds before a loop is accelerated.
    /// Defaults to `|nodes| * (4 * |nodes| + 4)`.
    pub acceleration_threshold: Option<usize>,
    /// Upper limit on rounds performed by [`ReachManager::run`]. Unlimited by default.
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Direction {
    Up,
    Down,
}

#[derive(Debug)]
pub struct ReachManager {
    automaton: Automaton,
    reaches: BTreeMap<String, Reach>,
    // Snapshot of `reaches` taken at the start of the current round.
    intervals: BTreeMap<String, Reach>,
    // Indexed like `automaton.loops()`.
    up_expansions: Vec<usize>,
    down_expansions: Vec<usize>,
    threshold: usize,
    n: usize,
    finished: bool,
    config: ReachConfig,
}

impl ReachManager {
    pub fn new(automaton: Automaton) -> Result<Self, AutomatonError> {
        Self::with_config(automaton, ReachConfig::default())
    }

    /// Prepares the solver for `automaton`.
    ///
    /// The initial node must be resolved. Loops are discovered here unless the
    /// caller already did so.
    pub fn with_config(mut automaton: Automaton, config: ReachConfig) -> Result<Self, AutomatonError> {
        let initial = automaton.initial_node().ok_or(AutomatonError::NoInitialNode)?.to_string();
        if !automaton.has_loops() {
            automaton.initialize_loops()?;
        }

        let nodes = automaton.nr_of_nodes();
        let threshold = config.acceleration_threshold.unwrap_or(nodes * (4 * nodes + 4));

        let mut reaches: BTreeMap<String, Reach> = automaton
            .visible_nodes()
            .map(|node| (node.to_string(), Reach::new()))
            .collect();
        let mut seed = Intervals::point(automaton.initial_value());
        reach::restrict(
            &mut seed,
            automaton.lower_bound(),
            automaton.upper_bound(),
            automaton.node_condition(&initial),
        );
        match reaches.get_mut(&initial) {
            Some(reach) if !seed.is_empty() => reach.update_reach(&initial, seed),
            _ => warn!("Initial value {} of '{}' is out of range", automaton.initial_value(), initial),
        }

        let loops = automaton.loops().len();
        info!(
            "Solving '{}': {} node(s), {} loop(s), acceleration threshold {}",
            automaton.name(),
            nodes,
            loops,
            threshold
        );

        Ok(Self {
            intervals: reaches.clone(),
            reaches,
            up_expansions: vec![0; loops],
            down_expansions: vec![0; loops],
            threshold,
            n: 0,
            finished: false,
            config,
            automaton,
        })
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn config(&self) -> &ReachConfig {
        &self.config
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of completed rounds that changed the state.
    pub fn rounds(&self) -> usize {
        self.n
    }

    /// Consecutive expanding rounds observed so far for loop `index`, as `(up, down)`.
    pub fn expansions(&self, index: usize) -> Option<(usize, usize)> {
        Some((*self.up_expansions.get(index)?, *self.down_expansions.get(index)?))
    }

    pub fn get_reach(&self, node: &str) -> Option<&Reach> {
        self.reaches.get(node)
    }

    /// Values reaching `node` from `origin`, `None` if that pair was never populated.
    pub fn get_interval(&self, node: &str, origin: &str) -> Option<&Intervals> {
        self.reaches.get(node)?.reachable_set(origin)
    }

    pub fn is_reachable(&self, node: &str) -> bool {
        self.reaches.get(node).is_some_and(Reach::is_reachable)
    }

    pub fn reaches(&self) -> impl Iterator<Item = (&str, &Reach)> {
        self.reaches.iter().map(|(node, reach)| (node.as_str(), reach))
    }

    /// Manually records `intervals` reaching `node` from `origin`, clipped to the global bounds.
    ///
    /// Unknown or invisible nodes are ignored.
    pub fn add_interval(&mut self, node: &str, origin: &str, intervals: Intervals) {
        let (lower_bound, upper_bound) = (self.automaton.lower_bound(), self.automaton.upper_bound());
        let Some(reach) = self.reaches.get_mut(node) else {
            warn!("Ignoring interval for unknown node '{}'", node);
            return;
        };
        reach.update_reach(origin, intervals);
        reach.restrict(origin, lower_bound, upper_bound, None);
    }

    /// Performs rounds until convergence or until `max_rounds` is hit.
    ///
    /// Returns whether the solver converged.
    pub fn run(&mut self) -> bool {
        while !self.finished {
            if let Some(max_rounds) = self.config.max_rounds {
                if self.n >= max_rounds {
                    warn!("No fixpoint for '{}' after {} rounds", self.automaton.name(), self.n);
                    break;
                }
            }
            self.update_automaton();
        }
        self.finished
    }

    /// Performs one round. No-op once finished.
    pub fn update_automaton(&mut self) {
        if self.finished {
            return;
        }
        debug!("Round {} of '{}'", self.n + 1, self.automaton.name());

        let nodes: Vec<String> = self.automaton.visible_nodes().map(str::to_string).collect();
        for node in &nodes {
            self.update_state(node);
        }

        for index in 0..self.automaton.loops().len() {
            if self.down_expansions[index] >= self.threshold {
                self.accelerate(index, Direction::Down);
            }
            if self.up_expansions[index] >= self.threshold {
                self.accelerate(index, Direction::Up);
            }
        }

        if self.reaches == self.intervals {
            self.finished = true;
            info!("Fixpoint for '{}' reached after {} round(s)", self.automaton.name(), self.n);
            return;
        }

        self.update_expansions();

        self.intervals = self.reaches.clone();
        self.n += 1;
    }

    /// Pulls the previous round's values of every visible predecessor of `node` across the connecting edge.
    fn update_state(&mut self, node: &str) {
        let lower_bound = self.automaton.lower_bound();
        let upper_bound = self.automaton.upper_bound();
        let guard = self.automaton.node_condition(node);
        let Some(reach) = self.reaches.get_mut(node) else {
            return;
        };

        for edge in self.automaton.proceeding_edges(node) {
            let origin = edge.start();
            if self.automaton.is_invisible(origin) {
                continue;
            }
            let Some(prior) = self.intervals.get(origin) else {
                continue;
            };

            let step = Intervals::for_delta(edge.delta());
            let mut incoming: Option<Intervals> = None;
            for (_, intervals) in prior.iter().filter(|(_, intervals)| !intervals.is_empty()) {
                let mut shifted = intervals.clone();
                if let Some(step) = &step {
                    shifted.add(step);
                }
                match incoming.as_mut() {
                    Some(incoming) => incoming.union(&shifted),
                    None => incoming = Some(shifted),
                }
            }

            if let Some(incoming) = incoming {
                trace!("{} -> {}: {}", origin, node, incoming);
                reach.update_reach(origin, incoming);
                reach.restrict(origin, lower_bound, upper_bound, guard);
            }
        }
    }

    /// Jumps the growing bound of loop `index` to its limit in `direction`.
    ///
    /// Only loops that were actually seen expanding that way, and that carry a
    /// delta pointing that way, are accelerated.
    fn accelerate(&mut self, index: usize, direction: Direction) {
        let Some(l) = self.automaton.loops().get(index) else {
            return;
        };
        let (expanded, bound) = match direction {
            Direction::Up => (l.is_expanded_up() && l.contains_add(), l.max_bound()),
            Direction::Down => (l.is_expanded_down() && l.contains_sub(), l.min_bound()),
        };
        if !expanded {
            return;
        }

        let (node, origin, limit, inclusive) = match bound {
            Some(bound) => (bound.node.as_str(), bound.preceding.as_str(), Bound::Finite(bound.value), true),
            // Unguarded: the first edge of the cycle, keyed by its start.
            None => {
                let nodes = l.nodes();
                let (Some(first), Some(next)) = (nodes.first(), nodes.get(1).or(nodes.first())) else {
                    return;
                };
                let limit = match direction {
                    Direction::Up => Bound::PosInf,
                    Direction::Down => Bound::NegInf,
                };
                (next.as_str(), first.as_str(), limit, false)
            }
        };

        let Some(intervals) = self.reaches.get_mut(node).and_then(|r| r.reachable_set_mut(origin)) else {
            return;
        };
        if intervals.is_empty() {
            return;
        }

        match direction {
            Direction::Up => intervals.update_sup(limit, inclusive),
            Direction::Down => intervals.update_inf(limit, inclusive),
        }
        intervals.rescale_reach(self.automaton.lower_bound(), self.automaton.upper_bound());
        intervals.remove_inconsistencies();
        debug!("Accelerated loop {} {:?}: {}[{}] = {}", l, direction, node, origin, intervals);
    }

    /// Counts consecutive rounds in which every edge of a loop kept expanding.
    fn update_expansions(&mut self) {
        for (index, l) in self.automaton.loops_mut().iter_mut().enumerate() {
            let mut expanding = true;
            let mut up = false;
            let mut down = false;

            for (start, end) in l.edges() {
                let live = self.reaches.get(end).and_then(|r| r.reachable_set(start));
                let prior = self.intervals.get(end).and_then(|r| r.reachable_set(start));
                match (live, prior) {
                    (Some(live), Some(prior)) if !live.is_empty() && !prior.is_empty() => {
                        if !live.is_expansion_of(prior) {
                            expanding = false;
                            break;
                        }
                        up |= live.extends_above(prior);
                        down |= live.extends_below(prior);
                    }
                    // Appeared this round: it grew the way the loop's deltas point.
                    (Some(live), _) if !live.is_empty() => {
                        up |= l.contains_add();
                        down |= l.contains_sub();
                    }
                    _ => {
                        expanding = false;
                        break;
                    }
                }
            }

            if !expanding {
                self.up_expansions[index] = 0;
                self.down_expansions[index] = 0;
                continue;
            }

            if up {
                self.up_expansions[index] += 1;
                l.mark_expanded_up();
            } else {
                self.up_expansions[index] = 0;
            }
            if down {
                self.down_expansions[index] += 1;
                l.mark_expanded_down();
            } else {
                self.down_expansions[index] = 0;
            }
            trace!(
                "Loop {}: up {} down {}",
                l,
                self.up_expansions[index],
                self.down_expansions[index]
            );
        }
    }
}

impl fmt::Display for ReachManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (node, reach) in &self.reaches {
            if !reach.is_reachable() {
                writeln!(f, "{}: unreachable", node)?;
                continue;
            }
            writeln!(f, "{}:", node)?;
            for (origin, intervals) in reach.iter() {
                writeln!(f, "  {}: {}", origin, intervals)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expression::Expression;

    /// `qi -> Q0`, `Q0 -> Q1 -> Q0` with the given deltas.
    fn two_node_loop(forward: Option<Expression>, backward: Option<Expression>) -> Automaton {
        let mut automaton = Automaton::new("loop");
        automaton
            .create_new_node("qi")
            .create_new_edge("qi", "Q0")
            .create_new_edge("Q0", "Q1")
            .create_new_edge("Q1", "Q0");
        automaton.set_node_invisible("qi").unwrap();
        automaton.add_operation_to_edge("Q0", "Q1", forward).unwrap();
        automaton.add_operation_to_edge("Q1", "Q0", backward).unwrap();
        automaton.find_initial_node().unwrap();
        automaton
    }

    fn eager(automaton: Automaton) -> ReachManager {
        let config = ReachConfig {
            acceleration_threshold: Some(1),
            ..Default::default()
        };
        ReachManager::with_config(automaton, config).unwrap()
    }

    fn interval(manager: &ReachManager, node: &str, origin: &str) -> Option<String> {
        manager.get_interval(node, origin).map(ToString::to_string)
    }

    #[test]
    fn test_requires_initial_node() {
        let automaton = Automaton::new("empty");
        assert_eq!(ReachManager::new(automaton).err(), Some(AutomatonError::NoInitialNode));
    }

    #[test]
    fn test_initialization() {
        let manager = ReachManager::new(two_node_loop(None, None)).unwrap();

        assert_eq!(manager.threshold(), 3 * (4 * 3 + 4));
        assert_eq!(manager.rounds(), 0);
        assert!(!manager.is_finished());
        assert_eq!(interval(&manager, "Q0", "Q0").as_deref(), Some("[0, 0]"));
        assert!(manager.get_reach("Q1").is_some_and(Reach::is_empty));
        assert!(manager.get_reach("qi").is_none());
        assert!(manager.is_reachable("Q0"));
        assert!(!manager.is_reachable("Q1"));
        assert_eq!(manager.expansions(0), Some((0, 0)));
        assert_eq!(manager.expansions(1), None);
    }

    #[test]
    fn test_accelerate_unbounded_up() {
        let mut manager = eager(two_node_loop(Some(Expression::add(2)), Some(Expression::add(2))));

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 2]"));
        assert_eq!(interval(&manager, "Q0", "Q1"), None);

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 2]"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, 4]"));
        assert_eq!(manager.expansions(0), Some((1, 0)));
        assert!(manager.automaton().loops()[0].is_expanded_up());

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, inf)"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, 4]"));

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, inf)"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, inf)"));

        assert!(manager.run());
        assert_eq!(manager.rounds(), 4);
    }

    #[test]
    fn test_accelerate_bounded_up() {
        let mut automaton = two_node_loop(Some(Expression::add(2)), Some(Expression::add(2)));
        automaton.add_condition_to_node("Q0", Some(Expression::le(200))).unwrap();
        let mut manager = eager(automaton);

        for _ in 0..3 {
            manager.update_automaton();
        }
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 6]"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, 200]"));

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 202]"));

        assert!(manager.run());
        assert_eq!(interval(&manager, "Q0", "Q0").as_deref(), Some("[0, 0]"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, 200]"));
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 202]"));
    }

    #[test]
    fn test_accelerate_bounded_down() {
        let mut automaton = two_node_loop(Some(Expression::sub(2)), Some(Expression::sub(2)));
        automaton.add_condition_to_node("Q1", Some(Expression::ge(-200))).unwrap();
        let mut manager = eager(automaton);

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("[-2, 0)"));
        manager.update_automaton();
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("[-4, 0)"));
        assert_eq!(manager.expansions(0), Some((0, 1)));
        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("[-200, 0)"));
        manager.update_automaton();
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("[-202, 0)"));

        assert!(manager.run());
    }

    #[test]
    fn test_accelerate_unbounded_down() {
        let mut manager = eager(two_node_loop(Some(Expression::sub(2)), Some(Expression::sub(2))));

        for _ in 0..3 {
            manager.update_automaton();
        }
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(-inf, 0)"));

        assert!(manager.run());
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(-inf, 0)"));
    }

    #[test]
    fn test_accelerate_both_ways() {
        let mut manager = eager(two_node_loop(Some(Expression::sub(2)), Some(Expression::add(2))));

        manager.update_automaton();
        manager.update_automaton();
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(-2, 2)"));
        assert_eq!(manager.expansions(0), Some((1, 1)));

        manager.update_automaton();
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(-inf, inf)"));

        assert!(manager.run());
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(-inf, inf)"));
    }

    #[test]
    fn test_converges_with_default_threshold() {
        let mut automaton = two_node_loop(Some(Expression::add(1)), None);
        automaton.add_condition_to_node("Q1", Some(Expression::le(5))).unwrap();
        let mut manager = ReachManager::new(automaton).unwrap();

        assert!(manager.run());
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("(0, 5]"));
        assert_eq!(interval(&manager, "Q0", "Q1").as_deref(), Some("(0, 5]"));
    }

    #[test]
    fn test_finished_is_final() {
        let mut manager = ReachManager::new(two_node_loop(None, None)).unwrap();
        assert!(manager.run());
        let rounds = manager.rounds();

        manager.update_automaton();
        assert!(manager.is_finished());
        assert_eq!(manager.rounds(), rounds);
    }

    #[test]
    fn test_max_rounds() {
        let config = ReachConfig {
            acceleration_threshold: Some(1000),
            max_rounds: Some(3),
        };
        let automaton = two_node_loop(Some(Expression::add(1)), Some(Expression::add(1)));
        let mut manager = ReachManager::with_config(automaton, config).unwrap();

        assert!(!manager.run());
        assert!(!manager.is_finished());
        assert_eq!(manager.rounds(), 3);
    }

    #[test]
    fn test_add_interval() {
        let mut automaton = two_node_loop(None, None);
        automaton.set_upper_bound(Bound::Finite(10));
        let mut manager = ReachManager::new(automaton).unwrap();

        manager.add_interval("Q1", "Q0", Intervals::new(5, true, 20, true));
        assert_eq!(interval(&manager, "Q1", "Q0").as_deref(), Some("[5, 10]"));
        manager.add_interval("nope", "Q0", Intervals::point(1));
        assert!(manager.get_reach("nope").is_none());
    }
}
