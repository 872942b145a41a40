//! Cycle discovery and classification.
//!
//! [`LoopFinder`] walks the automaton from its initial node and records every
//! cycle closed by an edge back onto the current path. Each cycle is then
//! classified into a [`Loop`]: the direction in which it moves the counter and
//! the tightest guard on its nodes, which bound how far acceleration may jump.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use log::{debug, trace};

use crate::automaton::Automaton;
use crate::error::AutomatonError;
use crate::expression::Operator;

/// Tightest guard of a loop in one direction.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LoopBound {
    /// Guard constant.
    pub value: i64,
    /// Node carrying the guard.
    pub node: String,
    /// Predecessor of `node` on the cycle.
    pub preceding: String,
}

/// An ordered cycle `n0 -> n1 -> ... -> n(k-1) -> n0`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Loop {
    nodes: Vec<String>,
    contains_add: bool,
    contains_sub: bool,
    max_bound: Option<LoopBound>,
    min_bound: Option<LoopBound>,
    expanded_up: bool,
    expanded_down: bool,
}

impl Loop {
    /// Classifies the cycle `nodes` against the edges and guards of `automaton`.
    pub fn new(nodes: Vec<String>, automaton: &Automaton) -> Self {
        let k = nodes.len();
        let mut contains_add = false;
        let mut contains_sub = false;
        let mut max_bound: Option<LoopBound> = None;
        let mut min_bound: Option<LoopBound> = None;

        for (i, node) in nodes.iter().enumerate() {
            let next = &nodes[(i + 1) % k];
            let delta = automaton.edge(node, next).map_or(0, |e| e.delta());
            contains_add |= delta > 0;
            contains_sub |= delta < 0;

            let Some(condition) = automaton.node_condition(node) else {
                continue;
            };
            let bound = || LoopBound {
                value: condition.constant(),
                node: node.clone(),
                preceding: nodes[(i + k - 1) % k].clone(),
            };
            let c = condition.constant();
            if matches!(condition.op(), Operator::Le | Operator::Eq) && max_bound.as_ref().map_or(true, |b| c < b.value) {
                max_bound = Some(bound());
            }
            if matches!(condition.op(), Operator::Ge | Operator::Eq) && min_bound.as_ref().map_or(true, |b| c > b.value) {
                min_bound = Some(bound());
            }
        }

        Self {
            nodes,
            contains_add,
            contains_sub,
            max_bound,
            min_bound,
            expanded_up: false,
            expanded_down: false,
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }

    /// The cycle's edges as `(start, end)` pairs, closing edge included.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        let k = self.nodes.len();
        (0..k).map(move |i| (self.nodes[i].as_str(), self.nodes[(i + 1) % k].as_str()))
    }

    pub fn contains_add(&self) -> bool {
        self.contains_add
    }

    pub fn contains_sub(&self) -> bool {
        self.contains_sub
    }

    /// Smallest `<=` (or `=`) guard on the cycle; `None` means unbounded upward.
    pub fn max_bound(&self) -> Option<&LoopBound> {
        self.max_bound.as_ref()
    }

    /// Largest `>=` (or `=`) guard on the cycle; `None` means unbounded downward.
    pub fn min_bound(&self) -> Option<&LoopBound> {
        self.min_bound.as_ref()
    }

    pub fn is_expanded_up(&self) -> bool {
        self.expanded_up
    }

    pub fn is_expanded_down(&self) -> bool {
        self.expanded_down
    }

    pub(crate) fn mark_expanded_up(&mut self) {
        self.expanded_up = true;
    }

    pub(crate) fn mark_expanded_down(&mut self) {
        self.expanded_down = true;
    }
}

impl fmt::Display for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{} -> ", node)?;
        }
        match self.first() {
            Some(first) => write!(f, "{}", first),
            None => Ok(()),
        }
    }
}

/// Enumerates the cycles reachable from the initial node.
///
/// Frontier nodes are explored in the order they were first discovered. A node
/// discovered again while still pending keeps its place in the queue but takes
/// the newer path. Edges into an already explored node that is not on the
/// current path close no cycle and are skipped.
pub struct LoopFinder<'a> {
    automaton: &'a Automaton,
    initial: &'a str,
}

impl<'a> LoopFinder<'a> {
    pub fn new(automaton: &'a Automaton) -> Result<Self, AutomatonError> {
        let initial = automaton.initial_node().ok_or(AutomatonError::NoInitialNode)?;
        Ok(Self { automaton, initial })
    }

    /// Raw cycles as lists of node names.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut pending: VecDeque<(&str, Vec<&str>)> = VecDeque::new();
        let mut cycles = Vec::new();

        let mut current = self.initial;
        let mut chain: Vec<&str> = Vec::new();
        loop {
            visited.insert(current);
            chain.push(current);

            for edge in self.automaton.outgoing_edges(current) {
                let end = edge.end();
                if !visited.contains(end) {
                    match pending.iter_mut().find(|(node, _)| *node == end) {
                        Some(entry) => entry.1 = chain.clone(),
                        None => pending.push_back((end, chain.clone())),
                    }
                } else if let Some(pos) = chain.iter().rposition(|&node| node == end) {
                    let cycle: Vec<String> = chain[pos..].iter().map(|s| s.to_string()).collect();
                    trace!("Cycle closed by {} -> {}: {:?}", current, end, cycle);
                    cycles.push(cycle);
                } else {
                    trace!("Skipping edge {} -> {} into an explored branch", current, end);
                }
            }

            match pending.pop_front() {
                Some((node, path)) => {
                    current = node;
                    chain = path;
                }
                None => break,
            }
        }

        debug!("Found {} cycle(s) from '{}'", cycles.len(), self.initial);
        cycles
    }

    /// Cycles classified into [`Loop`]s.
    pub fn find_loops(&self) -> Vec<Loop> {
        self.find_cycles()
            .into_iter()
            .map(|nodes| Loop::new(nodes, self.automaton))
            .collect()
    }
}
