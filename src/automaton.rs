//! The one-counter automaton graph.
//!
//! Nodes and edges are owned by the [`Automaton`] and referenced everywhere
//! else by node name. Edges live in an adjacency map `start -> end -> Edge`,
//! so there is at most one edge per ordered pair of nodes.
//!
//! Both maps are ordered by name, which fixes the iteration order of nodes
//! and outgoing edges and makes loop discovery reproducible.
//!
//! # Examples
//!
//! ```
//! use oca_reach::automaton::Automaton;
//! use oca_reach::expression::Expression;
//!
//! let mut automaton = Automaton::new("counter");
//! automaton
//!     .create_new_node("qi")
//!     .create_new_edge("qi", "q0")
//!     .create_new_edge("q0", "q1")
//!     .create_new_edge("q1", "q0");
//! automaton.set_node_invisible("qi").unwrap();
//! automaton.add_operation_to_edge("q0", "q1", Some(Expression::add(1))).unwrap();
//! automaton.add_condition_to_node("q1", Some(Expression::le(10))).unwrap();
//!
//! automaton.find_initial_node().unwrap();
//! automaton.initialize_loops().unwrap();
//!
//! assert_eq!(automaton.initial_node(), Some("q0"));
//! assert_eq!(automaton.loops().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use crate::bound::Bound;
use crate::edge::Edge;
use crate::error::AutomatonError;
use crate::expression::Expression;
use crate::loops::{Loop, LoopFinder};
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct Automaton {
    name: String,
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<String, BTreeMap<String, Edge>>,
    initial_node: Option<String>,
    lower_bound: Bound,
    upper_bound: Bound,
    initial_value: i64,
    loops: Option<Vec<Loop>>,
}

impl Automaton {
    /// Creates an empty automaton with unbounded counter and initial value 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_bounds(name, Bound::NegInf, Bound::PosInf)
    }

    pub fn with_bounds(name: impl Into<String>, lower_bound: Bound, upper_bound: Bound) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            initial_node: None,
            lower_bound,
            upper_bound,
            initial_value: 0,
            loops: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ----------------------------------------------------------------------
    // Nodes
    // ----------------------------------------------------------------------

    pub fn node_exists(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Adds a node named `name`. Existing nodes are left untouched.
    pub fn create_new_node(&mut self, name: &str) -> &mut Self {
        if !self.nodes.contains_key(name) {
            self.nodes.insert(name.to_string(), Node::new(name));
        }
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Node, AutomatonError> {
        self.nodes
            .get_mut(name)
            .ok_or_else(|| AutomatonError::UnknownNode(name.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Names of the nodes that take part in the analysis.
    pub fn visible_nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.values().filter(|n| !n.is_invisible()).map(Node::name)
    }

    pub fn nr_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_label_to_node(&mut self, name: &str, label: impl Into<String>) -> Result<(), AutomatonError> {
        self.node_mut(name)?.set_label(label);
        Ok(())
    }

    pub fn node_label(&self, name: &str) -> Option<&str> {
        self.nodes.get(name).and_then(Node::label)
    }

    pub fn add_condition_to_node(&mut self, name: &str, condition: Option<Expression>) -> Result<(), AutomatonError> {
        self.node_mut(name)?.set_condition(condition);
        Ok(())
    }

    pub fn node_condition(&self, name: &str) -> Option<&Expression> {
        self.nodes.get(name).and_then(Node::condition)
    }

    pub fn set_node_invisible(&mut self, name: &str) -> Result<(), AutomatonError> {
        self.node_mut(name)?.set_invisible();
        Ok(())
    }

    /// Unknown nodes are reported as visible.
    pub fn is_invisible(&self, name: &str) -> bool {
        self.nodes.get(name).is_some_and(Node::is_invisible)
    }

    pub fn is_initial(&self, name: &str) -> bool {
        self.initial_node.as_deref() == Some(name)
    }

    // ----------------------------------------------------------------------
    // Edges
    // ----------------------------------------------------------------------

    pub fn edge_exists(&self, start: &str, end: &str) -> bool {
        self.edge(start, end).is_some()
    }

    /// Adds the edge `start -> end`, creating missing endpoints. Existing edges are left untouched.
    pub fn create_new_edge(&mut self, start: &str, end: &str) -> &mut Self {
        self.create_new_node(start).create_new_node(end);
        self.edges
            .entry(start.to_string())
            .or_default()
            .entry(end.to_string())
            .or_insert_with(|| Edge::new(start, end));
        self
    }

    pub fn remove_edge(&mut self, start: &str, end: &str) -> Option<Edge> {
        let outgoing = self.edges.get_mut(start)?;
        let edge = outgoing.remove(end);
        if outgoing.is_empty() {
            self.edges.remove(start);
        }
        edge
    }

    /// Re-attaches every edge leaving `old_start` so that it leaves `new_start` instead.
    pub fn move_edge_start(&mut self, old_start: &str, new_start: &str) {
        let Some(outgoing) = self.edges.remove(old_start) else {
            return;
        };
        self.create_new_node(new_start);
        let target = self.edges.entry(new_start.to_string()).or_default();
        for (end, edge) in outgoing {
            target.insert(end, edge.with_start(new_start));
        }
    }

    pub fn edge(&self, start: &str, end: &str) -> Option<&Edge> {
        self.edges.get(start).and_then(|outgoing| outgoing.get(end))
    }

    fn edge_mut(&mut self, start: &str, end: &str) -> Result<&mut Edge, AutomatonError> {
        self.edges
            .get_mut(start)
            .and_then(|outgoing| outgoing.get_mut(end))
            .ok_or_else(|| AutomatonError::UnknownEdge(start.to_string(), end.to_string()))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flat_map(|outgoing| outgoing.values())
    }

    pub fn nr_of_edges(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn outgoing_edges<'a>(&'a self, start: &str) -> impl Iterator<Item = &'a Edge> {
        self.edges.get(start).into_iter().flat_map(|outgoing| outgoing.values())
    }

    /// Edges ending in `end`, i.e. the ways a node can be entered.
    pub fn proceeding_edges<'a>(&'a self, end: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter_map(move |outgoing| outgoing.get(end))
    }

    pub fn add_label_to_edge(&mut self, start: &str, end: &str, label: impl Into<String>) -> Result<(), AutomatonError> {
        self.edge_mut(start, end)?.set_label(label);
        Ok(())
    }

    pub fn edge_label(&self, start: &str, end: &str) -> Option<&str> {
        self.edge(start, end).and_then(Edge::label)
    }

    pub fn add_operation_to_edge(
        &mut self,
        start: &str,
        end: &str,
        operation: Option<Expression>,
    ) -> Result<(), AutomatonError> {
        self.edge_mut(start, end)?.set_operation(operation);
        Ok(())
    }

    pub fn edge_operation(&self, start: &str, end: &str) -> Option<&Expression> {
        self.edge(start, end).and_then(Edge::operation)
    }

    // ----------------------------------------------------------------------
    // Initial node, bounds, loops
    // ----------------------------------------------------------------------

    /// Resolves the initial node: the target of the edge leaving the invisible entry marker.
    ///
    /// The entry marker is the (single) invisible node. Without one, or when it
    /// has no successor, there is no meaningful analysis and this fails with
    /// [`AutomatonError::NoInitialNode`].
    pub fn find_initial_node(&mut self) -> Result<(), AutomatonError> {
        let initial = {
            let mut entries = self.nodes.values().filter(|n| n.is_invisible());
            let entry = entries.next().ok_or(AutomatonError::NoInitialNode)?;
            if let Some(other) = entries.next() {
                warn!("Multiple entry markers, using '{}' and ignoring '{}'", entry.name(), other.name());
            }

            let mut targets = self.outgoing_edges(entry.name()).map(Edge::end);
            let initial = targets.next().ok_or(AutomatonError::NoInitialNode)?;
            if targets.next().is_some() {
                warn!("Entry marker '{}' has several successors, using '{}'", entry.name(), initial);
            }
            initial.to_string()
        };

        debug!("Initial node: {}", initial);
        self.initial_node = Some(initial);
        Ok(())
    }

    pub fn initial_node(&self) -> Option<&str> {
        self.initial_node.as_deref()
    }

    pub fn lower_bound(&self) -> Bound {
        self.lower_bound
    }

    pub fn set_lower_bound(&mut self, lower_bound: Bound) {
        self.lower_bound = lower_bound;
    }

    pub fn upper_bound(&self) -> Bound {
        self.upper_bound
    }

    pub fn set_upper_bound(&mut self, upper_bound: Bound) {
        self.upper_bound = upper_bound;
    }

    pub fn initial_value(&self) -> i64 {
        self.initial_value
    }

    pub fn set_initial_value(&mut self, initial_value: i64) {
        self.initial_value = initial_value;
    }

    /// Discovers and classifies the loops reachable from the initial node.
    ///
    /// Requires the initial node to be resolved.
    pub fn initialize_loops(&mut self) -> Result<(), AutomatonError> {
        let loops = LoopFinder::new(self)?.find_loops();
        debug!("Found {} loop(s) in '{}'", loops.len(), self.name);
        self.loops = Some(loops);
        Ok(())
    }

    pub fn has_loops(&self) -> bool {
        self.loops.is_some()
    }

    pub fn loops(&self) -> &[Loop] {
        self.loops.as_deref().unwrap_or_default()
    }

    pub(crate) fn loops_mut(&mut self) -> &mut [Loop] {
        self.loops.as_deref_mut().unwrap_or_default()
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "automaton {} (counter in [{}, {}], starts at {})", self.name, self.lower_bound, self.upper_bound, self.initial_value)?;
        writeln!(f, "nodes:")?;
        for node in self.nodes.values() {
            let marker = if node.is_invisible() {
                " (invisible)"
            } else if self.is_initial(node.name()) {
                " (initial)"
            } else {
                ""
            };
            writeln!(f, "  {}{}", node, marker)?;
        }
        writeln!(f, "edges:")?;
        for edge in self.edges() {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn chain() -> Automaton {
        let mut automaton = Automaton::with_bounds("test", Bound::ZERO, Bound::Finite(10));
        automaton
            .create_new_node("qi")
            .create_new_node("q0")
            .create_new_node("q1")
            .create_new_node("q2")
            .create_new_edge("q0", "q1")
            .create_new_edge("q1", "q2")
            .create_new_edge("qi", "q0");
        automaton.set_node_invisible("qi").unwrap();
        automaton
    }

    #[test]
    fn test_nodes_and_edges() {
        let automaton = chain();

        assert_eq!(automaton.nr_of_nodes(), 4);
        assert_eq!(automaton.nr_of_edges(), 3);
        assert!(automaton.edge_exists("q0", "q1"));
        assert!(!automaton.edge_exists("q1", "q0"));
        assert!(automaton.is_invisible("qi"));
        assert!(!automaton.is_invisible("q0"));
        assert_eq!(automaton.visible_nodes().collect::<Vec<_>>(), vec!["q0", "q1", "q2"]);
    }

    #[test]
    fn test_duplicate_edge_is_kept_once() {
        let mut automaton = chain();
        automaton.add_operation_to_edge("q0", "q1", Some(Expression::add(2))).unwrap();
        automaton.create_new_edge("q0", "q1");

        assert_eq!(automaton.nr_of_edges(), 3);
        assert_eq!(automaton.edge_operation("q0", "q1"), Some(&Expression::add(2)));
    }

    #[test]
    fn test_labels_and_conditions() {
        let mut automaton = chain();
        automaton.add_label_to_node("q1", "Function Definition").unwrap();
        automaton.add_condition_to_node("q2", Some(Expression::ge(3))).unwrap();
        automaton.add_label_to_edge("q1", "q2", "this is a random label").unwrap();

        assert_eq!(automaton.node_label("q1"), Some("Function Definition"));
        assert_eq!(automaton.node_condition("q2"), Some(&Expression::ge(3)));
        assert_eq!(automaton.node_condition("q1"), None);
        assert_eq!(automaton.edge_label("q1", "q2"), Some("this is a random label"));

        assert_eq!(
            automaton.add_label_to_node("nope", "x"),
            Err(AutomatonError::UnknownNode("nope".to_string()))
        );
        assert_eq!(
            automaton.add_operation_to_edge("q2", "q0", None),
            Err(AutomatonError::UnknownEdge("q2".to_string(), "q0".to_string()))
        );
    }

    #[test]
    fn test_proceeding_edges() {
        let mut automaton = chain();
        automaton.create_new_edge("q2", "q1");

        let mut starts: Vec<&str> = automaton.proceeding_edges("q1").map(Edge::start).collect();
        starts.sort();
        assert_eq!(starts, vec!["q0", "q2"]);
        assert_eq!(automaton.proceeding_edges("qi").count(), 0);
    }

    #[test]
    fn test_remove_and_move_edges() {
        let mut automaton = chain();
        automaton.add_operation_to_edge("q1", "q2", Some(Expression::sub(1))).unwrap();

        automaton.move_edge_start("q1", "_0");
        assert!(!automaton.edge_exists("q1", "q2"));
        assert!(automaton.edge_exists("_0", "q2"));
        assert_eq!(automaton.edge("_0", "q2").map(Edge::start), Some("_0"));
        assert_eq!(automaton.edge_operation("_0", "q2"), Some(&Expression::sub(1)));

        assert!(automaton.remove_edge("_0", "q2").is_some());
        assert!(automaton.remove_edge("_0", "q2").is_none());
        assert_eq!(automaton.outgoing_edges("_0").count(), 0);
    }

    #[test]
    fn test_find_initial_node() {
        let mut automaton = chain();
        assert_eq!(automaton.initial_node(), None);

        automaton.find_initial_node().unwrap();
        assert_eq!(automaton.initial_node(), Some("q0"));
        assert!(automaton.is_initial("q0"));
    }

    #[test]
    fn test_missing_initial_node() {
        let mut automaton = Automaton::new("test");
        automaton.create_new_edge("q0", "q1");
        assert_eq!(automaton.find_initial_node(), Err(AutomatonError::NoInitialNode));

        // An invisible node without outgoing edges does not help either.
        automaton.create_new_node("qi");
        automaton.set_node_invisible("qi").unwrap();
        assert_eq!(automaton.find_initial_node(), Err(AutomatonError::NoInitialNode));
        assert_eq!(automaton.initialize_loops(), Err(AutomatonError::NoInitialNode));
    }

    #[test]
    fn test_entry_marker_without_successor_is_fatal() {
        let mut automaton = chain();
        // Sorts before the real marker.
        automaton.create_new_node("a_marker");
        automaton.set_node_invisible("a_marker").unwrap();
        assert_eq!(automaton.find_initial_node(), Err(AutomatonError::NoInitialNode));
        assert_eq!(automaton.initial_node(), None);
    }

    #[test]
    fn test_bounds_and_initial_value() {
        let mut automaton = Automaton::new("test");
        assert_eq!(automaton.lower_bound(), Bound::NegInf);
        assert_eq!(automaton.upper_bound(), Bound::PosInf);
        assert_eq!(automaton.initial_value(), 0);

        automaton.set_lower_bound(Bound::Finite(-50));
        automaton.set_upper_bound(Bound::Finite(150));
        automaton.set_initial_value(5);
        assert_eq!(automaton.lower_bound(), Bound::Finite(-50));
        assert_eq!(automaton.upper_bound(), Bound::Finite(150));
        assert_eq!(automaton.initial_value(), 5);
    }
}
