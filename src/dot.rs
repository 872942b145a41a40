//! Automaton to DOT (Graphviz) conversion.
//!
//! [`Automaton::to_dot`] produces the same DOT subset that
//! [`parse_automaton`][crate::reader::parse_automaton] reads, so a written
//! automaton can be read back:
//! - guards are written as the node's `xlabel`,
//! - deltas are written as the edge's `label`,
//! - the entry marker is written with `style=invis`.
//!
//! [`ReachManager::to_dot`] renders the solved state instead: every visible
//! node is labelled with its per-origin intervals, and unreachable nodes are
//! drawn with the unreachable style.
//!
//! # Examples
//!
//! ```
//! use oca_reach::reader::parse_automaton;
//!
//! let automaton = parse_automaton(
//!     "digraph g { qi [style=invis]; qi -> a; a -> b [label=\"+1\"]; b [xlabel=\"<=5\"]; }",
//! )
//! .unwrap();
//!
//! let dot = automaton.to_dot().unwrap();
//! let again = parse_automaton(&dot).unwrap();
//! assert_eq!(again.nr_of_edges(), automaton.nr_of_edges());
//! // Render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::automaton::Automaton;
use crate::manager::ReachManager;

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use oca_reach::automaton::Automaton;
/// use oca_reach::dot::DotConfig;
///
/// let automaton = Automaton::new("empty");
/// let config = DotConfig {
///     rankdir: "TB",
///     ..DotConfig::default()
/// };
/// let dot = automaton.to_dot_with_config(&config).unwrap();
/// assert!(dot.contains("rankdir=TB;"));
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Graph direction (default: "LR")
    pub rankdir: &'static str,
    /// Shape for ordinary nodes (default: "circle")
    pub node_shape: &'static str,
    /// Shape for the initial node (default: "doublecircle")
    pub initial_shape: &'static str,
    /// Style for nodes found unreachable by the solver (default: "dashed")
    pub unreachable_style: &'static str,
    /// Whether plain (non-expression) labels are written (default: true)
    pub show_labels: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            rankdir: "LR",
            node_shape: "circle",
            initial_shape: "doublecircle",
            unreachable_style: "dashed",
            show_labels: true,
        }
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}

fn write_graph(automaton: &Automaton, config: &DotConfig, manager: Option<&ReachManager>) -> Result<String, std::fmt::Error> {
    let mut dot = String::new();
    writeln!(dot, "digraph {} {{", quote(automaton.name()))?;
    writeln!(dot, "rankdir={};", config.rankdir)?;
    writeln!(dot, "node [shape={}];", config.node_shape)?;

    for node in automaton.nodes() {
        let mut attributes: Vec<String> = Vec::new();
        if node.is_invisible() {
            attributes.push("style=invis".to_string());
        } else if automaton.is_initial(node.name()) {
            attributes.push(format!("shape={}", config.initial_shape));
        }
        if let Some(condition) = node.condition() {
            attributes.push(format!("xlabel={}", quote(&condition.to_string())));
        }

        match manager {
            Some(manager) if !node.is_invisible() => {
                let mut label = node.name().to_string();
                if let Some(reach) = manager.get_reach(node.name()) {
                    for (origin, intervals) in reach.iter() {
                        write!(label, "\\n{}: {}", origin, intervals)?;
                    }
                }
                attributes.push(format!("label={}", quote(&label)));
                if !manager.is_reachable(node.name()) {
                    attributes.push(format!("style={}", config.unreachable_style));
                }
            }
            _ => {
                if let (true, Some(label)) = (config.show_labels, node.label()) {
                    attributes.push(format!("label={}", quote(label)));
                }
            }
        }

        if attributes.is_empty() {
            writeln!(dot, "{};", quote(node.name()))?;
        } else {
            writeln!(dot, "{} [{}];", quote(node.name()), attributes.join(", "))?;
        }
    }

    for edge in automaton.edges() {
        let label = match (edge.operation(), edge.label()) {
            (Some(operation), _) => Some(operation.to_string()),
            (None, Some(label)) if config.show_labels => Some(label.to_string()),
            _ => None,
        };
        match label {
            Some(label) => writeln!(dot, "{} -> {} [label={}];", quote(edge.start()), quote(edge.end()), quote(&label))?,
            None => writeln!(dot, "{} -> {};", quote(edge.start()), quote(edge.end()))?,
        }
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

impl Automaton {
    /// Converts the automaton to DOT format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        write_graph(self, config, None)
    }
}

impl ReachManager {
    /// Converts the automaton to DOT format, annotated with the current reach of every node.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        write_graph(self.automaton(), config, Some(self))
    }
}
