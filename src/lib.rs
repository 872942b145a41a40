//! # oca-reach: reachability for one-counter automata
//!
//! **`oca-reach`** decides which nodes of a *one-counter automaton* can be
//! reached, and with which counter values. The automaton is a directed graph
//! whose edges may add or subtract a constant (`+k`, `-k`) and whose nodes may
//! guard the counter on entry (`<=k`, `>=k`, `=k`), optionally within global
//! bounds on the counter.
//!
//! The analysis is an abstract interpretation over unions of intervals:
//! every node keeps, per predecessor, the set of counter values it can be
//! entered with. Rounds propagate these sets along the edges until nothing
//! changes. Loops that keep pushing the counter in one direction are
//! *accelerated*: the growing bound jumps to the tightest guard on the loop,
//! or to infinity, so the analysis terminates even for unbounded loops.
//!
//! ## Basic Usage
//!
//! ```rust
//! use oca_reach::manager::ReachManager;
//! use oca_reach::reader::parse_automaton;
//!
//! let automaton = parse_automaton(
//!     r#"digraph counter {
//!         qi [style=invis];
//!         qi -> s0;
//!         s0 -> s1 [label="+1"];
//!         s1 [xlabel="<=200"];
//!         s1 -> s0;
//!     }"#,
//! )
//! .unwrap();
//!
//! let mut manager = ReachManager::new(automaton).unwrap();
//! manager.run();
//!
//! assert!(manager.is_reachable("s1"));
//! assert_eq!(manager.get_interval("s1", "s0").unwrap().to_string(), "(0, 200]");
//! ```
//!
//! ## Core Components
//!
//! - **[`intervals`]**: the interval lattice, built on [`interval`] and [`bound`].
//! - **[`automaton`]**: the graph model, with [`loops`] for cycle discovery.
//! - **[`manager`]**: the fixpoint solver with loop acceleration.
//! - **[`reader`]** and **[`dot`]**: reading and writing automata in DOT format.

pub mod automaton;
pub mod bound;
pub mod dot;
pub mod edge;
pub mod error;
pub mod expression;
pub mod interval;
pub mod intervals;
pub mod loops;
pub mod manager;
pub mod node;
pub mod reach;
pub mod reader;
