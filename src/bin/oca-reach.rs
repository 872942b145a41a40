//! Reachability analysis of one-counter automata.
//!
//! Run with:
//! ```bash
//! cargo run --release -- tests/input/bounded_node.dot --high 150
//! ```

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use oca_reach::bound::Bound;
use oca_reach::manager::{ReachConfig, ReachManager};
use oca_reach::reader::read_automaton;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Analyze the reachability of nodes in a continuous one-counter automaton"
)]
struct Cli {
    /// Path of the .dot file containing the automaton under analysis
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Node under test, defaults to all nodes
    #[arg(long)]
    node: Option<String>,

    /// Initial value of the counter
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    start: i64,

    /// Lower bound of the counter
    #[arg(long, default_value = "-inf", allow_hyphen_values = true)]
    low: Bound,

    /// Upper bound of the counter
    #[arg(long, default_value = "inf", allow_hyphen_values = true)]
    high: Bound,

    /// Expanding rounds before a loop is accelerated (default: scaled with the automaton size)
    #[arg(long, value_name = "INT")]
    threshold: Option<usize>,

    /// Give up after this many rounds
    #[arg(long, value_name = "INT")]
    max_rounds: Option<usize>,

    /// Write the annotated automaton to this DOT file
    #[arg(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Print debug output
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        if cli.debug {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    log::info!("Reading automaton from {:?}", cli.input);
    let mut automaton = read_automaton(&cli.input)?;
    log::debug!("{}", automaton);

    automaton.set_lower_bound(cli.low);
    automaton.set_upper_bound(cli.high);
    automaton.set_initial_value(cli.start);

    let config = ReachConfig {
        acceleration_threshold: cli.threshold,
        max_rounds: cli.max_rounds,
    };
    let mut manager = ReachManager::with_config(automaton, config)?;
    if !manager.run() {
        log::warn!("Stopped before reaching a fixpoint, results are incomplete");
    }

    if let Some(path) = &cli.dot {
        std::fs::write(path, manager.to_dot()?)?;
        log::info!("Annotated automaton written to {:?}", path);
    }

    let nodes: Vec<String> = match &cli.node {
        Some(node) => vec![node.clone()],
        None => manager.automaton().visible_nodes().map(str::to_string).collect(),
    };
    for node in &nodes {
        match manager.get_reach(node) {
            Some(reach) if reach.is_reachable() => {
                println!("The node {} was found to be reachable with the following reaches:", node);
                for (origin, intervals) in reach.iter() {
                    println!("{}: {}", origin, intervals);
                }
            }
            _ => println!("The node {} was found to be not reachable", node),
        }
        println!();
    }

    Ok(())
}
