//! Reader for the DOT subset used to describe one-counter automata.
//!
//! The supported input looks like this:
//!
//! ```text
//! digraph counter {
//!     rankdir=LR;
//!     qi [style=invis];
//!     qi -> s0;
//!     s0 -> s1 [label="+1"];
//!     s1 [xlabel="<=200"];
//!     s1 -> s0;
//! }
//! ```
//!
//! - `label`/`xlabel` on an edge statement: a delta (`+k`, `-k`) becomes the
//!   operation of every edge of the chain. A guard (`<=k`, `>=k`, `=k`) cannot
//!   live on an edge, so each edge `a -> b` is split into `a -> _N -> b` with the
//!   guard on the fresh node `_N`.
//! - `label`/`xlabel` on a node statement: a guard becomes the node's condition.
//!   A delta cannot live on a node, so the node's outgoing edges are moved to a
//!   fresh node `_N` and the new edge `node -> _N` carries the delta.
//! - Any other label text is kept as a plain label.
//! - `style=invis` on a node statement marks the entry marker.
//! - Everything else (`rankdir`, `shape`, default `node [...]` statements, ...) is skipped.
//!
//! After parsing, the initial node is resolved and loops are discovered.

use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, trace};

use crate::automaton::Automaton;
use crate::error::ReadError;
use crate::expression::Expression;

/// Reads and parses the automaton stored in `path`.
pub fn read_automaton(path: impl AsRef<Path>) -> Result<Automaton, ReadError> {
    let path = path.as_ref();
    debug!("Reading automaton from {}", path.display());
    let input = fs::read_to_string(path)?;
    parse_automaton(&input)
}

/// Parses an automaton from its textual description.
pub fn parse_automaton(input: &str) -> Result<Automaton, ReadError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let name = parser.parse_header()?;

    let mut builder = Builder::new(name);
    while let Some(statement) = parser.parse_statement()? {
        builder.apply(statement)?;
    }
    builder.finish()
}

// ------------------------------------------------------------------------
// Tokens
// ------------------------------------------------------------------------

#[derive(Debug, Clone, Eq, PartialEq)]
enum Token {
    Id(String),
    Arrow,
    LBracket,
    RBracket,
    Equals,
    Comma,
    Semicolon,
    LBrace,
    RBrace,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(f, "{}", id),
            Token::Arrow => write!(f, "->"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Equals => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '+' | '-')
}

fn is_arrow(chars: &[char], i: usize) -> bool {
    chars[i] == '-' && matches!(chars.get(i + 1), Some('>') | Some('-'))
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ReadError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Line comments.
        if c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '"' {
            let start_line = line;
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(ReadError::UnterminatedString { line: start_line }),
                    Some('\\') if chars.get(i + 1) == Some(&'"') => {
                        text.push('"');
                        i += 2;
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        if c == '\n' {
                            line += 1;
                        }
                        text.push(c);
                        i += 1;
                    }
                }
            }
            tokens.push((start_line, Token::Id(text)));
            continue;
        }

        if is_arrow(&chars, i) {
            tokens.push((line, Token::Arrow));
            i += 2;
            continue;
        }

        let token = match c {
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '=' => Token::Equals,
            ',' => Token::Comma,
            ';' => Token::Semicolon,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) && !is_arrow(&chars, i) {
                    i += 1;
                }
                tokens.push((line, Token::Id(chars[start..i].iter().collect())));
                continue;
            }
            other => {
                return Err(ReadError::UnexpectedToken {
                    line,
                    token: other.to_string(),
                })
            }
        };
        tokens.push((line, token));
        i += 1;
    }

    Ok(tokens)
}

// ------------------------------------------------------------------------
// Statements
// ------------------------------------------------------------------------

#[derive(Debug)]
struct Statement {
    /// One node for a node statement, two or more for an edge chain.
    nodes: Vec<String>,
    attributes: Vec<(String, String)>,
}

impl Statement {
    fn is_edge(&self) -> bool {
        self.nodes.len() > 1
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Line of the upcoming token, or of the last one at the end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(line, _)| *line)
    }

    fn unexpected(&self) -> ReadError {
        ReadError::UnexpectedToken {
            line: self.line(),
            token: self.peek().map_or_else(|| "end of input".to_string(), ToString::to_string),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ReadError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_id(&mut self) -> Result<String, ReadError> {
        match self.peek() {
            Some(Token::Id(_)) => match self.next() {
                Some((_, Token::Id(id))) => Ok(id),
                _ => Err(self.unexpected()),
            },
            _ => Err(self.unexpected()),
        }
    }

    /// `[strict] digraph [NAME] {`, returning the name.
    fn parse_header(&mut self) -> Result<String, ReadError> {
        if self.peek() == Some(&Token::Id("strict".to_string())) {
            self.pos += 1;
        }
        match self.peek() {
            Some(Token::Id(keyword)) if keyword == "digraph" || keyword == "graph" => self.pos += 1,
            _ => return Err(ReadError::MissingHeader { line: self.line() }),
        }
        let name = match self.peek() {
            Some(Token::Id(_)) => self.expect_id()?,
            _ => "automaton".to_string(),
        };
        self.expect(Token::LBrace)?;
        Ok(name)
    }

    /// Parses the next node or edge statement, skipping everything that
    /// carries no information about the automaton. `None` at the end of the graph.
    fn parse_statement(&mut self) -> Result<Option<Statement>, ReadError> {
        loop {
            match self.peek() {
                None | Some(Token::RBrace) => return Ok(None),
                Some(Token::Semicolon) | Some(Token::Comma) => self.pos += 1,
                Some(Token::Id(id)) => {
                    // `rankdir=LR` and friends.
                    if self.peek_at(1) == Some(&Token::Equals) {
                        let id = id.clone();
                        self.pos += 2;
                        let value = self.expect_id()?;
                        trace!("Skipping graph attribute {}={}", id, value);
                        continue;
                    }
                    // Default attribute statements.
                    if matches!(id.as_str(), "node" | "edge" | "graph") && self.peek_at(1) == Some(&Token::LBracket) {
                        self.pos += 1;
                        self.parse_attributes()?;
                        continue;
                    }
                    return self.parse_chain().map(Some);
                }
                Some(_) => return Err(self.unexpected()),
            }
        }
    }

    fn parse_chain(&mut self) -> Result<Statement, ReadError> {
        let mut nodes = vec![self.expect_id()?];
        while self.peek() == Some(&Token::Arrow) {
            self.pos += 1;
            nodes.push(self.expect_id()?);
        }
        let attributes = self.parse_attributes()?;
        Ok(Statement { nodes, attributes })
    }

    /// Zero or more `[key=value, ...]` blocks.
    fn parse_attributes(&mut self) -> Result<Vec<(String, String)>, ReadError> {
        let mut attributes = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            loop {
                match self.peek() {
                    Some(Token::RBracket) => {
                        self.pos += 1;
                        break;
                    }
                    Some(Token::Comma) | Some(Token::Semicolon) => self.pos += 1,
                    Some(Token::Id(_)) => {
                        let key = self.expect_id()?;
                        self.expect(Token::Equals)?;
                        let value = self.expect_id()?;
                        attributes.push((key, value));
                    }
                    _ => return Err(self.unexpected()),
                }
            }
        }
        Ok(attributes)
    }
}

// ------------------------------------------------------------------------
// Automaton construction
// ------------------------------------------------------------------------

/// First line of a label, with Graphviz' `\n` escape treated as a line break.
fn first_line(label: &str) -> &str {
    let label = label.split("\\n").next().unwrap_or(label);
    label.lines().next().unwrap_or(label).trim()
}

struct Builder {
    automaton: Automaton,
    // Edges whose label is a guard, split after parsing.
    conditional_edges: Vec<(String, String, Expression)>,
    // Nodes whose label is a delta, split after parsing.
    operational_nodes: Vec<(String, Expression)>,
    fresh: usize,
}

impl Builder {
    fn new(name: String) -> Self {
        Self {
            automaton: Automaton::new(name),
            conditional_edges: Vec::new(),
            operational_nodes: Vec::new(),
            fresh: 0,
        }
    }

    fn apply(&mut self, statement: Statement) -> Result<(), ReadError> {
        for node in &statement.nodes {
            self.automaton.create_new_node(node);
        }
        for pair in statement.nodes.windows(2) {
            self.automaton.create_new_edge(&pair[0], &pair[1]);
        }

        for (key, value) in &statement.attributes {
            match key.as_str() {
                "label" | "xlabel" => self.apply_label(&statement, value)?,
                "style" if !statement.is_edge() && value.split(',').any(|s| s.trim() == "invis") => {
                    self.automaton.set_node_invisible(&statement.nodes[0])?;
                }
                _ => trace!("Ignoring attribute {}={}", key, value),
            }
        }
        Ok(())
    }

    fn apply_label(&mut self, statement: &Statement, label: &str) -> Result<(), ReadError> {
        let expression = first_line(label).parse::<Expression>().ok();

        if statement.is_edge() {
            for pair in statement.nodes.windows(2) {
                let (start, end) = (&pair[0], &pair[1]);
                match expression {
                    Some(guard) if guard.is_guard() => {
                        self.conditional_edges.push((start.clone(), end.clone(), guard));
                    }
                    Some(delta) => self.automaton.add_operation_to_edge(start, end, Some(delta))?,
                    None => self.automaton.add_label_to_edge(start, end, label)?,
                }
            }
        } else {
            let node = &statement.nodes[0];
            match expression {
                Some(guard) if guard.is_guard() => self.automaton.add_condition_to_node(node, Some(guard))?,
                Some(delta) => self.operational_nodes.push((node.clone(), delta)),
                None => self.automaton.add_label_to_node(node, label)?,
            }
        }
        Ok(())
    }

    fn fresh_node(&mut self) -> String {
        loop {
            let name = format!("_{}", self.fresh);
            self.fresh += 1;
            if !self.automaton.node_exists(&name) {
                return name;
            }
        }
    }

    fn finish(mut self) -> Result<Automaton, ReadError> {
        for (start, end, guard) in std::mem::take(&mut self.conditional_edges) {
            let Some(edge) = self.automaton.remove_edge(&start, &end) else {
                continue;
            };
            let fresh = self.fresh_node();
            debug!("Splitting {} -> {} at {} for guard {}", start, end, fresh, guard);
            self.automaton.create_new_edge(&start, &fresh).create_new_edge(&fresh, &end);
            self.automaton.add_condition_to_node(&fresh, Some(guard))?;
            self.automaton.add_operation_to_edge(&fresh, &end, edge.operation().copied())?;
        }

        for (node, delta) in std::mem::take(&mut self.operational_nodes) {
            let fresh = self.fresh_node();
            debug!("Splitting node {} at {} for delta {}", node, fresh, delta);
            self.automaton.move_edge_start(&node, &fresh);
            self.automaton.create_new_edge(&node, &fresh);
            self.automaton.add_operation_to_edge(&node, &fresh, Some(delta))?;
        }

        self.automaton.find_initial_node()?;
        self.automaton.initialize_loops()?;
        Ok(self.automaton)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::AutomatonError;

    #[test]
    fn test_tokenize() {
        let tokens: Vec<Token> = tokenize("a->b [label=\"say \\\"hi\\\"\", w=-5];")
            .unwrap()
            .into_iter()
            .map(|(_, token)| token)
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::Id("a".to_string()),
                Token::Arrow,
                Token::Id("b".to_string()),
                Token::LBracket,
                Token::Id("label".to_string()),
                Token::Equals,
                Token::Id("say \"hi\"".to_string()),
                Token::Comma,
                Token::Id("w".to_string()),
                Token::Equals,
                Token::Id("-5".to_string()),
                Token::RBracket,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_simple_automaton() {
        let automaton = parse_automaton(
            r#"
            digraph simple {
                rankdir=LR;
                node [shape=circle];
                qi [style=invis];
                qi -> s0;
                s0 -> s1 [label="+1"];
                s1 -> s2 [label="-3"];
                s2 -> s0 [label="Function Definition"];
                s1 [xlabel="<=200"];
            }
            "#,
        )
        .unwrap();

        assert_eq!(automaton.name(), "simple");
        assert_eq!(automaton.nr_of_nodes(), 4);
        assert_eq!(automaton.initial_node(), Some("s0"));
        assert!(automaton.is_invisible("qi"));
        assert_eq!(automaton.edge_operation("s0", "s1"), Some(&Expression::add(1)));
        assert_eq!(automaton.edge_operation("s1", "s2"), Some(&Expression::sub(3)));
        assert_eq!(automaton.edge_operation("s2", "s0"), None);
        assert_eq!(automaton.edge_label("s2", "s0"), Some("Function Definition"));
        assert_eq!(automaton.node_condition("s1"), Some(&Expression::le(200)));
        assert_eq!(automaton.loops().len(), 1);
        assert_eq!(automaton.loops()[0].nodes(), ["s0", "s1", "s2"]);
    }

    #[test]
    fn test_edge_chain_and_multiline_label() {
        let automaton = parse_automaton(
            "digraph g {\n qi [style=invis]\n qi -> a\n a -> b -> c [label=\"+2\\nincrement\"]\n}\n",
        )
        .unwrap();

        assert_eq!(automaton.edge_operation("a", "b"), Some(&Expression::add(2)));
        assert_eq!(automaton.edge_operation("b", "c"), Some(&Expression::add(2)));
    }

    #[test]
    fn test_guard_on_edge_is_split() {
        let automaton = parse_automaton(
            r#"digraph g {
                qi [style=invis]; qi -> a;
                a -> b [label="+1"];
                a -> b [xlabel=">=4"];
            }"#,
        )
        .unwrap();

        assert!(!automaton.edge_exists("a", "b"));
        assert!(automaton.edge_exists("a", "_0"));
        assert!(automaton.edge_exists("_0", "b"));
        assert_eq!(automaton.node_condition("_0"), Some(&Expression::ge(4)));
        assert_eq!(automaton.edge_operation("_0", "b"), Some(&Expression::add(1)));
    }

    #[test]
    fn test_delta_on_node_is_split() {
        let automaton = parse_automaton(
            r#"digraph g {
                qi [style=invis]; qi -> a;
                a [label="-1"];
                a -> b; a -> a;
                b -> _0 [label="<=3"];
            }"#,
        )
        .unwrap();

        // `_0` is taken by the input, the guard split uses `_1`.
        assert!(automaton.edge_exists("b", "_1"));
        assert_eq!(automaton.node_condition("_1"), Some(&Expression::le(3)));
        // Then the node split.
        assert_eq!(automaton.edge_operation("a", "_2"), Some(&Expression::sub(1)));
        assert!(automaton.edge_exists("_2", "a"));
        assert!(automaton.edge_exists("_2", "b"));
        assert!(!automaton.edge_exists("a", "b"));
        assert_eq!(automaton.outgoing_edges("a").count(), 1);
    }

    #[test]
    fn test_unsupported_operator_is_a_label() {
        let automaton = parse_automaton(
            r#"digraph g { qi [style=invis]; qi -> a; a [xlabel="<5"]; a -> b [label="!=2"]; }"#,
        )
        .unwrap();

        assert_eq!(automaton.node_condition("a"), None);
        assert_eq!(automaton.node_label("a"), Some("<5"));
        assert_eq!(automaton.edge_operation("a", "b"), None);
        assert_eq!(automaton.edge_label("a", "b"), Some("!=2"));
    }

    #[test]
    fn test_comments_are_skipped() {
        let automaton = parse_automaton(
            "// generated\ndigraph g {\n # entry\n qi [style=invis];\n qi -> a; // start\n}\n",
        )
        .unwrap();
        assert_eq!(automaton.initial_node(), Some("a"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_automaton("a -> b;"),
            Err(ReadError::MissingHeader { line: 1 })
        ));
        assert!(matches!(
            parse_automaton("digraph g {\n a [label=\"oops]\n}"),
            Err(ReadError::UnterminatedString { line: 2 })
        ));
        assert!(matches!(
            parse_automaton("digraph g {\n a -> ;\n}"),
            Err(ReadError::UnexpectedToken { line: 2, .. })
        ));
        assert!(matches!(
            parse_automaton("digraph g { a -> b; }"),
            Err(ReadError::Automaton(AutomatonError::NoInitialNode))
        ));
    }
}
