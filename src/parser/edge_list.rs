// edge_list.rs
//
// Line-oriented edge-list reader (jdeps / DOT flavoured):
// - "a.b.Source" -> "a.c.Target"        one dependency
// - "A" -> "B"; "B" -> "C"               several per line
// - "A" -> "B" [label="x"];              attribute blocks are ignored
// - "a.B (x.jar)" -> "c.D (y.jar)"       text after the name is ignored
// - // and # comments, blank lines       skipped
// - digraph "name" {   and   }           skipped
//
// Notes:
// - Names: [A-Za-z0-9_.$]+, ending in [A-Za-z0-9_], no empty segment,
//   at most MAX_NAME_DEPTH segments
// - A malformed line is reported as a warning and skipped as a whole.
//   Reading never fails.

use std::fmt;

use tracing::{debug, warn};

use crate::graph::{DependencyGraph, MAX_NAME_DEPTH, name_depth};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub line: usize, // 1-based
    pub col: usize,  // 1-based best-effort
    pub msg: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Skipped line {}:{}: {}", self.line, self.col, self.msg)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeList {
    pub graph: DependencyGraph,
    pub warnings: Vec<ParseWarning>,
}

pub fn parse_edge_list(input: &str) -> EdgeList {
    let mut p = Parser::new(input);
    let mut out = EdgeList::default();

    while !p.eof() {
        match p.parse_line() {
            Ok(pairs) => {
                for (source, target) in pairs {
                    if let Err(e) = out.graph.add_link(source, target) {
                        out.warnings.push(p.warning(1, e.to_string()));
                    }
                }
            }
            Err(w) => {
                warn!(line = w.line, col = w.col, msg = %w.msg, "skipping malformed line");
                out.warnings.push(w);
            }
        }
        p.advance();
    }

    debug!(links = out.graph.link_count(), warnings = out.warnings.len(), "parsed edge list");
    out
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    i: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let lines = input
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect::<Vec<_>>();
        Self { lines, i: 0 }
    }

    fn eof(&self) -> bool {
        self.i >= self.lines.len()
    }

    fn line_no(&self) -> usize {
        self.i + 1
    }

    fn advance(&mut self) {
        self.i += 1;
    }

    fn warning(&self, col: usize, msg: impl Into<String>) -> ParseWarning {
        ParseWarning {
            line: self.line_no(),
            col: col.max(1),
            msg: msg.into(),
        }
    }

    fn err<T>(&self, col: usize, msg: impl Into<String>) -> Result<T, ParseWarning> {
        Err(self.warning(col, msg))
    }

    /// All pairs on the current line, or a warning if any part of it is malformed.
    fn parse_line(&self) -> Result<Vec<(&'a str, &'a str)>, ParseWarning> {
        let raw = self.lines[self.i];
        let t = raw.trim();

        if t.is_empty() || is_comment(t) || t == "}" || is_graph_header(t) {
            return Ok(Vec::new());
        }

        let mut cur = Cursor { s: raw, pos: 0 };
        let mut pairs = Vec::new();

        loop {
            cur.skip_ws();
            if cur.at_end() || is_comment(cur.rest()) {
                break;
            }

            let source = self.quoted_name(&mut cur)?;
            cur.skip_ws();
            if !cur.eat("->") {
                return self.err(cur.col(), "expected '->' after source name");
            }
            cur.skip_ws();
            let target = self.quoted_name(&mut cur)?;

            cur.skip_ws();
            if cur.peek() == Some('[') {
                let open = cur.col();
                match cur.rest().find(']') {
                    Some(end) => cur.pos += end + 1,
                    None => return self.err(open, "unterminated attribute block"),
                }
                cur.skip_ws();
            }
            cur.eat(";");

            pairs.push((source, target));
        }

        Ok(pairs)
    }

    fn quoted_name(&self, cur: &mut Cursor<'a>) -> Result<&'a str, ParseWarning> {
        let start_col = cur.col();
        if !cur.eat("\"") {
            return self.err(start_col, "expected '\"'");
        }
        let Some(len) = cur.rest().find('"') else {
            return self.err(start_col, "unterminated string");
        };
        let inner = &cur.rest()[..len];
        cur.pos += len + 1;

        // jdeps appends the archive after a space: "a.B (x.jar)"
        let name = inner.split_whitespace().next().unwrap_or("");
        if let Err(msg) = check_name(name) {
            return self.err(start_col + 1, format!("invalid name \"{inner}\": {msg}"));
        }
        Ok(name)
    }
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }

    fn col(&self) -> usize {
        self.s[..self.pos].chars().count() + 1
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }
}

fn is_comment(t: &str) -> bool {
    t.starts_with("//") || t.starts_with('#')
}

fn is_graph_header(t: &str) -> bool {
    let is_kw = t
        .strip_prefix("digraph")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '{'));
    is_kw && t.ends_with('{')
}

fn check_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name is empty");
    }
    if let Some(bad) = name
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'))
    {
        return Err(match bad {
            '-' => "'-' is not allowed in names",
            _ => "name contains an unsupported character",
        });
    }
    if !name.ends_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
        return Err("name must end with a letter, digit or '_'");
    }
    if name.split('.').any(str::is_empty) {
        return Err("name has an empty segment");
    }
    if name_depth(name) > MAX_NAME_DEPTH {
        return Err("name is nested too deeply");
    }
    Ok(())
}
