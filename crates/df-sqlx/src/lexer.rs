//! Syntax tree lexer for SQL and SQLX definition files.
//!
//! The lexer is an explicit state machine. It separates literal SQL from
//! embedded Jinja code without altering either: concatenating the source of
//! every node in a [`SyntaxTree`] reproduces the input exactly.
//!
//! Recognized constructs:
//! - string literals (`'...'`, `"..."`, `` `...` ``) with backslash escapes,
//!   never scanned for code blocks
//! - `--` and `/* */` comments
//! - `/*jinja ... */` and `--jinja ...` code blocks (`.sql` files only)
//! - `${expr}` placeholders, also inside string literals
//! - `---` statement separators on a line of their own
//! - `config`, `jinja`, `pre_operations`, `post_operations` and
//!   `incremental_where` blocks (`.sqlx` files only)

use crate::error::{SqlxError, SqlxResult};

/// Marker following `--` or `/*` that turns a comment into a code block
const CODE_MARKER: &str = "jinja";

/// Which dialect of definition file is being lexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// `.sql`: comments prefixed with `jinja` are code blocks
    Sql,
    /// `.sqlx`: brace-delimited sections; all comments are opaque
    Sqlx,
}

/// A SQLX `keyword { ... }` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Config,
    Jinja,
    PreOperations,
    PostOperations,
    IncrementalWhere,
    /// `input "name" { ... }`: a unit test's stand-in for one reference
    Input,
}

impl SectionKind {
    const ALL: [SectionKind; 6] = [
        SectionKind::Config,
        SectionKind::Jinja,
        SectionKind::PreOperations,
        SectionKind::PostOperations,
        SectionKind::IncrementalWhere,
        SectionKind::Input,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            SectionKind::Config => "config",
            SectionKind::Jinja => "jinja",
            SectionKind::PreOperations => "pre_operations",
            SectionKind::PostOperations => "post_operations",
            SectionKind::IncrementalWhere => "incremental_where",
            SectionKind::Input => "input",
        }
    }

    /// Length of the opening `keyword {` (or `input "name" {`) at the start
    /// of `rest`, if there is one
    fn open_len(&self, rest: &str) -> Option<usize> {
        let mut after = rest.strip_prefix(self.keyword())?;
        if *self == SectionKind::Input {
            let label = after.trim_start();
            if label.len() == after.len() {
                return None;
            }
            let label = label.strip_prefix('"')?;
            let end = label.find(|c: char| !is_label_char(c))?;
            if end == 0 || !label[end..].starts_with('"') {
                return None;
            }
            after = &label[end + 1..];
        }
        let gap = after.len() - after.trim_start().len();
        after[gap..]
            .starts_with('{')
            .then_some(rest.len() - after.len() + gap + 1)
    }

    /// Config and jinja blocks hold code; the others hold SQL.
    pub fn is_code(&self) -> bool {
        matches!(self, SectionKind::Config | SectionKind::Jinja)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Code(String),
    Sql(Vec<SyntaxNode>),
}

/// One node of the syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode {
    /// Literal SQL text
    Text(String),
    /// A quoted span, quotes included. Children are text and placeholders.
    StringLiteral(Vec<SyntaxNode>),
    Comment(String),
    /// A `---` line, without its line break
    StatementSeparator(String),
    /// `/*jinja ... */` or `--jinja ...`
    CodeBlock {
        open: String,
        code: String,
        close: String,
    },
    /// `${expr}`
    Placeholder { expr: String },
    Section {
        kind: SectionKind,
        open: String,
        body: SectionBody,
        close: String,
    },
}

impl SyntaxNode {
    /// Append this node's original text to `out`
    pub fn write_source(&self, out: &mut String) {
        match self {
            SyntaxNode::Text(text)
            | SyntaxNode::Comment(text)
            | SyntaxNode::StatementSeparator(text) => out.push_str(text),
            SyntaxNode::StringLiteral(parts) => parts.iter().for_each(|p| p.write_source(out)),
            SyntaxNode::CodeBlock { open, code, close } => {
                out.push_str(open);
                out.push_str(code);
                out.push_str(close);
            }
            SyntaxNode::Placeholder { expr } => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            }
            SyntaxNode::Section {
                open, body, close, ..
            } => {
                out.push_str(open);
                match body {
                    SectionBody::Code(code) => out.push_str(code),
                    SectionBody::Sql(nodes) => nodes.iter().for_each(|n| n.write_source(out)),
                }
                out.push_str(close);
            }
        }
    }

    pub fn source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    /// True for nodes that carry embedded code
    pub fn is_code(&self) -> bool {
        match self {
            SyntaxNode::CodeBlock { .. }
            | SyntaxNode::Placeholder { .. }
            | SyntaxNode::Section { .. } => true,
            SyntaxNode::StringLiteral(parts) => parts.iter().any(SyntaxNode::is_code),
            _ => false,
        }
    }
}

/// The root SQL node of a definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    pub mode: LexMode,
    pub nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    /// The exact input text
    pub fn source(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_source(&mut out);
        }
        out
    }

    /// True when the file contains no embedded code at all
    pub fn is_plain_sql(&self) -> bool {
        !self.nodes.iter().any(SyntaxNode::is_code)
    }

    /// Bodies of `/*jinja */` and `--jinja` blocks, in source order
    pub fn code_blocks(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                SyntaxNode::CodeBlock { code, .. } => Some(code.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Lex `source` into a syntax tree.
///
/// Unterminated strings, comments, code blocks, placeholders and sections
/// are errors, as is a stray `}` in a SQLX file.
pub fn lex(source: &str, mode: LexMode) -> SqlxResult<SyntaxTree> {
    let mut scanner = Scanner {
        src: source,
        pos: 0,
        mode,
    };
    let (nodes, _) = scanner.sql(false)?;
    Ok(SyntaxTree { mode, nodes })
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// The name in an `input "name" {` opening
pub fn input_label(open: &str) -> Option<&str> {
    let start = open.find('"')? + 1;
    let len = open[start..].find('"')?;
    Some(&open[start..start + len])
}

/// Backslash-escape every backtick not already preceded by a backslash.
///
/// Applying this twice gives the same result as applying it once.
pub fn escape_backticks(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut prev = None;
    for c in sql.chars() {
        if c == '`' && prev != Some('\\') {
            out.push('\\');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    mode: LexMode,
}

fn flush(nodes: &mut Vec<SyntaxNode>, text: &mut String) {
    if !text.is_empty() {
        nodes.push(SyntaxNode::Text(std::mem::take(text)));
    }
}

/// Length of a `---` separator line at the start of `rest`
fn separator_len(rest: &str) -> Option<usize> {
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
    let line = line.strip_suffix('\r').unwrap_or(line);
    (line.trim_matches(|c| c == ' ' || c == '\t') == "---").then_some(line.len())
}

/// Length of the code marker at the start of `after`, if present
fn code_marker_len(after: &str) -> Option<usize> {
    let marker = after.get(..CODE_MARKER.len())?;
    if !marker.eq_ignore_ascii_case(CODE_MARKER) {
        return None;
    }
    match after[CODE_MARKER.len()..].chars().next() {
        Some(c) if c.is_whitespace() => Some(CODE_MARKER.len()),
        _ => None,
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Scanner<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src[..self.pos].ends_with('\n')
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> SqlxError {
        let before = &self.src[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |l| l.chars().count())
            + 1;
        SqlxError::Lex {
            message: message.into(),
            line,
            column,
        }
    }

    /// SQL state. Returns the nodes and whether a section's closing brace
    /// ended the scan.
    fn sql(&mut self, in_section: bool) -> SqlxResult<(Vec<SyntaxNode>, bool)> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while let Some(c) = self.peek() {
            if self.at_line_start() {
                if let Some(len) = separator_len(self.rest()) {
                    flush(&mut nodes, &mut text);
                    nodes.push(SyntaxNode::StatementSeparator(
                        self.rest()[..len].to_string(),
                    ));
                    self.pos += len;
                    continue;
                }
            }

            let rest = self.rest();
            if matches!(c, '\'' | '"' | '`') {
                flush(&mut nodes, &mut text);
                nodes.push(self.string(c)?);
            } else if rest.starts_with("--") {
                flush(&mut nodes, &mut text);
                nodes.push(self.line_comment());
            } else if rest.starts_with("/*") {
                flush(&mut nodes, &mut text);
                nodes.push(self.block_comment()?);
            } else if rest.starts_with("${") {
                flush(&mut nodes, &mut text);
                nodes.push(self.placeholder()?);
            } else if c == '}' && in_section {
                flush(&mut nodes, &mut text);
                self.bump();
                return Ok((nodes, true));
            } else if c == '}' && self.mode == LexMode::Sqlx {
                return Err(self.error(self.pos, "Unexpected '}'"));
            } else if let Some((kind, open_len)) = self.section_start(in_section) {
                flush(&mut nodes, &mut text);
                nodes.push(self.section(kind, open_len)?);
            } else {
                text.push(c);
                self.bump();
            }
        }

        flush(&mut nodes, &mut text);
        Ok((nodes, false))
    }

    fn string(&mut self, quote: char) -> SqlxResult<SyntaxNode> {
        let start = self.pos;
        let mut parts = Vec::new();
        let mut text = String::new();
        text.push(quote);
        self.bump();

        loop {
            match self.peek() {
                None => return Err(self.error(start, "Unterminated string literal")),
                Some('\\') => {
                    text.push('\\');
                    self.bump();
                    match self.bump() {
                        Some(escaped) => text.push(escaped),
                        None => return Err(self.error(start, "Unterminated string literal")),
                    }
                }
                Some(c) if c == quote => {
                    text.push(c);
                    self.bump();
                    break;
                }
                Some('$') if self.rest().starts_with("${") => {
                    flush(&mut parts, &mut text);
                    parts.push(self.placeholder()?);
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }

        flush(&mut parts, &mut text);
        Ok(SyntaxNode::StringLiteral(parts))
    }

    fn line_comment(&mut self) -> SyntaxNode {
        let rest = self.rest();
        let end = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..end];
        self.pos += end;

        if self.mode == LexMode::Sql {
            if let Some(marker) = code_marker_len(&line[2..]) {
                let open_len = 2 + marker;
                return SyntaxNode::CodeBlock {
                    open: line[..open_len].to_string(),
                    code: line[open_len..].to_string(),
                    close: String::new(),
                };
            }
        }
        SyntaxNode::Comment(line.to_string())
    }

    fn block_comment(&mut self) -> SqlxResult<SyntaxNode> {
        let start = self.pos;
        let rest = self.rest();
        let is_code = self.mode == LexMode::Sql && code_marker_len(&rest[2..]).is_some();
        let Some(end) = rest[2..].find("*/").map(|i| i + 2) else {
            let what = if is_code {
                "Unterminated code block"
            } else {
                "Unterminated comment"
            };
            return Err(self.error(start, what));
        };
        self.pos += end + 2;

        if is_code {
            let open_len = 2 + CODE_MARKER.len();
            return Ok(SyntaxNode::CodeBlock {
                open: rest[..open_len].to_string(),
                code: rest[open_len..end].to_string(),
                close: "*/".to_string(),
            });
        }
        Ok(SyntaxNode::Comment(rest[..end + 2].to_string()))
    }

    fn placeholder(&mut self) -> SqlxResult<SyntaxNode> {
        let start = self.pos;
        self.pos += 2;
        let body_start = self.pos;
        let end = self.balanced_code(start, "Unterminated placeholder")?;
        Ok(SyntaxNode::Placeholder {
            expr: self.src[body_start..end].to_string(),
        })
    }

    /// Scan code up to the brace closing an already-open `{`. Returns the
    /// offset of that brace and leaves the scanner just past it.
    fn balanced_code(&mut self, start: usize, what: &str) -> SqlxResult<usize> {
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '\'' | '"' => self.skip_quoted(c, start, what)?,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.pos - 1);
                    }
                }
                _ => {}
            }
        }
        Err(self.error(start, what))
    }

    fn skip_quoted(&mut self, quote: char, start: usize, what: &str) -> SqlxResult<()> {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return Ok(());
            }
        }
        Err(self.error(start, what))
    }

    /// A section keyword at a word boundary followed by `{`
    fn section_start(&self, in_section: bool) -> Option<(SectionKind, usize)> {
        if self.mode != LexMode::Sqlx || in_section {
            return None;
        }
        if self.src[..self.pos]
            .chars()
            .next_back()
            .is_some_and(is_identifier_char)
        {
            return None;
        }
        let rest = self.rest();
        SectionKind::ALL
            .into_iter()
            .find_map(|kind| kind.open_len(rest).map(|len| (kind, len)))
    }

    fn section(&mut self, kind: SectionKind, open_len: usize) -> SqlxResult<SyntaxNode> {
        let start = self.pos;
        let open = self.rest()[..open_len].to_string();
        self.pos += open_len;
        let unterminated = format!("Unterminated {} block", kind.keyword());

        let body = if kind.is_code() {
            let body_start = self.pos;
            let end = self.balanced_code(start, &unterminated)?;
            SectionBody::Code(self.src[body_start..end].to_string())
        } else {
            let (nodes, closed) = self.sql(true)?;
            if !closed {
                return Err(self.error(start, unterminated));
            }
            SectionBody::Sql(nodes)
        };

        Ok(SyntaxNode::Section {
            kind,
            open,
            body,
            close: "}".to_string(),
        })
    }
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod tests;
