//! Syntax-tree parsing via tree-sitter-bash.

use tree_sitter::{Node, Parser};
use tracing::debug;

use super::ParsedCommand;

/// Parses `source` into commands, or `None` if the grammar is unavailable or
/// the tree contains syntax errors.
pub fn parse(source: &str) -> Option<Vec<ParsedCommand>> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_bash::LANGUAGE.into()) {
        debug!("failed to load bash grammar: {e}");
        return None;
    }

    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        debug!("bash syntax tree has errors");
        return None;
    }

    let mut walker = Walker {
        source: source.as_bytes(),
        commands: Vec::new(),
    };
    walker.visit(root);
    Some(walker.commands)
}

/// First and last top-level command produced by a subtree.
#[derive(Debug, Clone, Copy)]
struct Span {
    first: usize,
    tail: usize,
}

impl Span {
    fn join(a: Option<Span>, b: Option<Span>) -> Option<Span> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Span {
                first: a.first,
                tail: b.tail,
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

struct Walker<'s> {
    source: &'s [u8],
    commands: Vec<ParsedCommand>,
}

impl Walker<'_> {
    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn visit(&mut self, node: Node<'_>) -> Option<Span> {
        match node.kind() {
            "command" => Some(self.visit_command(node)),
            "pipeline" => self.visit_pipeline(node),
            "redirected_statement" => self.visit_redirected(node),
            "comment" => None,
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'_>) -> Option<Span> {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .fold(None, |span, child| Span::join(span, self.visit(child)))
    }

    fn visit_pipeline(&mut self, node: Node<'_>) -> Option<Span> {
        let mut cursor = node.walk();
        let stages: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

        let mut span: Option<Span> = None;
        for stage in stages {
            let Some(current) = self.visit(stage) else {
                continue;
            };
            if let Some(prev) = span {
                self.commands[prev.tail].pipes_to = Some(current.first);
            }
            span = Span::join(span, Some(current));
        }
        span
    }

    fn visit_redirected(&mut self, node: Node<'_>) -> Option<Span> {
        let span = match node.child_by_field_name("body") {
            Some(body) => self.visit(body),
            None => None,
        };

        let mut cursor = node.walk();
        let redirects: Vec<Node<'_>> = node
            .children_by_field_name("redirect", &mut cursor)
            .collect();

        let target = match span {
            Some(span) => span.tail,
            None => {
                let mut bare = ParsedCommand::new("");
                bare.raw_text = self.text(node);
                self.commands.push(bare);
                let idx = self.commands.len() - 1;
                self.visit_redirects(&redirects, idx);
                return Some(Span {
                    first: idx,
                    tail: idx,
                });
            }
        };
        self.visit_redirects(&redirects, target);
        span
    }

    fn visit_redirects(&mut self, redirects: &[Node<'_>], target: usize) {
        for redirect in redirects {
            match self.redirect_destination(*redirect) {
                Some(Redirect::Output(dest)) => self.commands[target].redirect_targets.push(dest),
                Some(Redirect::Input(src)) => self.commands[target].push_word(src),
                None => {}
            }
            // Substitutions inside redirect destinations still run.
            self.visit_children(*redirect);
        }
    }

    fn visit_command(&mut self, node: Node<'_>) -> Span {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.command_name(n))
            .unwrap_or_default();

        let mut cmd = ParsedCommand::new(name);
        cmd.raw_text = self.text(node);

        self.commands.push(cmd);
        let idx = self.commands.len() - 1;

        let mut cursor = node.walk();
        let arguments: Vec<Node<'_>> = node
            .children_by_field_name("argument", &mut cursor)
            .collect();
        for arg in &arguments {
            let value = self.word_value(*arg);
            self.commands[idx].push_word(value);
        }

        let mut cursor = node.walk();
        let redirects: Vec<Node<'_>> = node
            .children_by_field_name("redirect", &mut cursor)
            .collect();
        self.visit_redirects(&redirects, idx);

        // Nested commands ($(...), `...`, <(...)) in the name or arguments.
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() != "file_redirect")
            .collect();
        for child in children {
            self.visit_children(child);
        }

        Span {
            first: idx,
            tail: idx,
        }
    }

    fn command_name(&self, node: Node<'_>) -> String {
        match node.named_child(0) {
            Some(inner) => self.word_value(inner),
            None => self.text(node),
        }
    }

    /// The shell value of a word-like node with quoting removed.
    ///
    /// Expansions are kept verbatim.
    fn word_value(&self, node: Node<'_>) -> String {
        let raw = self.text(node);
        match node.kind() {
            "word" => unescape_bare(&raw),
            "raw_string" => strip_delims(&raw, "'", "'").to_string(),
            "ansi_c_string" => strip_delims(&raw, "$'", "'").to_string(),
            "string" => unescape_double(strip_delims(&raw, "\"", "\"")),
            "translated_string" => unescape_double(strip_delims(&raw, "$\"", "\"")),
            "concatenation" => {
                let mut cursor = node.walk();
                let parts: Vec<Node<'_>> = node.children(&mut cursor).collect();
                parts
                    .into_iter()
                    .map(|part| {
                        if part.is_named() {
                            self.word_value(part)
                        } else {
                            self.text(part)
                        }
                    })
                    .collect()
            }
            _ => raw,
        }
    }

    fn redirect_destination(&self, node: Node<'_>) -> Option<Redirect> {
        if node.kind() != "file_redirect" {
            return None;
        }

        let mut operator = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !child.is_named() {
                operator.push_str(child.kind());
            }
        }

        let destination = node.child_by_field_name("destination")?;
        let value = self.word_value(destination);

        let is_dup = operator.ends_with('&') || operator.starts_with("<&");
        if is_dup && (value == "-" || value.chars().all(|c| c.is_ascii_digit())) {
            return None;
        }

        if operator.contains('>') {
            Some(Redirect::Output(value))
        } else {
            Some(Redirect::Input(value))
        }
    }
}

enum Redirect {
    Output(String),
    Input(String),
}

fn strip_delims<'a>(raw: &'a str, open: &str, close: &str) -> &'a str {
    raw.strip_prefix(open)
        .and_then(|s| s.strip_suffix(close))
        .unwrap_or(raw)
}

/// Backslash removal for unquoted words.
fn unescape_bare(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Backslash removal inside double quotes: only `\"`, `\\`, `\$` and
/// `` \` `` are escapes.
fn unescape_double(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && matches!(next, '"' | '\\' | '$' | '`')
        {
            out.push(next);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}
