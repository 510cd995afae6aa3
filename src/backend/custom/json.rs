//! JSON format parser: a small recursive-descent scanner producing
//! object / array / pair / scalar nodes with exact byte spans.
//!
//! Tolerant by design: trailing garbage or an unterminated container
//! flags the tree instead of failing; whatever parsed stays available.

use super::{CustomParser, Spans, document_tree};
use crate::tree::{NodeId, ParseTree};

pub struct JsonParser;

impl CustomParser for JsonParser {
    fn language_id(&self) -> &'static str {
        "json"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);
        let mut scanner = Scanner {
            bytes,
            pos: 0,
            spans: &spans,
            depth: 0,
        };

        scanner.skip_ws();
        if scanner.pos < bytes.len() {
            match scanner.value(&mut tree) {
                Some(node) => {
                    tree.attach(root, node);
                    scanner.skip_ws();
                    if scanner.pos < bytes.len() {
                        // Trailing garbage after the top-level value.
                        tree.mark_error(root);
                    }
                }
                None => tree.mark_error(root),
            }
        }

        tree
    }
}

/// Containers deeper than this parse as opaque scalars; protects the
/// arena from pathological nesting.
const MAX_DEPTH: usize = 128;

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    spans: &'a Spans,
    depth: usize,
}

impl Scanner<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn value(&mut self, tree: &mut ParseTree) -> Option<NodeId> {
        self.skip_ws();
        match self.peek()? {
            b'{' => self.container(tree, b'}', "object"),
            b'[' => self.container(tree, b']', "array"),
            b'"' => self.string(tree, "string"),
            _ => self.scalar(tree),
        }
    }

    /// Object or array; `pair` children for objects, values for arrays.
    fn container(&mut self, tree: &mut ParseTree, close: u8, kind: &str) -> Option<NodeId> {
        if self.depth >= MAX_DEPTH {
            return self.scalar(tree);
        }
        self.depth += 1;

        let start = self.pos;
        self.pos += 1; // opening brace/bracket
        let node = tree.add_node(kind, self.spans.span(start, start + 1));
        let is_object = close == b'}';
        let mut closed = false;

        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b) if b == close => {
                    self.pos += 1;
                    closed = true;
                    break;
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {
                    let child = if is_object {
                        self.pair(tree)
                    } else {
                        self.value(tree)
                    };
                    match child {
                        Some(c) => tree.attach(node, c),
                        None => break,
                    }
                }
            }
        }

        self.depth -= 1;
        // Patch the span now that the extent is known.
        let end = self.pos;
        let span = self.spans.span(start, end);
        tree.set_span(node, span);
        if !closed {
            tree.mark_error(node);
        }
        Some(node)
    }

    /// `"key": value` member of an object.
    fn pair(&mut self, tree: &mut ParseTree) -> Option<NodeId> {
        let start = self.pos;
        let key = self.string(tree, "pair_key")?;

        self.skip_ws();
        if self.peek() == Some(b':') {
            self.pos += 1;
        }

        let value = self.value(tree);
        let end = self.pos;

        let node = tree.add_node("pair", self.spans.span(start, end));
        tree.attach(node, key);
        match value {
            Some(v) => tree.attach(node, v),
            None => tree.mark_error(node),
        }
        Some(node)
    }

    fn string(&mut self, tree: &mut ParseTree, kind: &str) -> Option<NodeId> {
        if self.peek() != Some(b'"') {
            return None;
        }
        let start = self.pos;
        self.pos += 1;
        let mut escaped = false;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                let inner = &self.bytes[start + 1..self.pos - 1];
                let text = String::from_utf8_lossy(inner).into_owned();
                return Some(tree.add_leaf(kind, self.spans.span(start, self.pos), text));
            }
        }
        // Unterminated string: flagged leaf to the end of input.
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        let node = tree.add_leaf(kind, self.spans.span(start, self.pos), text);
        tree.mark_error(node);
        Some(node)
    }

    /// Number, boolean, null, or any unquoted run up to a delimiter.
    fn scalar(&mut self, tree: &mut ParseTree) -> Option<NodeId> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            self.pos += 1; // never stall on an unexpected delimiter
            let node = tree.add_node("text", self.spans.span(start, self.pos));
            tree.mark_error(node);
            return Some(node);
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        let kind = match text.as_str() {
            "true" | "false" => "boolean",
            "null" => "null",
            _ if text.starts_with(['-', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9']) => {
                "number"
            }
            _ => "text",
        };
        Some(tree.add_leaf(kind, self.spans.span(start, self.pos), text))
    }
}
