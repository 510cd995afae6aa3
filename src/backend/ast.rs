//! Grammar-backed parsing on Tree-sitter 0.25.x.
//!
//! Parsing is deterministic and total: malformed input yields subtrees
//! flagged `has_error` and gaps flagged `is_missing`; the backend never
//! fails on bad bytes, only on a missing or ABI-incompatible grammar.
//! Queries produce captures in pre-order; overlapping results are ordered
//! by (earlier start byte, then longer span).

use tree_sitter::{Parser, Query, QueryCursor, StreamingIterator};

use crate::error::ParseErrorKind;
use crate::tree::{NodeId, ParseTree, Point, Span};

/// Grammars compiled into this build. Classification may name more
/// languages than this; those resolve through fallbacks.
pub fn grammar_for(language_id: &str) -> Option<tree_sitter::Language> {
    match language_id {
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
        _ => None,
    }
}

/// One raw query match, normalized to spans over the source unit.
#[derive(Debug, Clone)]
pub struct RawQueryMatch {
    /// (capture name, span) pairs in tree traversal order
    pub captures: Vec<(String, Span)>,
    pub primary: Span,
    pub node_kind: String,
    /// Whether the primary node sits in an error subtree
    pub has_error: bool,
}

/// The AST parser backend. Stateless: `tree_sitter::Parser` is not
/// shareable across threads, so one is created per parse.
#[derive(Debug, Default)]
pub struct AstBackend;

impl AstBackend {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(&self, language_id: &str) -> bool {
        grammar_for(language_id).is_some()
    }

    /// Parse bytes into the normalized tree, retaining the concrete tree
    /// for query execution.
    pub fn parse(&self, language_id: &str, bytes: &[u8]) -> Result<ParseTree, ParseErrorKind> {
        let language = grammar_for(language_id).ok_or_else(|| ParseErrorKind::BackendUnavailable {
            language: language_id.to_string(),
        })?;

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|_| ParseErrorKind::GrammarVersionMismatch {
                language: language_id.to_string(),
            })?;

        let ts_tree = parser
            .parse(bytes, None)
            .ok_or_else(|| ParseErrorKind::BackendUnavailable {
                language: language_id.to_string(),
            })?;

        let mut tree = convert(&ts_tree, bytes);
        tree.set_ts(ts_tree);
        Ok(tree)
    }

    /// Run a compiled query over the whole tree.
    pub fn run_query(&self, tree: &ParseTree, query: &Query, source: &[u8]) -> Vec<RawQueryMatch> {
        let Some(ts_tree) = tree.ts() else {
            return Vec::new();
        };
        run_query_on(query, ts_tree.root_node(), source)
    }

    /// Run a compiled query over the `child_index`-th top-level named
    /// child only; the partial-match recovery strategy unions these.
    pub fn run_query_on_child(
        &self,
        tree: &ParseTree,
        query: &Query,
        child_index: usize,
        source: &[u8],
    ) -> Vec<RawQueryMatch> {
        let Some(ts_tree) = tree.ts() else {
            return Vec::new();
        };
        let Some(child) = ts_tree.root_node().named_child(child_index) else {
            return Vec::new();
        };
        run_query_on(query, child, source)
    }

    /// Number of top-level named children in the concrete tree.
    pub fn top_level_count(&self, tree: &ParseTree) -> usize {
        tree.ts()
            .map(|t| t.root_node().named_child_count())
            .unwrap_or(0)
    }
}

fn ts_span(node: tree_sitter::Node<'_>) -> Span {
    let sp = node.start_position();
    let ep = node.end_position();
    Span {
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        start_point: Point {
            row: sp.row,
            column: sp.column,
        },
        end_point: Point {
            row: ep.row,
            column: ep.column,
        },
    }
}

/// Convert a concrete tree to the normalized arena. Named nodes only:
/// punctuation tokens carry no structure downstream components need.
fn convert(ts_tree: &tree_sitter::Tree, bytes: &[u8]) -> ParseTree {
    let root = ts_tree.root_node();
    let mut tree = ParseTree::with_capacity(root.descendant_count().max(1));

    // Explicit stack; recursion depth is attacker-controlled on deeply
    // nested sources.
    let mut stack: Vec<(tree_sitter::Node<'_>, Option<NodeId>)> = vec![(root, None)];

    while let Some((node, parent)) = stack.pop() {
        let id = tree.add_node(node.kind(), ts_span(node));
        if node.has_error() || node.is_error() {
            tree.mark_error(id);
        }
        if node.is_missing() {
            tree.mark_missing(id);
        }

        match parent {
            Some(parent_id) => tree.attach(parent_id, id),
            None => tree.set_root(id),
        }

        let count = node.named_child_count();
        if count == 0 {
            if let Some(slice) = bytes.get(node.start_byte()..node.end_byte()) {
                tree.set_leaf_text(id, String::from_utf8_lossy(slice).into_owned());
            }
        } else {
            // Reversed so the leftmost child pops (and attaches) first.
            for i in (0..count).rev() {
                if let Some(child) = node.named_child(i) {
                    stack.push((child, Some(id)));
                }
            }
        }
    }

    tree
}

fn run_query_on(
    query: &Query,
    node: tree_sitter::Node<'_>,
    source: &[u8],
) -> Vec<RawQueryMatch> {
    let capture_names = query.capture_names();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, node, source);

    let mut out = Vec::new();
    while let Some(m) = matches.next() {
        if m.captures.is_empty() {
            continue;
        }

        let mut captures: Vec<(String, Span)> = Vec::with_capacity(m.captures.len());
        let mut primary: Option<(Span, String, bool)> = None;

        for cap in m.captures {
            let name = capture_names[cap.index as usize].to_string();
            let span = ts_span(cap.node);

            // The `item` capture names the whole construct; fall back to
            // the first capture of the match.
            if name == "item" || primary.is_none() {
                primary = Some((
                    span,
                    cap.node.kind().to_string(),
                    cap.node.has_error() || cap.node.is_error(),
                ));
            }
            captures.push((name, span));
        }

        let (primary, node_kind, has_error) = primary.expect("non-empty captures");
        out.push(RawQueryMatch {
            captures,
            primary,
            node_kind,
            has_error,
        });
    }

    // Pre-order with deterministic tie-breaks: earlier start byte wins,
    // then the longer span.
    out.sort_by(|a, b| {
        a.primary
            .start_byte
            .cmp(&b.primary.start_byte)
            .then_with(|| b.primary.len().cmp(&a.primary.len()))
    });
    out
}
