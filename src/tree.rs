//! Normalized syntax tree shared by both parser backends.
//!
//! The AST backend and every hand-written format parser produce this same
//! arena shape, so block extraction, pattern evaluation, and feature
//! extraction stay backend-agnostic. Spans index into the source bytes,
//! which must outlive the tree; only leaves carry a copy of their text.

use serde::{Deserialize, Serialize};

/// Zero-based row/column position. `column` counts bytes within the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

/// Half-open byte range with its row/column endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_point: Point,
    pub end_point: Point,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.end_byte <= self.start_byte
    }

    /// Whether this span fully covers `other`.
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    /// The exact source slice this span names, or None when out of bounds.
    pub fn slice<'a>(&self, source: &'a [u8]) -> Option<&'a [u8]> {
        source.get(self.start_byte..self.end_byte)
    }
}

/// Index of a node within its tree's arena.
pub type NodeId = usize;

/// One node of the normalized tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Grammar kind, or a format parser's structural label ("text" when
    /// no natural kind exists).
    pub kind: String,
    pub span: Span,
    pub has_error: bool,
    pub is_missing: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Leaves carry their byte slice; interior nodes never duplicate text.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Rooted labelled tree over a single source unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseTree {
    nodes: Vec<Node>,
    root: NodeId,
    /// Concrete tree retained by the AST backend so compiled queries can
    /// run against it; absent for format-parser trees.
    #[serde(skip)]
    ts: Option<tree_sitter::Tree>,
}

impl ParseTree {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: 0,
            ts: None,
        }
    }

    /// Append a detached node; callers attach it with [`ParseTree::attach`].
    pub fn add_node(&mut self, kind: impl Into<String>, span: Span) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind: kind.into(),
            span,
            has_error: false,
            is_missing: false,
            parent: None,
            children: Vec::new(),
            text: None,
        });
        id
    }

    /// Append a leaf carrying its source text.
    pub fn add_leaf(&mut self, kind: impl Into<String>, span: Span, text: impl Into<String>) -> NodeId {
        let id = self.add_node(kind, span);
        self.nodes[id].text = Some(text.into());
        id
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id].span = span;
    }

    pub fn set_leaf_text(&mut self, id: NodeId, text: String) {
        self.nodes[id].text = Some(text);
    }

    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn mark_error(&mut self, id: NodeId) {
        self.nodes[id].has_error = true;
    }

    pub fn mark_missing(&mut self, id: NodeId) {
        self.nodes[id].is_missing = true;
    }

    pub(crate) fn set_ts(&mut self, ts: tree_sitter::Tree) {
        self.ts = Some(ts);
    }

    pub(crate) fn ts(&self) -> Option<&tree_sitter::Tree> {
        self.ts.as_ref()
    }

    /// Whether the tree came from the AST backend (a concrete tree is
    /// retained) rather than a hand-written format parser.
    pub fn is_ast_backed(&self) -> bool {
        self.ts.is_some()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of the root, in source order.
    pub fn top_level(&self) -> &[NodeId] {
        &self.nodes[self.root].children
    }

    /// Pre-order traversal from the root.
    pub fn preorder(&self) -> Preorder<'_> {
        let mut stack = Vec::with_capacity(16);
        if !self.nodes.is_empty() {
            stack.push(self.root);
        }
        Preorder { tree: self, stack }
    }

    /// Walk ancestors of `id`, excluding `id` itself, root last.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes.get(id).and_then(|n| n.parent),
        }
    }

    /// Deepest node whose span fully covers `span`, searched from the root.
    pub fn deepest_covering(&self, span: &Span) -> Option<NodeId> {
        if self.nodes.is_empty() || !self.nodes[self.root].span.contains(span) {
            return None;
        }

        let mut current = self.root;
        'descend: loop {
            for &child in &self.nodes[current].children {
                if self.nodes[child].span.contains(span) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// Whether any node in the tree is an error or missing node.
    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|n| n.has_error || n.is_missing)
    }

    /// Rough resident size for cache accounting.
    pub fn approximate_size_bytes(&self) -> usize {
        let node_overhead = std::mem::size_of::<Node>();
        self.nodes
            .iter()
            .map(|n| {
                node_overhead
                    + n.kind.len()
                    + n.children.len() * std::mem::size_of::<NodeId>()
                    + n.text.as_ref().map_or(0, String::len)
            })
            .sum()
    }
}

pub struct Preorder<'t> {
    tree: &'t ParseTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        // Push children reversed so the leftmost child pops first.
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

pub struct Ancestors<'t> {
    tree: &'t ParseTree,
    next: Option<NodeId>,
}

impl<'t> Iterator for Ancestors<'t> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.tree.nodes[id].parent;
        Some(id)
    }
}

/// Convenience constructor for spans when both points are known.
pub fn span(start_byte: usize, end_byte: usize, start_point: Point, end_point: Point) -> Span {
    Span {
        start_byte,
        end_byte,
        start_point,
        end_point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(a: usize, b: usize) -> Span {
        Span {
            start_byte: a,
            end_byte: b,
            ..Default::default()
        }
    }

    /// module(0..20) -> fn(0..10) -> name(0..3), body(4..10); sibling stmt(12..20)
    fn sample_tree() -> ParseTree {
        let mut t = ParseTree::with_capacity(5);
        let root = t.add_node("module", sp(0, 20));
        let f = t.add_node("function_definition", sp(0, 10));
        let name = t.add_leaf("identifier", sp(0, 3), "foo");
        let body = t.add_node("block", sp(4, 10));
        let stmt = t.add_node("expression_statement", sp(12, 20));
        t.attach(root, f);
        t.attach(f, name);
        t.attach(f, body);
        t.attach(root, stmt);
        t.set_root(root);
        t
    }

    #[test]
    fn preorder_visits_parents_before_children() {
        let t = sample_tree();
        let kinds: Vec<_> = t.preorder().map(|id| t.node(id).kind.as_str()).collect();
        assert_eq!(
            kinds,
            [
                "module",
                "function_definition",
                "identifier",
                "block",
                "expression_statement"
            ]
        );
    }

    #[test]
    fn ancestors_walk_to_root() {
        let t = sample_tree();
        // identifier is node 2
        let kinds: Vec<_> = t.ancestors(2).map(|id| t.node(id).kind.as_str()).collect();
        assert_eq!(kinds, ["function_definition", "module"]);
    }

    #[test]
    fn deepest_covering_prefers_tightest_node() {
        let t = sample_tree();
        let hit = t.deepest_covering(&sp(5, 9)).unwrap();
        assert_eq!(t.node(hit).kind, "block");

        let wide = t.deepest_covering(&sp(2, 15)).unwrap();
        assert_eq!(t.node(wide).kind, "module");

        assert!(t.deepest_covering(&sp(15, 25)).is_none());
    }

    #[test]
    fn span_slice_matches_bytes() {
        let source = b"def foo(): pass";
        let s = sp(4, 7);
        assert_eq!(s.slice(source).unwrap(), b"foo");
        assert!(sp(10, 99).slice(source).is_none());
    }
}
