//! Filepath: src/blocks.rs
//! Block extraction: resolve a node (or match) to a syntactically
//! coherent source region.
//!
//! Policy
//! - Block text is ALWAYS the source byte slice of the resolved node,
//!   never reconstructed from the tree.
//! - A node whose kind is block-capable for the language is returned
//!   directly; otherwise ancestors are walked.
//! - Trees from the format parsers degrade to a line-range heuristic
//!   when no block-capable ancestor exists; such blocks are flagged with
//!   `node_kind = "heuristic"`.

use serde::{Deserialize, Serialize};

use crate::infra::line_index::NewlineIndex;
use crate::patterns::PatternMatch;
use crate::tree::{NodeId, ParseTree, Point};

/// Python-style suite languages.
const PYTHON_BLOCK_KINDS: &[&str] = &[
    "function_definition",
    "class_definition",
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
];

/// Brace languages (rust, javascript, c-family).
const BRACE_BLOCK_KINDS: &[&str] = &[
    "compound_statement",
    "function_definition",
    "function_item",
    "function_declaration",
    "method_definition",
    "class_specifier",
    "class_declaration",
    "struct_item",
    "enum_item",
    "trait_item",
    "impl_item",
    "if_statement",
    "if_expression",
    "for_statement",
    "for_expression",
    "while_statement",
    "while_expression",
    "match_expression",
    "statement_block",
];

/// Structural kinds the format parsers emit.
const FORMAT_BLOCK_KINDS: &[&str] = &[
    "code_block",
    "listing_block",
    "section",
    "table",
    "array_table",
    "definition",
    "object",
    "array",
    "element",
];

/// Generic fallback, checked for every language.
const GENERIC_BLOCK_KINDS: &[&str] = &["block", "body", "statement_block"];

/// Child kinds preferred when the caller asks for the body only.
const BODY_KINDS: &[&str] = &["block", "compound_statement", "statement_block"];

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockOptions {
    /// Return the body child instead of the whole construct when the
    /// construct carries a header (signature, condition).
    pub body_only: bool,
}

/// A materialized source region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedBlock {
    /// Exact byte slice of the source unit
    pub content: String,
    pub start_point: Point,
    pub end_point: Point,
    pub node_kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_kind: Option<String>,
}

impl ExtractedBlock {
    pub fn approximate_size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.content.len()
            + self.node_kind.len()
            + self.parent_kind.as_ref().map_or(0, String::len)
    }
}

fn block_capable(language_id: &str, kind: &str) -> bool {
    if GENERIC_BLOCK_KINDS.contains(&kind) {
        return true;
    }
    match language_id {
        "python" => PYTHON_BLOCK_KINDS.contains(&kind),
        "rust" | "javascript" | "typescript" | "c" | "cpp" | "java" | "go" | "csharp" => {
            BRACE_BLOCK_KINDS.contains(&kind)
        }
        _ => FORMAT_BLOCK_KINDS.contains(&kind),
    }
}

/// Resolve a node to an extracted block per the policy above.
pub fn extract(
    language_id: &str,
    source: &[u8],
    tree: &ParseTree,
    node: NodeId,
    options: BlockOptions,
) -> Option<ExtractedBlock> {
    let target = resolve_target(language_id, tree, node);

    match target {
        Some(mut target) => {
            if options.body_only
                && let Some(body) = tree
                    .node(target)
                    .children
                    .iter()
                    .copied()
                    .find(|&c| {
                        let kind = tree.node(c).kind.as_str();
                        kind.ends_with("_body") || BODY_KINDS.contains(&kind)
                    })
            {
                target = body;
            }
            materialize(source, tree, target)
        }
        None if !tree.is_ast_backed() => heuristic_block(source, tree, node),
        None => None,
    }
}

/// Resolve a pattern match to a block via its primary span.
pub fn extract_from_match(
    language_id: &str,
    source: &[u8],
    tree: &ParseTree,
    pattern_match: &PatternMatch,
    options: BlockOptions,
) -> Option<ExtractedBlock> {
    let node = tree.deepest_covering(&pattern_match.primary_span)?;
    extract(language_id, source, tree, node, options)
}

fn resolve_target(language_id: &str, tree: &ParseTree, node: NodeId) -> Option<NodeId> {
    if block_capable(language_id, &tree.node(node).kind) {
        return Some(node);
    }
    tree.ancestors(node)
        .find(|&a| a != tree.root() && block_capable(language_id, &tree.node(a).kind))
}

fn materialize(source: &[u8], tree: &ParseTree, target: NodeId) -> Option<ExtractedBlock> {
    let node = tree.node(target);
    let slice = node.span.slice(source)?;

    let parent_kind = node
        .parent
        .map(|p| tree.node(p).kind.clone());

    Some(ExtractedBlock {
        content: String::from_utf8_lossy(slice).into_owned(),
        start_point: node.span.start_point,
        end_point: node.span.end_point,
        node_kind: node.kind.clone(),
        parent_kind,
    })
}

/// Format-parser fallback: expand the node's span to whole lines.
fn heuristic_block(source: &[u8], tree: &ParseTree, node: NodeId) -> Option<ExtractedBlock> {
    let span = tree.node(node).span;
    let index = NewlineIndex::build(source);

    let start_line = index.line_of_byte(span.start_byte).max(1);
    let end_line = index.line_of_byte(span.end_byte.saturating_sub(1)).max(start_line);
    let (start, end) = index.byte_range_for_lines(start_line, end_line, source)?;
    let slice = source.get(start..end)?;

    Some(ExtractedBlock {
        content: String::from_utf8_lossy(slice).into_owned(),
        start_point: index.point_at(start),
        end_point: index.point_at(end),
        node_kind: "heuristic".to_string(),
        parent_kind: None,
    })
}
