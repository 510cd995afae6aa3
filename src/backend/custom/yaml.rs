//! YAML format parser: indentation-scoped mappings, sequence items,
//! document markers, comments.
//!
//! Structural only: nesting is derived from indentation, scalars stay as
//! raw text leaves, and flow-style collections are not descended into.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::{NodeId, ParseTree};

pub struct YamlParser;

impl CustomParser for YamlParser {
    fn language_id(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);

        // (indent, node) stack: deeper entries nest under shallower ones.
        let mut stack: Vec<(usize, NodeId)> = Vec::new();

        for line in split_lines(bytes) {
            if line.is_blank() {
                continue;
            }

            let text = line.text.trim_start();
            let indent = line.indent();

            if text.starts_with('#') {
                let node = tree.add_node("comment", spans.span(line.start, line.end));
                tree.attach(root, node);
                continue;
            }

            if text == "---" || text == "..." {
                let node = tree.add_node("document_marker", spans.span(line.start, line.end));
                tree.attach(root, node);
                stack.clear();
                continue;
            }

            while let Some(&(top_indent, _)) = stack.last() {
                if indent <= top_indent {
                    stack.pop();
                } else {
                    break;
                }
            }
            let parent = stack.last().map_or(root, |&(_, id)| id);

            if let Some(rest) = text.strip_prefix("- ").or(if text == "-" { Some("") } else { None })
            {
                let node = tree.add_node("sequence_item", spans.span(line.start, line.end));
                let leaf = tree.add_leaf(
                    "item_value",
                    spans.span(line.start, line.end),
                    rest.trim(),
                );
                tree.attach(parent, node);
                tree.attach(node, leaf);
                // Items can carry nested mappings ("- key: value").
                stack.push((indent, node));
                continue;
            }

            if let Some(colon) = find_mapping_colon(text) {
                let key = text[..colon].trim().trim_matches(['"', '\'']);
                let value = text[colon + 1..].trim();
                let node = tree.add_node("mapping_pair", spans.span(line.start, line.end));
                let key_leaf = tree.add_leaf("pair_key", spans.span(line.start, line.end), key);
                tree.attach(parent, node);
                tree.attach(node, key_leaf);
                if !value.is_empty() {
                    let value_leaf =
                        tree.add_leaf("pair_value", spans.span(line.start, line.end), value);
                    tree.attach(node, value_leaf);
                }
                stack.push((indent, node));
                continue;
            }

            // Plain scalar continuation lines stay as text.
            let node = tree.add_node("text", spans.span(line.start, line.end));
            tree.attach(parent, node);
        }

        tree
    }
}

/// The colon ending a mapping key: followed by space or end of line, and
/// outside any quoting.
fn find_mapping_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b':' if i + 1 == bytes.len() || bytes[i + 1] == b' ' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_mappings_follow_indentation() {
        let source = b"server:\n  host: localhost\n  port: 8080\nother: x\n";
        let tree = YamlParser.parse(source);

        let server = tree.top_level()[0];
        assert_eq!(tree.node(server).kind, "mapping_pair");

        // key leaf + two nested pairs
        let children = &tree.node(server).children;
        let nested = children
            .iter()
            .filter(|&&id| tree.node(id).kind == "mapping_pair")
            .count();
        assert_eq!(nested, 2);

        let other = tree.top_level()[1];
        assert_eq!(tree.node(other).kind, "mapping_pair");
    }

    #[test]
    fn sequence_items_nest_under_their_key() {
        let source = b"steps:\n  - build\n  - test\n";
        let tree = YamlParser.parse(source);
        let steps = tree.top_level()[0];
        let items = tree
            .node(steps)
            .children
            .iter()
            .filter(|&&id| tree.node(id).kind == "sequence_item")
            .count();
        assert_eq!(items, 2);
    }

    #[test]
    fn document_markers_reset_scope() {
        let source = b"---\na: 1\n---\nb: 2\n";
        let tree = YamlParser.parse(source);
        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(
            kinds,
            ["document_marker", "mapping_pair", "document_marker", "mapping_pair"]
        );
    }

    #[test]
    fn quoted_colons_do_not_split_keys() {
        let tree = YamlParser.parse(b"url: \"http://x\"\n");
        let pair = tree.top_level()[0];
        let key = tree.node(tree.node(pair).children[0]).text.clone();
        assert_eq!(key.as_deref(), Some("url"));
    }
}
