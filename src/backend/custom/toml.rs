//! TOML format parser: tables, array-of-table headers, key/value pairs.
//!
//! Structural only: values are kept as raw text leaves, multi-line
//! strings and inline tables are not descended into.

use super::{CustomParser, document_tree, ini::property_node, split_lines};
use crate::tree::{NodeId, ParseTree};

pub struct TomlParser;

impl CustomParser for TomlParser {
    fn language_id(&self) -> &'static str {
        "toml"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);
        let mut current_table: Option<NodeId> = None;

        for line in split_lines(bytes) {
            if line.is_blank() {
                continue;
            }

            let text = line.text.trim();

            if text.starts_with('#') {
                let node = tree.add_node("comment", spans.span(line.start, line.end));
                tree.attach(current_table.unwrap_or(root), node);
                continue;
            }

            // [[array.of.tables]] before [table]
            let (kind, name) = if text.starts_with("[[") && text.ends_with("]]") {
                ("array_table", text[2..text.len() - 2].trim())
            } else if text.starts_with('[') && text.ends_with(']') {
                ("table", text[1..text.len() - 1].trim())
            } else {
                ("", "")
            };

            if !kind.is_empty() {
                let node = tree.add_node(kind, spans.span(line.start, line.end));
                let leaf = tree.add_leaf("table_name", spans.span(line.start, line.end), name);
                tree.attach(root, node);
                tree.attach(node, leaf);
                current_table = Some(node);
                continue;
            }

            if let Some(node) = property_node(&mut tree, &spans, line.start, line.end, text) {
                tree.attach(current_table.unwrap_or(root), node);
                continue;
            }

            let node = tree.add_node("text", spans.span(line.start, line.end));
            tree.mark_error(node);
            tree.attach(current_table.unwrap_or(root), node);
            tree.mark_error(root);
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_and_pairs() {
        let source = b"title = \"demo\"\n\n[server]\nport = 8080\n\n[[worker]]\nid = 1\n";
        let tree = TomlParser.parse(source);

        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(kinds, ["property", "table", "array_table"]);

        let table = tree.top_level()[1];
        let name = tree.node(table).children[0];
        assert_eq!(tree.node(name).text.as_deref(), Some("server"));
    }

    #[test]
    fn dotted_table_names_survive() {
        let tree = TomlParser.parse(b"[a.b.c]\nx = 1\n");
        let table = tree.top_level()[0];
        let name = tree.node(tree.node(table).children[0]).text.clone();
        assert_eq!(name.as_deref(), Some("a.b.c"));
    }
}
