//! GraphQL schema/operation parser (lite).
//!
//! Recognizes top-level definitions (type, interface, enum, input,
//! union, scalar, schema, query, mutation, subscription, fragment,
//! directive) with brace-balanced extents, plus comments. Field-level
//! structure is not descended into.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::ParseTree;

const DEFINITION_KEYWORDS: &[&str] = &[
    "type",
    "interface",
    "enum",
    "input",
    "union",
    "scalar",
    "schema",
    "query",
    "mutation",
    "subscription",
    "fragment",
    "directive",
    "extend",
];

pub struct GraphqlParser;

impl CustomParser for GraphqlParser {
    fn language_id(&self) -> &'static str {
        "graphql"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);
        let lines = split_lines(bytes);

        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];

            if line.is_blank() {
                i += 1;
                continue;
            }

            let text = line.text.trim_start();

            if text.starts_with('#') {
                let node = tree.add_node("comment", spans.span(line.start, line.end));
                tree.attach(root, node);
                i += 1;
                continue;
            }

            let keyword = text.split_whitespace().next().unwrap_or_default();
            if DEFINITION_KEYWORDS.contains(&keyword) {
                // Name is the token after the keyword (or the keyword
                // itself for bare `schema {`).
                let name = text
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or(keyword)
                    .trim_matches(['{', '(', '@']);

                // Extent: balance braces from this line forward.
                let mut depth = 0i64;
                let mut saw_brace = false;
                let mut j = i;
                let end;
                loop {
                    for b in lines[j].text.bytes() {
                        match b {
                            b'{' => {
                                depth += 1;
                                saw_brace = true;
                            }
                            b'}' => depth -= 1,
                            _ => {}
                        }
                    }
                    if (saw_brace && depth <= 0) || j + 1 >= lines.len() {
                        end = lines[j].end;
                        break;
                    }
                    // A braceless definition (scalar, directive) ends at
                    // its own line.
                    if !saw_brace && j == i {
                        end = lines[j].end;
                        break;
                    }
                    j += 1;
                }

                let node = tree.add_node("definition", spans.span(line.start, end));
                let kw_leaf =
                    tree.add_leaf("definition_kind", spans.span(line.start, line.end), keyword);
                let name_leaf =
                    tree.add_leaf("definition_name", spans.span(line.start, line.end), name);
                tree.attach(root, node);
                tree.attach(node, kw_leaf);
                tree.attach(node, name_leaf);
                if saw_brace && depth > 0 {
                    tree.mark_error(node);
                    tree.mark_error(root);
                }
                i = j + 1;
                continue;
            }

            let node = tree.add_node("text", spans.span(line.start, line.end));
            tree.attach(root, node);
            i += 1;
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_definitions_with_extents() {
        let source = b"type User {\n  id: ID!\n  name: String\n}\n\nscalar Date\n";
        let tree = GraphqlParser.parse(source);

        let defs: Vec<_> = tree
            .top_level()
            .iter()
            .copied()
            .filter(|&id| tree.node(id).kind == "definition")
            .collect();
        assert_eq!(defs.len(), 2);

        let user = defs[0];
        let span = tree.node(user).span;
        assert!(source[span.start_byte..span.end_byte].ends_with(b"}"));

        let name = tree.node(tree.node(user).children[1]).text.clone();
        assert_eq!(name.as_deref(), Some("User"));
    }

    #[test]
    fn unbalanced_braces_flag_partial() {
        let tree = GraphqlParser.parse(b"type Broken {\n  id: ID\n");
        assert!(tree.has_errors());
    }

    #[test]
    fn comments_are_nodes() {
        let tree = GraphqlParser.parse(b"# schema comment\ntype T { x: Int }\n");
        assert_eq!(tree.node(tree.top_level()[0]).kind, "comment");
    }
}
