//! Dotenv parser: KEY=value pairs, `export` prefixes, comments.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::ParseTree;

pub struct EnvParser;

impl CustomParser for EnvParser {
    fn language_id(&self) -> &'static str {
        "env"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);

        for line in split_lines(bytes) {
            if line.is_blank() {
                continue;
            }

            let text = line.text.trim();

            if text.starts_with('#') {
                let node = tree.add_node("comment", spans.span(line.start, line.end));
                tree.attach(root, node);
                continue;
            }

            let assignment = text.strip_prefix("export ").unwrap_or(text).trim_start();
            if let Some(eq) = assignment.find('=') {
                let key = assignment[..eq].trim();
                if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    let value = assignment[eq + 1..].trim().trim_matches(['"', '\'']);
                    let node = tree.add_node("pair", spans.span(line.start, line.end));
                    let key_leaf = tree.add_leaf("pair_key", spans.span(line.start, line.end), key);
                    let value_leaf =
                        tree.add_leaf("pair_value", spans.span(line.start, line.end), value);
                    tree.attach(root, node);
                    tree.attach(node, key_leaf);
                    tree.attach(node, value_leaf);
                    continue;
                }
            }

            let node = tree.add_node("text", spans.span(line.start, line.end));
            tree.mark_error(node);
            tree.attach(root, node);
            tree.mark_error(root);
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_with_export_and_quotes() {
        let source = b"# config\nAPI_KEY=abc123\nexport DEBUG=\"true\"\n";
        let tree = EnvParser.parse(source);

        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(kinds, ["comment", "pair", "pair"]);

        let debug = tree.top_level()[2];
        let key = tree.node(tree.node(debug).children[0]).text.clone();
        let value = tree.node(tree.node(debug).children[1]).text.clone();
        assert_eq!(key.as_deref(), Some("DEBUG"));
        assert_eq!(value.as_deref(), Some("true"));
    }

    #[test]
    fn malformed_line_is_partial_not_fatal() {
        let tree = EnvParser.parse(b"GOOD=1\nthis is not an assignment\n");
        assert!(tree.has_errors());
        assert_eq!(tree.node(tree.top_level()[0]).kind, "pair");
    }
}
