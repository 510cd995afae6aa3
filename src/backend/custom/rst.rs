//! reStructuredText format parser.
//!
//! Recognizes underlined section titles, directives (`.. name::`), and
//! paragraphs. Underline adornment must be at least as long as the title
//! line above it.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::ParseTree;

const ADORNMENTS: &str = "=-`:'\"~^_*+#<>";

pub struct RstParser;

impl CustomParser for RstParser {
    fn language_id(&self) -> &'static str {
        "rst"
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

            // Section title: a line whose successor is an adornment run.
            if i + 1 < lines.len() && is_underline(&lines[i + 1].text, line.text.trim_end().len()) {
                let node = tree.add_node("section_title", spans.span(line.start, lines[i + 1].end));
                let leaf = tree.add_leaf(
                    "title_content",
                    spans.span(line.start, line.end),
                    line.text.trim(),
                );
                tree.attach(root, node);
                tree.attach(node, leaf);
                i += 2;
                continue;
            }

            // Directive: ".. name:: arguments"
            let trimmed = line.text.trim_start();
            if let Some(rest) = trimmed.strip_prefix(".. ")
                && rest.contains("::")
            {
                let node = tree.add_node("directive", spans.span(line.start, line.end));
                let name = rest.split("::").next().unwrap_or_default().trim();
                let leaf = tree.add_leaf("directive_name", spans.span(line.start, line.end), name);
                tree.attach(root, node);
                tree.attach(node, leaf);
                i += 1;
                continue;
            }

            // Comment: ".. " without a directive marker
            if trimmed.starts_with("..") {
                let node = tree.add_node("comment", spans.span(line.start, line.end));
                tree.attach(root, node);
                i += 1;
                continue;
            }

            // Paragraph run
            let start = line.start;
            let mut j = i;
            while j + 1 < lines.len()
                && !lines[j + 1].is_blank()
                && !(j + 2 < lines.len()
                    && is_underline(&lines[j + 2].text, lines[j + 1].text.trim_end().len()))
            {
                j += 1;
            }
            let node = tree.add_node("paragraph", spans.span(start, lines[j].end));
            tree.attach(root, node);
            i = j + 1;
        }

        tree
    }
}

fn is_underline(text: &str, title_len: usize) -> bool {
    let trimmed = text.trim_end();
    if trimmed.len() < 2 || title_len == 0 || trimmed.len() < title_len {
        return false;
    }
    let mut chars = trimmed.chars();
    let first = chars.next().unwrap();
    ADORNMENTS.contains(first) && chars.all(|c| c == first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underlined_titles_become_sections() {
        let source = b"Title\n=====\n\nBody text here.\n";
        let tree = RstParser.parse(source);
        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(kinds, ["section_title", "paragraph"]);

        let title = tree.node(tree.top_level()[0]).children[0];
        assert_eq!(tree.node(title).text.as_deref(), Some("Title"));
    }

    #[test]
    fn short_underline_is_not_a_section() {
        let tree = RstParser.parse(b"Long title\n==\n");
        assert_eq!(tree.node(tree.top_level()[0]).kind, "paragraph");
    }

    #[test]
    fn directives_are_recognized() {
        let tree = RstParser.parse(b".. code-block:: python\n");
        let node = tree.top_level()[0];
        assert_eq!(tree.node(node).kind, "directive");
        let name = tree.node(node).children[0];
        assert_eq!(tree.node(name).text.as_deref(), Some("code-block"));
    }
}
