//! AsciiDoc format parser.
//!
//! Recognizes `=`-prefixed headings, `:name: value` attribute entries,
//! delimited listing blocks (`----`), and paragraphs.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::ParseTree;

pub struct AsciidocParser;

impl CustomParser for AsciidocParser {
    fn language_id(&self) -> &'static str {
        "asciidoc"
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

            let text = line.text.as_ref();

            // Heading: "= Title", "== Section", up to level 5.
            let equals = text.bytes().take_while(|&b| b == b'=').count();
            if (1..=6).contains(&equals) && text[equals..].starts_with(' ') {
                let title = text[equals..].trim();
                let node = tree.add_node("heading", spans.span(line.start, line.end));
                let leaf =
                    tree.add_leaf("heading_content", spans.span(line.start, line.end), title);
                tree.attach(root, node);
                tree.attach(node, leaf);
                i += 1;
                continue;
            }

            // Attribute entry: ":name: value"
            if text.starts_with(':')
                && let Some(close) = text[1..].find(':')
            {
                let name = &text[1..1 + close];
                if !name.is_empty() && !name.contains(' ') {
                    let node = tree.add_node("attribute", spans.span(line.start, line.end));
                    let leaf =
                        tree.add_leaf("attribute_name", spans.span(line.start, line.end), name);
                    tree.attach(root, node);
                    tree.attach(node, leaf);
                    i += 1;
                    continue;
                }
            }

            // Delimited listing block
            if text.trim_end() == "----" {
                let start = line.start;
                let mut j = i + 1;
                let mut closed = false;
                while j < lines.len() {
                    if lines[j].text.trim_end() == "----" {
                        closed = true;
                        break;
                    }
                    j += 1;
                }
                let end = if closed { lines[j].end } else { lines[lines.len() - 1].end };
                let node = tree.add_node("listing_block", spans.span(start, end));
                tree.attach(root, node);
                if !closed {
                    tree.mark_error(node);
                    tree.mark_error(root);
                }
                i = if closed { j + 1 } else { lines.len() };
                continue;
            }

            // Paragraph run
            let start = line.start;
            let mut j = i;
            while j + 1 < lines.len() && !lines[j + 1].is_blank() {
                let next = lines[j + 1].text.as_ref();
                if next.starts_with('=') || next.trim_end() == "----" {
                    break;
                }
                j += 1;
            }
            let node = tree.add_node("paragraph", spans.span(start, lines[j].end));
            tree.attach(root, node);
            i = j + 1;
        }

        tree
    }
}
