//! Markdown format parser.
//!
//! Line-oriented: ATX headings, fenced code blocks, list items, block
//! quotes, and paragraphs. An unterminated fence flags the root and the
//! fence node rather than failing the parse.

use super::{CustomParser, document_tree, split_lines};
use crate::tree::ParseTree;

pub struct MarkdownParser;

impl CustomParser for MarkdownParser {
    fn language_id(&self) -> &'static str {
        "markdown"
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

            let trimmed = line.text.trim_start();

            // ATX heading: one to six '#' followed by a space.
            if let Some(level) = heading_level(trimmed) {
                let after_hashes = &trimmed[level..];
                let title = after_hashes.trim();
                let leading = line.text.len() - trimmed.len();
                let gap = after_hashes.len() - after_hashes.trim_start().len();
                let title_start = line.start + leading + level + gap;
                let node = tree.add_node("heading", spans.span(line.start, line.end));
                let leaf = tree.add_leaf(
                    "heading_content",
                    spans.span(title_start, title_start + title.len()),
                    title,
                );
                tree.attach(root, node);
                tree.attach(node, leaf);
                i += 1;
                continue;
            }

            // Fenced code block; scan ahead for the closing fence.
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                let fence = &trimmed[..3];
                let start = line.start;
                let mut j = i + 1;
                let mut closed = false;
                while j < lines.len() {
                    if lines[j].text.trim_start().starts_with(fence) {
                        closed = true;
                        break;
                    }
                    j += 1;
                }
                let end = if closed { lines[j].end } else { lines[lines.len() - 1].end };
                let node = tree.add_node("code_block", spans.span(start, end));
                tree.attach(root, node);
                if !closed {
                    tree.mark_error(node);
                    tree.mark_error(root);
                }
                i = if closed { j + 1 } else { lines.len() };
                continue;
            }

            if trimmed.starts_with('>') {
                let node = tree.add_node("block_quote", spans.span(line.start, line.end));
                tree.attach(root, node);
                i += 1;
                continue;
            }

            if is_list_item(trimmed) {
                let node = tree.add_node("list_item", spans.span(line.start, line.end));
                let content = trimmed
                    .trim_start_matches(['-', '*', '+'])
                    .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
                    .trim();
                let leaf = tree.add_leaf(
                    "list_content",
                    spans.span(line.start, line.end),
                    content,
                );
                tree.attach(root, node);
                tree.attach(node, leaf);
                i += 1;
                continue;
            }

            // Paragraph: consecutive non-blank, non-structural lines.
            let start = line.start;
            let mut j = i;
            while j + 1 < lines.len() {
                let next = &lines[j + 1];
                let next_trimmed = next.text.trim_start();
                if next.is_blank()
                    || heading_level(next_trimmed).is_some()
                    || next_trimmed.starts_with("```")
                    || next_trimmed.starts_with('>')
                    || is_list_item(next_trimmed)
                {
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

fn heading_level(trimmed: &str) -> Option<usize> {
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
    if (1..=6).contains(&hashes)
        && trimmed[hashes..].starts_with(' ')
    {
        Some(hashes)
    } else {
        None
    }
}

fn is_list_item(trimmed: &str) -> bool {
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
    {
        return !rest.is_empty();
    }
    // Ordered list: digits followed by ". "
    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(". ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_and_paragraphs() {
        let source = b"# Title\n\nSome text\nmore text\n\n## Section\n";
        let tree = MarkdownParser.parse(source);

        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(kinds, ["heading", "paragraph", "heading"]);

        // Heading content carries the title text.
        let heading = tree.top_level()[0];
        let content = tree.node(heading).children[0];
        assert_eq!(tree.node(content).text.as_deref(), Some("Title"));
    }

    #[test]
    fn fenced_code_block_spans_to_close() {
        let source = b"```rust\nfn main() {}\n```\nafter\n";
        let tree = MarkdownParser.parse(source);
        let block = tree.top_level()[0];
        assert_eq!(tree.node(block).kind, "code_block");
        let span = tree.node(block).span;
        assert_eq!(&source[span.start_byte..span.end_byte], b"```rust\nfn main() {}\n```");
    }

    #[test]
    fn unterminated_fence_flags_but_parses() {
        let tree = MarkdownParser.parse(b"```\nno close\n");
        assert!(tree.has_errors());
        assert_eq!(tree.node(tree.top_level()[0]).kind, "code_block");
    }

    #[test]
    fn list_items() {
        let tree = MarkdownParser.parse(b"- one\n- two\n1. three\n");
        let kinds: Vec<_> = tree
            .top_level()
            .iter()
            .map(|&id| tree.node(id).kind.as_str())
            .collect();
        assert_eq!(kinds, ["list_item", "list_item", "list_item"]);
    }
}
