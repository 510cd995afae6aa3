//! XML format parser: element tree via a tag scanner.
//!
//! Attributes stay inside the open tag's text; character data becomes
//! text leaves. Mismatched or unclosed tags flag the nearest open
//! element and the root, keeping the parse partial rather than failed.

use super::{CustomParser, Spans, document_tree};
use crate::tree::{NodeId, ParseTree};

pub struct XmlParser;

impl CustomParser for XmlParser {
    fn language_id(&self) -> &'static str {
        "xml"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);
        let mut stack: Vec<(String, NodeId)> = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let Some(lt) = memchr::memchr(b'<', &bytes[pos..]).map(|i| pos + i) else {
                flush_text(&mut tree, &spans, &stack, root, bytes, pos, bytes.len());
                break;
            };

            flush_text(&mut tree, &spans, &stack, root, bytes, pos, lt);

            let close = match memchr::memchr(b'>', &bytes[lt..]) {
                Some(i) => lt + i,
                None => {
                    // Unterminated tag: flag and stop scanning.
                    let node = tree.add_node("text", spans.span(lt, bytes.len()));
                    tree.mark_error(node);
                    tree.attach(parent_of(&stack, root), node);
                    tree.mark_error(root);
                    break;
                }
            };

            let tag = String::from_utf8_lossy(&bytes[lt + 1..close]);
            let parent = parent_of(&stack, root);

            if tag.starts_with('?') {
                let node = tree.add_node("prolog", spans.span(lt, close + 1));
                tree.attach(parent, node);
            } else if tag.starts_with("!--") {
                // Comments may contain '>'; find the real terminator.
                let end = find_comment_end(bytes, lt).unwrap_or(bytes.len());
                let node = tree.add_node("comment", spans.span(lt, end));
                tree.attach(parent, node);
                pos = end;
                continue;
            } else if tag.starts_with('!') {
                let node = tree.add_node("doctype", spans.span(lt, close + 1));
                tree.attach(parent, node);
            } else if let Some(name) = tag.strip_prefix('/') {
                // Closing tag: pop to the matching open element.
                let name = name.trim();
                match stack.iter().rposition(|(open, _)| open == name) {
                    Some(at) => {
                        // Anything above the match was never closed.
                        for (_, unclosed) in stack.drain(at + 1..) {
                            tree.mark_error(unclosed);
                            tree.mark_error(root);
                        }
                        let (_, node) = stack.pop().expect("matched position");
                        let open_start = tree.node(node).span.start_byte;
                        tree.set_span(node, spans.span(open_start, close + 1));
                    }
                    None => {
                        let node = tree.add_node("text", spans.span(lt, close + 1));
                        tree.mark_error(node);
                        tree.attach(parent, node);
                        tree.mark_error(root);
                    }
                }
            } else {
                let self_closing = tag.ends_with('/');
                let name = tag
                    .trim_end_matches('/')
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let node = tree.add_node("element", spans.span(lt, close + 1));
                let leaf = tree.add_leaf("tag_name", spans.span(lt, close + 1), name.clone());
                tree.attach(parent, node);
                tree.attach(node, leaf);
                if !self_closing && !name.is_empty() {
                    stack.push((name, node));
                }
            }

            pos = close + 1;
        }

        // Whatever is still open was never closed.
        for (_, unclosed) in stack {
            tree.mark_error(unclosed);
            tree.mark_error(root);
        }

        tree
    }
}

fn parent_of(stack: &[(String, NodeId)], root: NodeId) -> NodeId {
    stack.last().map_or(root, |&(_, id)| id)
}

fn flush_text(
    tree: &mut ParseTree,
    spans: &Spans,
    stack: &[(String, NodeId)],
    root: NodeId,
    bytes: &[u8],
    start: usize,
    end: usize,
) {
    let raw = &bytes[start..end];
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let leaf = tree.add_leaf("text", spans.span(start, end), trimmed);
    tree.attach(parent_of(stack, root), leaf);
}

fn find_comment_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(i) = memchr::memchr(b'>', &bytes[pos..]) {
        let at = pos + i;
        if at >= 2 && &bytes[at - 2..at] == b"--" {
            return Some(at + 1);
        }
        pos = at + 1;
    }
    None
}
