//! Plaintext fallback parser: blank-line separated paragraphs.
//!
//! The terminal fallback for every doc format and for unknown text, so it
//! accepts anything and never flags errors.

use super::{CustomParser, attach_text, document_tree, split_lines};
use crate::tree::ParseTree;

pub struct PlaintextParser;

impl CustomParser for PlaintextParser {
    fn language_id(&self) -> &'static str {
        "plaintext"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        let (mut tree, root, spans) = document_tree(bytes);
        let lines = split_lines(bytes);

        let mut i = 0;
        while i < lines.len() {
            if lines[i].is_blank() {
                i += 1;
                continue;
            }

            let start = lines[i].start;
            let mut j = i;
            while j + 1 < lines.len() && !lines[j + 1].is_blank() {
                j += 1;
            }

            let span = spans.span(start, lines[j].end);
            let text = String::from_utf8_lossy(&bytes[start..lines[j].end]).into_owned();
            attach_text(&mut tree, root, span, text);
            i = j + 1;
        }

        tree
    }
}
