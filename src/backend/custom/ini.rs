//! INI format parser: sections, properties, comments.
//!
//! EditorConfig shares this shape, so the line walk is factored out and
//! reused there.

use super::{CustomParser, Spans, document_tree, split_lines};
use crate::tree::{NodeId, ParseTree};

pub struct IniParser;

impl CustomParser for IniParser {
    fn language_id(&self) -> &'static str {
        "ini"
    }

    fn parse(&self, bytes: &[u8]) -> ParseTree {
        parse_ini_shaped(bytes)
    }
}

/// Shared walk for INI-shaped files. Properties nest under the current
/// section; properties before any section attach to the document.
pub(super) fn parse_ini_shaped(bytes: &[u8]) -> ParseTree {
    let (mut tree, root, spans) = document_tree(bytes);
    let mut current_section: Option<NodeId> = None;

    for line in split_lines(bytes) {
        if line.is_blank() {
            continue;
        }

        let text = line.text.trim();

        if text.starts_with([';', '#']) {
            let node = tree.add_node("comment", spans.span(line.start, line.end));
            tree.attach(current_section.unwrap_or(root), node);
            continue;
        }

        if text.starts_with('[') && text.ends_with(']') {
            let name = text[1..text.len() - 1].trim();
            let node = tree.add_node("section", spans.span(line.start, line.end));
            let leaf = tree.add_leaf("section_name", spans.span(line.start, line.end), name);
            tree.attach(root, node);
            tree.attach(node, leaf);
            current_section = Some(node);
            continue;
        }

        if let Some(node) = property_node(&mut tree, &spans, line.start, line.end, text) {
            tree.attach(current_section.unwrap_or(root), node);
            continue;
        }

        // A line that is neither comment, section, nor property is a
        // partial-parse signal, not a failure.
        let node = tree.add_node("text", spans.span(line.start, line.end));
        tree.mark_error(node);
        tree.attach(current_section.unwrap_or(root), node);
        tree.mark_error(root);
    }

    tree
}

/// Build a `property` node for `key = value` / `key: value` lines.
pub(super) fn property_node(
    tree: &mut ParseTree,
    spans: &Spans,
    start: usize,
    end: usize,
    text: &str,
) -> Option<NodeId> {
    let sep = text.find(['=', ':'])?;
    let key = text[..sep].trim();
    if key.is_empty() {
        return None;
    }

    let node = tree.add_node("property", spans.span(start, end));
    let key_leaf = tree.add_leaf("property_key", spans.span(start, end), key);
    let value_leaf = tree.add_leaf(
        "property_value",
        spans.span(start, end),
        text[sep + 1..].trim(),
    );
    tree.attach(node, key_leaf);
    tree.attach(node, value_leaf);
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_own_their_properties() {
        let source = b"[server]\nhost = localhost\nport = 8080\n\n[client]\nretries = 3\n";
        let tree = IniParser.parse(source);

        let sections: Vec<NodeId> = tree
            .top_level()
            .iter()
            .copied()
            .filter(|&id| tree.node(id).kind == "section")
            .collect();
        assert_eq!(sections.len(), 2);

        // [server] has name leaf + 2 properties
        let server_children = &tree.node(sections[0]).children;
        let props = server_children
            .iter()
            .filter(|&&id| tree.node(id).kind == "property")
            .count();
        assert_eq!(props, 2);
    }

    #[test]
    fn top_level_properties_attach_to_document() {
        let tree = IniParser.parse(b"global = 1\n[s]\nlocal = 2\n");
        assert_eq!(tree.node(tree.top_level()[0]).kind, "property");
    }

    #[test]
    fn stray_lines_flag_partial_parse() {
        let tree = IniParser.parse(b"[ok]\nnot a property line\n");
        assert!(tree.has_errors());
        // Still a successful parse with the section present.
        assert_eq!(tree.node(tree.top_level()[0]).kind, "section");
    }
}
