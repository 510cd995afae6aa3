//! Hand-written format parsers.
//!
//! Each parser produces the same normalized tree shape the AST backend
//! produces, so block extraction, pattern evaluation, and feature
//! extraction never care which family parsed the unit. Parsers may be
//! partial: a tree whose root carries `has_error` is still a successful
//! parse; the pattern engine then leans on recovery strategies.
//!
//! Nodes with no natural kind use `"text"` with a single leaf child.

mod asciidoc;
mod editorconfig;
mod env;
mod graphql;
mod ini;
mod json;
mod markdown;
mod plaintext;
mod rst;
mod toml;
mod xml;
mod yaml;

use std::borrow::Cow;
use std::collections::HashMap;

use crate::infra::line_index::NewlineIndex;
use crate::tree::{NodeId, ParseTree, Span};

pub use asciidoc::AsciidocParser;
pub use editorconfig::EditorconfigParser;
pub use env::EnvParser;
pub use graphql::GraphqlParser;
pub use ini::IniParser;
pub use json::JsonParser;
pub use markdown::MarkdownParser;
pub use plaintext::PlaintextParser;
pub use rst::RstParser;
pub use toml::TomlParser;
pub use xml::XmlParser;
pub use yaml::YamlParser;

/// Narrow capability set every format parser implements.
pub trait CustomParser: Send + Sync {
    /// Canonical language this parser serves.
    fn language_id(&self) -> &'static str;

    fn supports(&self, language_id: &str) -> bool {
        self.language_id() == language_id
    }

    /// Total parse: malformed input degrades to a flagged tree, never an
    /// error.
    fn parse(&self, bytes: &[u8]) -> ParseTree;
}

/// Static registry of format parsers, populated at init time.
pub struct CustomRegistry {
    parsers: Vec<Box<dyn CustomParser>>,
    by_language: HashMap<&'static str, usize>,
}

impl CustomRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
            by_language: HashMap::new(),
        }
    }

    /// The built-in roster: documentation, config, and data formats.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(MarkdownParser));
        registry.register(Box::new(RstParser));
        registry.register(Box::new(AsciidocParser));
        registry.register(Box::new(IniParser));
        registry.register(Box::new(TomlParser));
        registry.register(Box::new(YamlParser));
        registry.register(Box::new(JsonParser));
        registry.register(Box::new(XmlParser));
        registry.register(Box::new(EditorconfigParser));
        registry.register(Box::new(EnvParser));
        registry.register(Box::new(GraphqlParser));
        registry.register(Box::new(PlaintextParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn CustomParser>) {
        let language = parser.language_id();
        let index = self.parsers.len();
        self.parsers.push(parser);
        self.by_language.insert(language, index);
    }

    pub fn get(&self, language_id: &str) -> Option<&dyn CustomParser> {
        self.by_language
            .get(language_id)
            .map(|&i| self.parsers[i].as_ref())
    }

    pub fn languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<_> = self.by_language.keys().copied().collect();
        languages.sort_unstable();
        languages
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

/// One physical line: byte offsets against the raw source plus text for
/// content inspection. `end` excludes the newline and any trailing '\r';
/// spans built from these offsets always slice the original bytes.
pub(crate) struct Line<'a> {
    pub number: usize,
    pub start: usize,
    pub end: usize,
    pub text: Cow<'a, str>,
}

impl Line<'_> {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn indent(&self) -> usize {
        self.text.len() - self.text.trim_start().len()
    }
}

/// Split raw bytes into lines without losing byte offsets. Invalid UTF-8
/// affects only the inspection text, never the offsets.
pub(crate) fn split_lines(bytes: &[u8]) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut number = 0;

    while start <= bytes.len() {
        let rest = &bytes[start..];
        let (content_len, advance) = match memchr::memchr(b'\n', rest) {
            Some(nl) => (nl, nl + 1),
            None => (rest.len(), rest.len() + 1),
        };

        // Final empty fragment after a trailing newline is not a line.
        if start == bytes.len() && number > 0 {
            break;
        }

        let mut end = start + content_len;
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }

        out.push(Line {
            number,
            start,
            end,
            text: String::from_utf8_lossy(&bytes[start..end]),
        });

        number += 1;
        start += advance;
    }

    out
}

/// Span factory resolving row/column endpoints through a newline index.
pub(crate) struct Spans {
    index: NewlineIndex,
    len: usize,
}

impl Spans {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            index: NewlineIndex::build(bytes),
            len: bytes.len(),
        }
    }

    pub fn span(&self, start_byte: usize, end_byte: usize) -> Span {
        Span {
            start_byte,
            end_byte,
            start_point: self.index.point_at(start_byte),
            end_point: self.index.point_at(end_byte),
        }
    }

    pub fn full(&self) -> Span {
        self.span(0, self.len)
    }
}

/// Start a document tree: root node covering the whole unit.
pub(crate) fn document_tree(bytes: &[u8]) -> (ParseTree, NodeId, Spans) {
    let spans = Spans::new(bytes);
    let mut tree = ParseTree::with_capacity(16);
    let root = tree.add_node("document", spans.full());
    tree.set_root(root);
    (tree, root, spans)
}

/// Attach a `"text"` node wrapping a single leaf, for content that has no
/// natural structural kind.
pub(crate) fn attach_text(
    tree: &mut ParseTree,
    parent: NodeId,
    span: Span,
    text: impl Into<String>,
) -> NodeId {
    let wrapper = tree.add_node("text", span);
    let leaf = tree.add_leaf("text", span, text);
    tree.attach(parent, wrapper);
    tree.attach(wrapper, leaf);
    wrapper
}
