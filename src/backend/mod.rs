//! Parser backends behind one contract.
//!
//! Two families produce the same normalized [`crate::tree::ParseTree`]:
//! the grammar-backed AST backend and the hand-written format parsers.
//! Resolution prefers a registered format parser for the language, then a
//! loaded grammar, then walks the classification's fallback list. New
//! parsers are added by registering an entry at init time, not by side
//! effects.

pub mod ast;
pub mod custom;

use crate::classify::Classification;

use ast::AstBackend;
use custom::{CustomParser, CustomRegistry};

/// Which backend will parse a unit, after resolution.
pub enum SelectedBackend<'a> {
    Ast,
    Custom(&'a dyn CustomParser),
}

impl SelectedBackend<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ast => "ast",
            Self::Custom(_) => "custom",
        }
    }
}

/// The static backend set a parser context owns.
pub struct BackendSet {
    pub ast: AstBackend,
    pub custom: CustomRegistry,
}

impl BackendSet {
    pub fn with_builtins() -> Self {
        Self {
            ast: AstBackend::new(),
            custom: CustomRegistry::with_builtins(),
        }
    }

    /// Resolve the backend for a classification. Returns the language
    /// actually served (possibly a fallback) and the backend to use.
    pub fn resolve(&self, classification: &Classification) -> Option<(String, SelectedBackend<'_>)> {
        let mut candidates = Vec::with_capacity(1 + classification.fallbacks.len());
        candidates.push(classification.language_id.as_str());
        candidates.extend(classification.fallbacks.iter().map(String::as_str));

        for language in candidates {
            if let Some(parser) = self.custom.get(language) {
                return Some((language.to_string(), SelectedBackend::Custom(parser)));
            }
            if self.ast.supports(language) {
                return Some((language.to_string(), SelectedBackend::Ast));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use std::path::Path;

    #[test]
    fn python_resolves_to_ast() {
        let set = BackendSet::with_builtins();
        let c = classify(Path::new("a.py"), b"def f(): pass");
        let (lang, backend) = set.resolve(&c).unwrap();
        assert_eq!(lang, "python");
        assert_eq!(backend.label(), "ast");
    }

    #[test]
    fn markdown_resolves_to_custom() {
        let set = BackendSet::with_builtins();
        let c = classify(Path::new("README.md"), b"# hi");
        let (lang, backend) = set.resolve(&c).unwrap();
        assert_eq!(lang, "markdown");
        assert_eq!(backend.label(), "custom");
    }

    #[test]
    fn typescript_falls_back_to_javascript_grammar() {
        let set = BackendSet::with_builtins();
        let c = classify(Path::new("app.ts"), b"const x = 1;");
        let (lang, backend) = set.resolve(&c).unwrap();
        assert_eq!(lang, "javascript");
        assert_eq!(backend.label(), "ast");
    }

    #[test]
    fn unknown_code_language_has_no_backend() {
        let set = BackendSet::with_builtins();
        let c = classify(Path::new("main.go"), b"package main");
        assert!(set.resolve(&c).is_none());
    }
}
