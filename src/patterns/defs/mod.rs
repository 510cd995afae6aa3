//! Built-in pattern tables, per language.
//!
//! AST-query patterns follow the same discipline as the extractor
//! queries: broad shapes, no grammar field predicates that churn across
//! grammar versions. Regex patterns serve the format-parser languages.
//! The shared table (urls, emails, TODO markers) is appended to every
//! language.

mod common;
mod formats;
mod javascript;
mod python;
mod rust;

use super::{ExtractRule, Pattern, PatternCategory, PatternKind, PatternTestCase, RecoveryConfig};

/// All built-in patterns for a (normalized) language id.
pub fn builtin(language_id: &str) -> Vec<Pattern> {
    let mut patterns = match language_id {
        "python" => python::patterns(),
        "rust" => rust::patterns(),
        "javascript" => javascript::patterns(),
        _ => formats::patterns(language_id),
    };
    patterns.extend(common::patterns(language_id));
    patterns
}

/// AST-query pattern with the conventional `@item` / `@name` captures.
fn query(
    language: &str,
    id: &str,
    category: PatternCategory,
    source: &str,
    item_kind: &'static str,
) -> Pattern {
    Pattern {
        id: id.to_string(),
        language_id: language.to_string(),
        category,
        kind: PatternKind::AstQuery,
        source: source.to_string(),
        extract: ExtractRule {
            item_kind,
            name_capture: Some("name"),
        },
        test_cases: Vec::new(),
        fallback_ids: Vec::new(),
        recovery_regex: None,
        recovery: RecoveryConfig::default(),
    }
}

/// Regex pattern; `(?P<name>...)` groups feed the naming capture.
fn regex(
    language: &str,
    id: &str,
    category: PatternCategory,
    source: &str,
    item_kind: &'static str,
) -> Pattern {
    Pattern {
        id: id.to_string(),
        language_id: language.to_string(),
        category,
        kind: PatternKind::Regex,
        source: source.to_string(),
        extract: ExtractRule {
            item_kind,
            name_capture: Some("name"),
        },
        test_cases: Vec::new(),
        fallback_ids: Vec::new(),
        recovery_regex: None,
        recovery: RecoveryConfig::default(),
    }
}

fn with_recovery(mut pattern: Pattern, recovery_regex: &str) -> Pattern {
    pattern.recovery_regex = Some(recovery_regex.to_string());
    pattern
}

fn with_tests(mut pattern: Pattern, cases: &[(&'static str, bool)]) -> Pattern {
    pattern.test_cases = cases
        .iter()
        .map(|&(source, should_match)| PatternTestCase {
            source,
            should_match,
        })
        .collect();
    pattern
}

fn with_fallbacks(mut pattern: Pattern, ids: &[&str]) -> Pattern {
    pattern.fallback_ids = ids.iter().map(|s| (*s).to_string()).collect();
    pattern
}

fn without_name(mut pattern: Pattern) -> Pattern {
    pattern.extract.name_capture = None;
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_definition_is_structurally_valid() {
        for lang in [
            "python",
            "rust",
            "javascript",
            "markdown",
            "yaml",
            "toml",
            "json",
            "ini",
            "env",
            "rst",
            "asciidoc",
            "graphql",
            "xml",
            "editorconfig",
            "plaintext",
        ] {
            for pattern in builtin(lang) {
                assert!(
                    pattern.check().is_ok(),
                    "invalid builtin pattern {}",
                    pattern.id
                );
                assert_eq!(pattern.language_id, lang);
            }
        }
    }

    #[test]
    fn ast_languages_carry_query_patterns_with_recovery() {
        let python = builtin("python");
        let function = python
            .iter()
            .find(|p| p.id == "python.function")
            .expect("python.function");
        assert_eq!(function.kind, PatternKind::AstQuery);
        assert!(function.recovery_regex.is_some());
        assert!(!function.test_cases.is_empty());
    }

    #[test]
    fn unknown_language_still_gets_the_common_table() {
        let patterns = builtin("plaintext");
        assert!(patterns.iter().any(|p| p.id.ends_with(".todo")));
    }
}
