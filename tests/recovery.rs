//! Recovery-strategy behavior on malformed input.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parsemill::backend::ast::AstBackend;
use parsemill::cache::request::RequestCache;
use parsemill::engine::PatternEngine;
use parsemill::patterns::{
    ExtractRule, Pattern, PatternCategory, PatternKind, PatternRegistry, RecoveryConfig,
};
use parsemill::telemetry::TelemetryHub;
use parsemill::{Deadline, EngineConfig, ParseOptions, ParserContext, UnifiedParser};

fn engine<'a>(
    registry: &'a PatternRegistry,
    ast: &'a AstBackend,
    telemetry: &'a TelemetryHub,
    request: Option<&'a RequestCache>,
) -> PatternEngine<'a> {
    PatternEngine {
        registry,
        ast,
        telemetry,
        pattern_cache: None,
        request_cache: request,
        deadline: Deadline::unbounded(),
        strategy_budget: Duration::from_millis(50),
        content_hash: 0xfeed,
    }
}

/// A query that cannot match malformed source falls through to its
/// recovery regex: one synthesized match, confidence 0.4, node kind
/// "regex-recovery", name captured from the regex group.
#[test]
fn regex_recovery_on_malformed_python() {
    let registry = PatternRegistry::new();
    let ast = AstBackend::new();
    let telemetry = TelemetryHub::new();

    // The class query has nothing to match here; the recovery regex
    // picks the def line up instead.
    let pattern = Pattern {
        id: "test.def_scanner".to_string(),
        language_id: "python".to_string(),
        category: PatternCategory::Syntax,
        kind: PatternKind::AstQuery,
        source: "(class_definition name: (identifier) @name) @item".to_string(),
        extract: ExtractRule {
            item_kind: "function",
            name_capture: Some("name"),
        },
        test_cases: Vec::new(),
        fallback_ids: Vec::new(),
        recovery_regex: Some(r"^\s*def\s+(?P<name>\w+)".to_string()),
        recovery: RecoveryConfig::default(),
    };

    let source = b"def foo(:\n    pass";
    let tree = ast.parse("python", source).unwrap();
    let eng = engine(&registry, &ast, &telemetry, None);
    let outcome = eng.process(&tree, source, &pattern);

    assert!(outcome.recovered);
    assert_eq!(outcome.matches.len(), 1);
    let m = &outcome.matches[0];
    assert_eq!(m.name.as_deref(), Some("foo"));
    assert_eq!(m.metadata.confidence, 0.4);
    assert_eq!(m.metadata.node_kind, "regex-recovery");
    assert_eq!(m.metadata.recovered.as_deref(), Some("regex"));

    // Captures reference the source bytes exactly.
    let name_span = m.captures["name"][0];
    assert_eq!(&source[name_span.start_byte..name_span.end_byte], b"foo");
}

/// Fallback patterns are the first strategy: a non-matching pattern with
/// a fallback id inherits the fallback's matches, marked as recovered.
#[test]
fn fallback_pattern_strategy() {
    let registry = PatternRegistry::new();
    let ast = AstBackend::new();
    let telemetry = TelemetryHub::new();

    // python.exception_handler falls back to python.branch; source has a
    // for loop but no try/except.
    let pattern = registry.get("python", "python.exception_handler").unwrap();
    let source = b"for i in range(3):\n    print(i)\n";
    let tree = ast.parse("python", source).unwrap();

    let eng = engine(&registry, &ast, &telemetry, None);
    let outcome = eng.process(&tree, source, &pattern);

    // exception_handler is ErrorHandling category: recovery heuristic
    // does not apply, so it stays empty.
    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.recovery_attempts, 0);

    // A Syntax-category clone of the same pattern does recover through
    // its fallback.
    let mut syntax_variant = (*pattern).clone();
    syntax_variant.id = "test.handler_with_fallback".to_string();
    syntax_variant.category = PatternCategory::Syntax;
    let outcome = eng.process(&tree, source, &syntax_variant);

    assert!(outcome.recovered);
    assert!(!outcome.matches.is_empty());
    assert!(
        outcome
            .matches
            .iter()
            .all(|m| m.metadata.recovered.as_deref() == Some("fallback"))
    );
}

/// Enabling recovery never decreases the number of matches.
#[test]
fn recovery_monotonicity() {
    let registry = PatternRegistry::new();
    let ast = AstBackend::new();
    let telemetry = TelemetryHub::new();

    let base = registry.get("python", "python.function").unwrap();
    let mut disabled = (*base).clone();
    disabled.id = "test.function_no_recovery".to_string();
    disabled.recovery = RecoveryConfig {
        enabled: false,
        strategy_budget_ms: 50,
    };

    for source in [
        b"def foo(): pass\n".as_slice(),
        b"def broken(:\n    pass".as_slice(),
        b"not python at all\n".as_slice(),
    ] {
        let tree = ast.parse("python", source).unwrap();
        let eng = engine(&registry, &ast, &telemetry, None);
        let with = eng.process(&tree, source, &base).matches.len();
        let without = eng.process(&tree, source, &disabled).matches.len();
        assert!(
            with >= without,
            "recovery decreased matches on {:?}",
            String::from_utf8_lossy(source)
        );
    }
}

/// Recovered results memoize in the request tier only; a shared request
/// cache carries them across calls within a logical unit.
#[test]
fn shared_request_cache_spans_calls() {
    let ctx = ParserContext::new(EngineConfig::default()).unwrap();
    let parser = UnifiedParser::new(Arc::new(ctx));

    let shared = Arc::new(RequestCache::new());
    let options = ParseOptions {
        shared_request_cache: Some(Arc::clone(&shared)),
        ..ParseOptions::default()
    };

    // Plain prose through the python grammar: Syntax/Structure patterns
    // find nothing and recovery runs, leaving request-tier entries.
    let source = b"plain prose, nothing pythonic here\n";
    let first = parser.parse(Path::new("prose.py"), source, &options);
    assert!(first.telemetry.recovery_attempts > 0);
    assert!(!shared.is_empty());

    let before = shared.len();
    let second = parser.parse(Path::new("prose.py"), source, &options);
    assert!(second.telemetry.cache_hits > 0);
    assert_eq!(shared.len(), before);
}

/// End-to-end: malformed python still reports the function through the
/// built-in pattern's recovery regex.
#[test]
fn unified_parse_recovers_function_name() {
    let ctx = ParserContext::new(EngineConfig::default()).unwrap();
    let parser = UnifiedParser::new(Arc::new(ctx));

    let source = b"def foo(:\n    pass";
    let result = parser.parse(Path::new("broken.py"), source, &ParseOptions::default());

    // Whether the grammar's error recovery or the regex strategy found
    // it, a function named foo must be reported.
    assert!(
        result
            .matches
            .iter()
            .any(|m| m.metadata.item_kind == "function" && m.name.as_deref() == Some("foo")),
        "no function match found: {:?}",
        result.matches
    );
}
