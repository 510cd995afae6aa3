//! Deadline observation and cancellation semantics.

use std::path::Path;
use std::sync::Arc;

use parsemill::cache::AST_CACHE;
use parsemill::{EngineConfig, ParseErrorKind, ParseOptions, ParserContext, UnifiedParser};

fn parser() -> UnifiedParser {
    let ctx = ParserContext::new(EngineConfig::default()).unwrap();
    UnifiedParser::new(Arc::new(ctx))
}

/// A tiny deadline against a large input returns a cancelled result with
/// classification populated and nothing leaked into persistent caches.
#[test]
fn cancellation_leaves_no_cache_side_effects() {
    let parser = parser();

    // ~2 MiB of generated python.
    let mut source = Vec::with_capacity(2 << 20);
    while source.len() < (2 << 20) {
        source.extend_from_slice(b"x = 1\ny = x + 2\n");
    }

    let options = ParseOptions {
        pattern_timeout_ms: 5,
        ..ParseOptions::default()
    };
    let result = parser.parse(Path::new("huge.py"), &source, &options);

    assert!(!result.success);
    assert!(
        result
            .errors
            .iter()
            .any(|i| i.kind == ParseErrorKind::Cancelled)
    );
    // Classification is always populated, even on the cancel path.
    assert_eq!(result.classification.language_id, "python");

    // The AST cache must not have absorbed the cancelled parse.
    let ast_cache = parser.context().caches.cache(AST_CACHE).unwrap();
    assert_eq!(ast_cache.len(), 0, "cancelled parse leaked into the ast cache");
}

/// A zero-millisecond deadline cancels at the first stage boundary.
#[test]
fn zero_deadline_cancels_immediately() {
    let parser = parser();
    let options = ParseOptions {
        pattern_timeout_ms: 0,
        ..ParseOptions::default()
    };
    let result = parser.parse(Path::new("a.py"), b"def f(): pass\n", &options);

    assert!(!result.success);
    assert!(
        result
            .errors
            .iter()
            .any(|i| i.kind == ParseErrorKind::Cancelled)
    );
    assert!(result.matches.is_empty());
}

/// Cancellation is terminal but later calls with room succeed; the
/// engine holds no poisoned state.
#[test]
fn parser_recovers_after_cancellation() {
    let parser = parser();

    let cancelled = parser.parse(
        Path::new("a.py"),
        b"def f(): pass\n",
        &ParseOptions {
            pattern_timeout_ms: 0,
            ..ParseOptions::default()
        },
    );
    assert!(!cancelled.success);

    let ok = parser.parse(
        Path::new("a.py"),
        b"def f(): pass\n",
        &ParseOptions::default(),
    );
    assert!(ok.success, "errors: {:?}", ok.errors);
    assert!(!ok.matches.is_empty());
}

/// Concurrent parses on disjoint units do not interfere.
#[test]
fn concurrent_parses_are_independent() {
    let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
    let parser = Arc::new(UnifiedParser::new(ctx));

    let mut handles = Vec::new();
    for t in 0..4 {
        let parser = Arc::clone(&parser);
        handles.push(std::thread::spawn(move || {
            let source = format!("def worker_{t}():\n    return {t}\n");
            let result = parser.parse(
                Path::new("w.py"),
                source.as_bytes(),
                &ParseOptions::default(),
            );
            assert!(result.success);
            assert!(
                result
                    .matches
                    .iter()
                    .any(|m| m.name.as_deref() == Some(format!("worker_{t}").as_str()))
            );
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
