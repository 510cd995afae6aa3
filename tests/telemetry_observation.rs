//! Telemetry: sink subscription, pattern scores, error audit.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use parsemill::telemetry::Operation;
use parsemill::{
    EngineConfig, MetricRecord, MetricSink, ParseOptions, ParserContext, UnifiedParser,
};

/// Sink that records everything it sees.
#[derive(Default)]
struct Recorder {
    records: Mutex<Vec<MetricRecord>>,
}

impl MetricSink for Recorder {
    fn record(&self, record: &MetricRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

#[test]
fn sinks_observe_every_stage() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
    let recorder = Arc::new(Recorder::default());
    ctx.telemetry.subscribe(Arc::clone(&recorder) as Arc<dyn MetricSink>);

    let parser = UnifiedParser::new(Arc::clone(&ctx));
    let result = parser.parse(
        Path::new("demo.py"),
        b"def foo():\n    return 1\n",
        &ParseOptions::default(),
    );
    assert!(result.success);

    let records = recorder.records.lock().unwrap();
    let has = |component: &str| records.iter().any(|r| r.component == component);
    assert!(has("classifier"));
    assert!(has("backend"));
    assert!(has("engine"));
    assert!(has("block_extractor"));
    assert!(has("feature_extractor"));
    assert!(has("unified_parser"));

    // Query records carry the pattern id and language.
    assert!(records.iter().any(|r| {
        matches!(r.operation, Operation::Query)
            && r.pattern_id.as_deref() == Some("python.function")
            && r.language.as_deref() == Some("python")
    }));
}

#[test]
fn pattern_scores_accumulate() {
    let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
    let parser = UnifiedParser::new(Arc::clone(&ctx));

    assert!(ctx.telemetry.pattern_score("python.function").is_none());

    let _ = parser.parse(
        Path::new("a.py"),
        b"def a():\n    pass\n",
        &ParseOptions::default(),
    );

    let score = ctx.telemetry.pattern_score("python.function");
    assert!(score.is_some(), "score missing after an execution");

    let snapshot = ctx.telemetry.snapshot();
    let agg = snapshot.patterns.get("python.function").unwrap();
    assert!(agg.executions >= 1);
    assert!(agg.matches >= 1);
}

#[test]
fn error_audit_counts_surfaced_failures() {
    let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
    let parser = UnifiedParser::new(Arc::clone(&ctx));

    // Unknown backend surfaces BackendUnavailable into the audit.
    let result = parser.parse(
        Path::new("main.go"),
        b"package main\n",
        &ParseOptions::default(),
    );
    assert!(!result.success);

    let snapshot = ctx.telemetry.snapshot();
    assert!(
        snapshot
            .errors
            .get("backend.unavailable")
            .copied()
            .unwrap_or(0)
            >= 1
    );
}

#[test]
fn per_result_metrics_are_populated() {
    let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
    let parser = UnifiedParser::new(ctx);

    let result = parser.parse(
        Path::new("demo.py"),
        b"import os\n\ndef foo():\n    pass\n",
        &ParseOptions::default(),
    );

    assert!(result.telemetry.patterns_run > 0);
    assert_eq!(result.telemetry.matches_found, result.matches.len());
    // elapsed_us is stamped by the facade.
    assert!(result.telemetry.elapsed_us > 0);
}
