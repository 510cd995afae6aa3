//! **parsemill** - Language-agnostic parsing and pattern engine for
//! repository analysis at scale.
//!
//! Classifies files, parses them through a tree-sitter backend or
//! hand-written format parsers behind one contract, applies compiled
//! patterns with graceful three-strategy recovery, and assembles
//! normalized trees, matches, blocks, and categorized features into a
//! single result record. Two coordinated cache tiers (persistent LRU +
//! request-scoped memoization) and per-pattern telemetry wrap the whole
//! pipeline.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use parsemill::{EngineConfig, ParseOptions, ParserContext, UnifiedParser};
//!
//! let ctx = Arc::new(ParserContext::new(EngineConfig::default()).unwrap());
//! let parser = UnifiedParser::new(ctx);
//! let result = parser.parse(
//!     Path::new("demo.py"),
//!     b"def foo(a, b):\n    return a + b\n",
//!     &ParseOptions::default(),
//! );
//! assert!(result.success);
//! ```

/// File classification: language, parser kind, binary detection
pub mod classify;

/// Error taxonomy and per-result issue records
pub mod error;

/// Normalized syntax tree shared by all backends
pub mod tree;

/// Per-call options and engine configuration
pub mod options;

/// Memory-bounded caching with coordination (persistent + request tiers)
pub mod cache;

/// Pattern model, registry, compilation, and built-in tables
pub mod patterns;

/// Parser backends: tree-sitter AST and hand-written format parsers
pub mod backend;

/// Block extraction: node to coherent source region
pub mod blocks;

/// Pattern evaluation with three-strategy recovery
pub mod engine;

/// Feature categorization and derived naming/complexity items
pub mod features;

/// Per-pattern metrics, recovery statistics, error audit
pub mod telemetry;

/// The unified parser facade and its caller-supplied context
pub mod unified;

/// Infrastructure: line indexing and content hashing
pub mod infra {
    pub mod hash;
    pub mod line_index;
}

pub use blocks::{BlockOptions, ExtractedBlock};
pub use classify::{
    Classification, FileKind, ParserKind, classify, classify_reader, normalize_language,
};
pub use error::{ParseErrorKind, ParseIssue, Stage};
pub use features::{FeatureCategory, FeatureItem, FeatureSet};
pub use options::{Deadline, EngineConfig, ParseOptions};
pub use patterns::{
    Pattern, PatternCategory, PatternKind, PatternMatch, PatternRegistry, PatternValidation,
};
pub use telemetry::{MetricRecord, MetricSink, PatternMetrics, TelemetryHub};
pub use tree::{Node, ParseTree, Point, Span};
pub use unified::{ParserContext, ParserResult, SourceUnit, UnifiedParser};
