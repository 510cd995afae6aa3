//! Filepath: src/unified.rs
//! The unified parser facade.
//!
//! One entry point: classify → select backend → parse → run patterns →
//! materialize blocks → build features → emit telemetry → return. Every
//! failure a subcomponent reports becomes a `ParseIssue` on the result;
//! the facade never panics and never propagates an error to the caller.
//!
//! Global state is deliberately absent: callers construct a
//! [`ParserContext`] carrying the registry, the cache coordinator, the
//! telemetry hub, and the worker pool, and hand it to every parser.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::backend::{BackendSet, SelectedBackend};
use crate::blocks::{self, BlockOptions, ExtractedBlock};
use crate::cache::request::RequestCache;
use crate::cache::{
    AST_CACHE, CLASSIFICATION_CACHE, CachePolicy, CacheCoordinator, CacheValue, PATTERN_CACHE,
    UnifiedCache,
};
use crate::classify::{self, Classification, FileKind, ParserKind};
use crate::engine::PatternEngine;
use crate::error::{ParseErrorKind, ParseIssue, Stage};
use crate::features::{self, FeatureSet};
use crate::infra::hash::content_hash;
use crate::options::{Deadline, EngineConfig, ParseOptions};
use crate::patterns::{PatternCategory, PatternMatch, PatternRegistry};
use crate::telemetry::{MetricRecord, Operation, PatternMetrics, TelemetryHub};
use crate::tree::ParseTree;

/// The input to one parse. Immutable for the call's lifetime; spans in
/// the result index into `bytes`.
#[derive(Debug, Clone, Copy)]
pub struct SourceUnit<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
    pub declared_language: Option<&'a str>,
}

/// The assembled output of one parse. A value: once returned it observes
/// no further mutation.
#[derive(Debug, Clone, Serialize)]
pub struct ParserResult {
    pub success: bool,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<ParseTree>,
    pub matches: Vec<PatternMatch>,
    pub features: FeatureSet,
    pub blocks: Vec<ExtractedBlock>,
    pub errors: Vec<ParseIssue>,
    pub telemetry: PatternMetrics,
}

impl ParserResult {
    fn empty(classification: Classification) -> Self {
        Self {
            success: true,
            classification,
            tree: None,
            matches: Vec::new(),
            features: FeatureSet::default(),
            blocks: Vec::new(),
            errors: Vec::new(),
            telemetry: PatternMetrics::default(),
        }
    }
}

/// Cacheable parse tree payload.
pub struct CachedTree(pub ParseTree);

impl CacheValue for CachedTree {
    fn size_bytes(&self) -> usize {
        self.0.approximate_size_bytes()
    }
}

/// Cacheable classification payload.
pub struct CachedClassification(pub Classification);

impl CacheValue for CachedClassification {
    fn size_bytes(&self) -> usize {
        self.0.approximate_size_bytes()
    }
}

/// Caller-supplied context: registry, caches, telemetry, worker pool.
pub struct ParserContext {
    pub registry: Arc<PatternRegistry>,
    pub caches: Arc<CacheCoordinator>,
    pub telemetry: Arc<TelemetryHub>,
    pub config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl ParserContext {
    /// Build a context with the named caches registered and a bounded
    /// worker pool for pattern fan-out.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_workers())
            .thread_name(|i| format!("parsemill-worker-{i}"))
            .build()
            .context("Failed to build the pattern worker pool")?;

        let caches = Arc::new(CacheCoordinator::new());
        let ttl = Duration::from_secs(config.default_ttl_secs);
        for (name, budget) in [
            (AST_CACHE, config.ast_cache_bytes),
            (PATTERN_CACHE, config.pattern_cache_bytes),
            (CLASSIFICATION_CACHE, config.classification_cache_bytes),
        ] {
            caches.register(Arc::new(UnifiedCache::new(
                name,
                CachePolicy {
                    budget_bytes: budget,
                    default_ttl: ttl,
                    adaptive_ttl: config.adaptive_ttl,
                },
            )));
        }

        Ok(Self {
            registry: Arc::new(PatternRegistry::new()),
            caches,
            telemetry: Arc::new(TelemetryHub::new()),
            config,
            pool,
        })
    }

    fn cache(&self, name: &str) -> Option<Arc<UnifiedCache>> {
        self.caches.cache(name)
    }
}

/// The facade. Safe to share and invoke from many threads.
pub struct UnifiedParser {
    ctx: Arc<ParserContext>,
    backends: BackendSet,
}

impl UnifiedParser {
    pub fn new(ctx: Arc<ParserContext>) -> Self {
        Self {
            ctx,
            backends: BackendSet::with_builtins(),
        }
    }

    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }

    /// Classification with the persistent classification cache consulted
    /// by (path, content hash).
    pub fn classify(&self, path: &Path, bytes_prefix: &[u8]) -> Classification {
        self.classify_cached(path, bytes_prefix, None)
    }

    fn classify_cached(
        &self,
        path: &Path,
        bytes_prefix: &[u8],
        declared: Option<&str>,
    ) -> Classification {
        let sniff = &bytes_prefix[..bytes_prefix.len().min(self.ctx.config.sniff_limit_bytes)];
        let key = format!(
            "cls:{}:{:016x}:{}",
            path.display(),
            content_hash(sniff),
            declared.unwrap_or_default(),
        );

        if let Some(cache) = self.ctx.cache(CLASSIFICATION_CACHE)
            && let Some(hit) = cache.get_as::<CachedClassification>(&key)
        {
            return hit.0.clone();
        }

        let started = Instant::now();
        let classification = classify::classify_with_declared(path, sniff, declared);
        self.ctx.telemetry.record(MetricRecord {
            component: "classifier",
            language: Some(classification.language_id.clone()),
            pattern_id: None,
            operation: Operation::Classify,
            duration_us: started.elapsed().as_micros() as u64,
            success: true,
        });

        if let Some(cache) = self.ctx.cache(CLASSIFICATION_CACHE)
            && let Err(kind) = cache.set(
                &key,
                Arc::new(CachedClassification(classification.clone())),
                None,
                &[],
            )
        {
            self.ctx.telemetry.record_issue(&kind);
        }

        classification
    }

    /// Parse one source unit. Total: every outcome is a `ParserResult`.
    #[instrument(skip_all, fields(path = %path.display(), bytes = bytes.len()))]
    pub fn parse(&self, path: &Path, bytes: &[u8], options: &ParseOptions) -> ParserResult {
        let started = Instant::now();
        let deadline = options.deadline_from(started);

        let unit = SourceUnit {
            path,
            bytes,
            declared_language: None,
        };
        let mut result = self.parse_unit(unit, options, deadline);

        result.telemetry.elapsed_us = started.elapsed().as_micros() as u64;
        self.ctx.telemetry.record(MetricRecord {
            component: "unified_parser",
            language: Some(result.classification.language_id.clone()),
            pattern_id: None,
            operation: Operation::Parse,
            duration_us: result.telemetry.elapsed_us,
            success: result.success,
        });
        result
    }

    /// Parse from a lazy reader. When the source bytes cannot be
    /// sampled, the classification failure is surfaced as `Unreadable`
    /// on a result that still carries a path-derived classification.
    pub fn parse_from_reader<R: std::io::Read>(
        &self,
        path: &Path,
        reader: &mut R,
        options: &ParseOptions,
    ) -> ParserResult {
        let mut bytes = Vec::new();
        match reader.read_to_end(&mut bytes) {
            Ok(_) => self.parse(path, &bytes, options),
            Err(error) => {
                debug!(%error, "source bytes could not be sampled");
                let kind = ParseErrorKind::Unreadable;
                self.ctx.telemetry.record_issue(&kind);

                let mut result =
                    ParserResult::empty(classify::classify_with_declared(path, b"", None));
                result
                    .errors
                    .push(ParseIssue::new(Stage::Classify, "classifier", kind));
                result.success = !result.errors.iter().any(|issue| is_surfaced(&issue.kind));
                result
            }
        }
    }

    fn parse_unit(
        &self,
        unit: SourceUnit<'_>,
        options: &ParseOptions,
        deadline: Deadline,
    ) -> ParserResult {
        // Stage 1: classify. Classification is always populated, even on
        // the cancellation path.
        let classification =
            self.classify_cached(unit.path, unit.bytes, unit.declared_language);
        let mut result = ParserResult::empty(classification);

        if self.cancelled(&mut result, deadline, Stage::Classify) {
            return result;
        }

        // Stage 2: binary and unparseable units are empty successes.
        if result.classification.parser_kind == ParserKind::None
            || result.classification.file_kind == FileKind::Binary
        {
            debug!("binary or unparseable unit, returning empty result");
            return result;
        }

        // Stage 3: resolve a backend, walking fallbacks.
        let Some((language, backend)) = self.backends.resolve(&result.classification) else {
            let kind = ParseErrorKind::BackendUnavailable {
                language: result.classification.language_id.clone(),
            };
            self.ctx.telemetry.record_issue(&kind);
            result
                .errors
                .push(ParseIssue::new(Stage::Parse, "backend", kind));
            result.success = false;
            return result;
        };

        // Stages 4-5: parse, consulting the persistent AST cache.
        let hash = content_hash(unit.bytes);
        let tree = match self.parse_with_cache(&language, unit.bytes, hash, &backend, deadline) {
            Ok(tree) => tree,
            Err(kind) => {
                self.ctx.telemetry.record_issue(&kind);
                result
                    .errors
                    .push(ParseIssue::new(Stage::Parse, "backend", kind));
                result.success = false;
                return result;
            }
        };

        if self.cancelled(&mut result, deadline, Stage::Parse) {
            return result;
        }

        // Stage 6-7: load patterns and run the engine.
        let request_cache = options
            .shared_request_cache
            .clone()
            .or_else(|| options.request_cache_enabled.then(|| Arc::new(RequestCache::new())));

        let pattern_cache = self.ctx.cache(PATTERN_CACHE);
        let engine = PatternEngine {
            registry: &self.ctx.registry,
            ast: &self.backends.ast,
            telemetry: &self.ctx.telemetry,
            pattern_cache: pattern_cache.as_deref(),
            request_cache: request_cache.as_deref(),
            deadline,
            strategy_budget: Duration::from_millis(self.ctx.config.strategy_budget_ms),
            content_hash: hash,
        };

        let sweep = engine.process_all(
            &tree,
            unit.bytes,
            &language,
            options.categories.as_ref(),
            Some(&self.ctx.pool),
        );

        result.matches = sweep.matches;
        result.errors.extend(sweep.issues);
        result.telemetry.patterns_run = sweep.patterns_run;
        result.telemetry.matches_found = result.matches.len();
        result.telemetry.recovery_attempts = sweep.recovery_attempts;
        result.telemetry.recovered_matches = sweep.recovered_matches;
        result.telemetry.cache_hits = sweep.cache_hits;

        if self.cancelled(&mut result, deadline, Stage::Patterns) {
            return result;
        }

        // Stage 8: materialize blocks for the structural subset.
        if options.extract_blocks {
            let started = Instant::now();
            result.blocks = self.materialize_blocks(&language, unit.bytes, &tree, &result.matches);
            self.ctx.telemetry.record(MetricRecord {
                component: "block_extractor",
                language: Some(language.clone()),
                pattern_id: None,
                operation: Operation::Blocks,
                duration_us: started.elapsed().as_micros() as u64,
                success: true,
            });
        }

        if self.cancelled(&mut result, deadline, Stage::Blocks) {
            return result;
        }

        // Stage 9: categorized features.
        if options.extract_features {
            let started = Instant::now();
            result.features = features::extract(&result.matches, &language);
            self.ctx.telemetry.record(MetricRecord {
                component: "feature_extractor",
                language: Some(language.clone()),
                pattern_id: None,
                operation: Operation::Features,
                duration_us: started.elapsed().as_micros() as u64,
                success: true,
            });
        }

        if options.include_ast {
            result.tree = Some(tree);
        }

        // Surfaced error kinds flip success; locally-recovered ones are
        // annotations on a best-effort result.
        result.success = !result.errors.iter().any(|issue| is_surfaced(&issue.kind));

        result
    }

    fn parse_with_cache(
        &self,
        language: &str,
        bytes: &[u8],
        hash: u64,
        backend: &SelectedBackend<'_>,
        deadline: Deadline,
    ) -> Result<ParseTree, ParseErrorKind> {
        let key = format!("ast:{language}:{hash:016x}");
        let ast_cache = self.ctx.cache(AST_CACHE);

        if let Some(cache) = &ast_cache
            && let Some(hit) = cache.get_as::<CachedTree>(&key)
        {
            return Ok(hit.0.clone());
        }

        let started = Instant::now();
        let tree = match backend {
            SelectedBackend::Ast => self.backends.ast.parse(language, bytes)?,
            SelectedBackend::Custom(parser) => parser.parse(bytes),
        };
        self.ctx.telemetry.record(MetricRecord {
            component: "backend",
            language: Some(language.to_string()),
            pattern_id: None,
            operation: Operation::Parse,
            duration_us: started.elapsed().as_micros() as u64,
            success: true,
        });

        // Cancellation must leave no trace in persistent caches.
        if !deadline.expired()
            && let Some(cache) = &ast_cache
            && let Err(kind) = cache.set(&key, Arc::new(CachedTree(tree.clone())), None, &[])
        {
            self.ctx.telemetry.record_issue(&kind);
        }

        Ok(tree)
    }

    fn materialize_blocks(
        &self,
        language: &str,
        bytes: &[u8],
        tree: &ParseTree,
        matches: &[PatternMatch],
    ) -> Vec<ExtractedBlock> {
        let mut blocks = Vec::new();
        let mut seen_spans = Vec::new();

        for m in matches {
            if !matches!(
                m.metadata.category,
                PatternCategory::Syntax | PatternCategory::Structure | PatternCategory::CodePattern
            ) {
                continue;
            }
            let span_key = (m.primary_span.start_byte, m.primary_span.end_byte);
            if seen_spans.contains(&span_key) {
                continue;
            }
            if let Some(block) =
                blocks::extract_from_match(language, bytes, tree, m, BlockOptions::default())
            {
                seen_spans.push(span_key);
                blocks.push(block);
            }
        }
        blocks
    }

    /// Deadline observation at a stage boundary.
    fn cancelled(&self, result: &mut ParserResult, deadline: Deadline, stage: Stage) -> bool {
        if !deadline.expired() {
            return false;
        }
        let kind = ParseErrorKind::Cancelled;
        self.ctx.telemetry.record_issue(&kind);
        result
            .errors
            .push(ParseIssue::new(stage, "unified_parser", kind));
        result.success = false;
        true
    }
}

/// Kinds that flip `success`: classification failure, cancellation, and
/// a missing backend with no fallback. Everything else is recovered
/// locally and stays an annotation.
fn is_surfaced(kind: &ParseErrorKind) -> bool {
    matches!(
        kind,
        ParseErrorKind::Cancelled
            | ParseErrorKind::Unreadable
            | ParseErrorKind::BackendUnavailable { .. }
            | ParseErrorKind::GrammarVersionMismatch { .. }
    )
}
