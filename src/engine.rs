//! Filepath: src/engine.rs
//! Pattern evaluation and three-strategy recovery.
//!
//! Evaluation order per pattern: request cache → persistent cache →
//! primary run → recovery ladder. Clean results are memoized in the
//! persistent pattern cache by (language, pattern id, content hash);
//! recovered results only ever land in the request-scoped cache.
//!
//! Recovery ladder (each strategy timed against a budget, recorded in
//! telemetry, and only attempted when the primary produced nothing on a
//! unit that syntactically should have matched):
//!   1. fallback pattern ids, first non-empty result wins
//!   2. the pattern's recovery regex, applied line by line
//!   3. partial match: the query re-run per top-level child, unioned

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::backend::ast::{AstBackend, RawQueryMatch};
use crate::cache::request::RequestCache;
use crate::cache::{CacheValue, UnifiedCache};
use crate::error::{ParseErrorKind, ParseIssue, Stage};
use crate::infra::line_index::NewlineIndex;
use crate::options::Deadline;
use crate::patterns::{
    CompiledPattern, MatchMetadata, Pattern, PatternCategory, PatternKind, PatternMatch,
    PatternRegistry,
};
use crate::telemetry::{MetricRecord, Operation, RecoveryStrategy, TelemetryHub};
use crate::tree::{ParseTree, Span};

/// Cacheable wrapper for a pattern's terminal match list.
pub struct CachedMatches(pub Vec<PatternMatch>);

impl CacheValue for CachedMatches {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self
                .0
                .iter()
                .map(PatternMatch::approximate_size_bytes)
                .sum::<usize>()
    }
}

/// Outcome of one pattern evaluation.
#[derive(Default)]
pub struct PatternOutcome {
    pub matches: Vec<PatternMatch>,
    pub issues: Vec<ParseIssue>,
    pub recovery_attempts: usize,
    pub recovered: bool,
    pub cache_hit: bool,
}

/// Outcome of a full `process_all` sweep.
#[derive(Default)]
pub struct SweepOutcome {
    pub matches: Vec<PatternMatch>,
    pub issues: Vec<ParseIssue>,
    pub patterns_run: usize,
    pub recovery_attempts: usize,
    pub recovered_matches: usize,
    pub cache_hits: usize,
}

/// Pattern evaluation over one parsed unit. Borrowed collaborators come
/// from the caller-supplied context; nothing here is global.
pub struct PatternEngine<'a> {
    pub registry: &'a PatternRegistry,
    pub ast: &'a AstBackend,
    pub telemetry: &'a TelemetryHub,
    pub pattern_cache: Option<&'a UnifiedCache>,
    pub request_cache: Option<&'a RequestCache>,
    pub deadline: Deadline,
    pub strategy_budget: Duration,
    /// Content hash of the unit, the cache-key component.
    pub content_hash: u64,
}

impl PatternEngine<'_> {
    /// Evaluate one pattern, recovery included.
    pub fn process(
        &self,
        tree: &ParseTree,
        source: &[u8],
        pattern: &Pattern,
    ) -> PatternOutcome {
        let mut outcome = PatternOutcome::default();
        let memo_key = format!(
            "{}:{}:{:016x}",
            pattern.language_id, pattern.id, self.content_hash
        );

        if let Some(request) = self.request_cache
            && let Some(cached) = request.get_as::<CachedMatches>(&memo_key)
        {
            outcome.matches = cached.0.clone();
            outcome.cache_hit = true;
            return outcome;
        }

        if let Some(cache) = self.pattern_cache
            && let Some(cached) = cache.get_as::<CachedMatches>(&memo_key)
        {
            outcome.matches = cached.0.clone();
            outcome.cache_hit = true;
            return outcome;
        }

        if self.registry.is_unusable(&pattern.language_id, &pattern.id) {
            return outcome;
        }

        let started = Instant::now();
        let primary = self.eval_primary(tree, source, pattern, &mut outcome.issues);
        self.telemetry.record(MetricRecord {
            component: "engine",
            language: Some(pattern.language_id.clone()),
            pattern_id: Some(pattern.id.clone()),
            operation: Operation::Query,
            duration_us: started.elapsed().as_micros() as u64,
            success: !primary.is_empty(),
        });

        outcome.matches = primary;

        if outcome.matches.is_empty() && self.should_recover(source, pattern) {
            self.run_recovery(tree, source, pattern, &mut outcome);
        }

        // Memoization: clean terminals go to the persistent tier;
        // recovered ones stay request-scoped.
        let payload = Arc::new(CachedMatches(outcome.matches.clone()));
        if outcome.recovery_attempts == 0 {
            if let Some(cache) = self.pattern_cache
                && let Err(kind) = cache.set(&memo_key, payload, None, &[])
            {
                self.telemetry.record_issue(&kind);
            }
        } else if let Some(request) = self.request_cache {
            request.set(memo_key, payload);
        }

        outcome
    }

    /// Evaluate every applicable pattern for a language, optionally
    /// restricted by category, fanning out across `pool`.
    pub fn process_all(
        &self,
        tree: &ParseTree,
        source: &[u8],
        language_id: &str,
        categories: Option<&BTreeSet<PatternCategory>>,
        pool: Option<&rayon::ThreadPool>,
    ) -> SweepOutcome {
        let table = self.registry.patterns_for(language_id);
        let applicable: Vec<Arc<Pattern>> = table
            .iter()
            .filter(|p| categories.is_none_or(|set| set.contains(&p.category)))
            .filter(|p| !self.registry.is_unusable(&p.language_id, &p.id))
            .cloned()
            .collect();

        let mut sweep = SweepOutcome {
            patterns_run: applicable.len(),
            ..SweepOutcome::default()
        };

        let evaluate = |pattern: &Arc<Pattern>| -> Option<PatternOutcome> {
            if self.deadline.expired() {
                return None;
            }
            Some(self.process(tree, source, pattern))
        };

        let outcomes: Vec<Option<PatternOutcome>> = match pool {
            Some(pool) => pool.install(|| applicable.par_iter().map(evaluate).collect()),
            None => applicable.iter().map(evaluate).collect(),
        };

        let mut cancelled = false;
        for outcome in outcomes {
            let Some(outcome) = outcome else {
                cancelled = true;
                continue;
            };
            if outcome.recovered {
                sweep.recovered_matches += outcome.matches.len();
            }
            if outcome.cache_hit {
                sweep.cache_hits += 1;
            }
            sweep.recovery_attempts += outcome.recovery_attempts;
            sweep.issues.extend(outcome.issues);
            sweep.matches.extend(outcome.matches);
        }

        if cancelled {
            let kind = ParseErrorKind::Cancelled;
            self.telemetry.record_issue(&kind);
            sweep
                .issues
                .push(ParseIssue::new(Stage::Patterns, "engine", kind));
        }

        sort_and_dedup(&mut sweep.matches);
        sweep
    }

    fn eval_primary(
        &self,
        tree: &ParseTree,
        source: &[u8],
        pattern: &Pattern,
        issues: &mut Vec<ParseIssue>,
    ) -> Vec<PatternMatch> {
        let compiled = match self.registry.compiled(pattern) {
            Ok(compiled) => compiled,
            Err(kind) => {
                self.telemetry.record_issue(&kind);
                issues.push(ParseIssue::for_pattern(
                    Stage::Patterns,
                    "registry",
                    pattern.id.clone(),
                    kind,
                ));
                return Vec::new();
            }
        };

        match compiled.as_ref() {
            CompiledPattern::Query(query) => {
                let raw = self.ast.run_query(tree, query, source);
                raw.into_iter()
                    .map(|m| self.match_from_query(source, pattern, m, None))
                    .collect()
            }
            CompiledPattern::Regex(regex) => regex_matches(source, pattern, regex, tree),
            CompiledPattern::Literal(needle) => literal_matches(source, pattern, needle),
        }
    }

    /// Engine heuristic: a unit that syntactically should have matched.
    fn should_recover(&self, source: &[u8], pattern: &Pattern) -> bool {
        pattern.recovery.enabled
            && !source.is_empty()
            && matches!(
                pattern.category,
                PatternCategory::Syntax | PatternCategory::Structure
            )
    }

    fn run_recovery(
        &self,
        tree: &ParseTree,
        source: &[u8],
        pattern: &Pattern,
        outcome: &mut PatternOutcome,
    ) {
        debug!(pattern = %pattern.id, "primary run empty, entering recovery");

        for strategy in [
            RecoveryStrategy::FallbackPatterns,
            RecoveryStrategy::RegexFallback,
            RecoveryStrategy::PartialMatch,
        ] {
            if self.deadline.expired() {
                break;
            }

            outcome.recovery_attempts += 1;
            let started = Instant::now();
            let budget = Deadline::after(started, self.strategy_budget);

            let (matches, timed_out) = match strategy {
                RecoveryStrategy::FallbackPatterns => {
                    self.recover_fallbacks(tree, source, pattern, budget)
                }
                RecoveryStrategy::RegexFallback => self.recover_regex(source, pattern, budget),
                RecoveryStrategy::PartialMatch => {
                    self.recover_partial(tree, source, pattern, budget)
                }
            };

            self.telemetry.record(MetricRecord {
                component: "engine",
                language: Some(pattern.language_id.clone()),
                pattern_id: Some(pattern.id.clone()),
                operation: Operation::Recovery(strategy),
                duration_us: started.elapsed().as_micros() as u64,
                success: !matches.is_empty(),
            });

            if timed_out {
                let kind = ParseErrorKind::RecoveryTimeout {
                    pattern_id: pattern.id.clone(),
                    strategy: strategy.label().to_string(),
                };
                self.telemetry.record_issue(&kind);
                outcome.issues.push(ParseIssue::for_pattern(
                    Stage::Recovery,
                    "engine",
                    pattern.id.clone(),
                    kind,
                ));
                continue;
            }

            if !matches.is_empty() {
                outcome.matches = matches;
                outcome.recovered = true;
                return;
            }
        }

        let kind = ParseErrorKind::RecoveryFailed {
            pattern_id: pattern.id.clone(),
        };
        self.telemetry.record_issue(&kind);
        outcome.issues.push(ParseIssue::for_pattern(
            Stage::Recovery,
            "engine",
            pattern.id.clone(),
            kind,
        ));
    }

    /// Strategy 1: try each fallback id through the same engine,
    /// primary evaluation only (no nested recovery).
    fn recover_fallbacks(
        &self,
        tree: &ParseTree,
        source: &[u8],
        pattern: &Pattern,
        budget: Deadline,
    ) -> (Vec<PatternMatch>, bool) {
        for fallback_id in &pattern.fallback_ids {
            if budget.expired() {
                return (Vec::new(), true);
            }
            let Some(fallback) = self.registry.get(&pattern.language_id, fallback_id) else {
                trace!(pattern = %pattern.id, fallback = %fallback_id, "unknown fallback id");
                continue;
            };
            let mut issues = Vec::new();
            let mut matches = self.eval_primary(tree, source, &fallback, &mut issues);
            if !matches.is_empty() {
                for m in &mut matches {
                    m.metadata.recovered = Some("fallback".to_string());
                }
                return (matches, false);
            }
        }
        (Vec::new(), false)
    }

    /// Strategy 2: the recovery regex, line by line, confidence 0.4.
    fn recover_regex(
        &self,
        source: &[u8],
        pattern: &Pattern,
        budget: Deadline,
    ) -> (Vec<PatternMatch>, bool) {
        let Some(regex_src) = &pattern.recovery_regex else {
            return (Vec::new(), false);
        };
        let Ok(regex) = regex::Regex::new(regex_src) else {
            return (Vec::new(), false);
        };

        let index = NewlineIndex::build(source);
        let mut out = Vec::new();
        let mut offset = 0;

        for raw_line in source.split(|&b| b == b'\n') {
            if budget.expired() {
                return (out, true);
            }
            let line_start = offset;
            offset += raw_line.len() + 1;

            let Ok(line) = std::str::from_utf8(raw_line) else {
                continue;
            };

            if let Some(caps) = regex.captures(line) {
                let whole = caps.get(0).expect("group 0");
                let primary = span_from(
                    &index,
                    line_start + whole.start(),
                    line_start + whole.end(),
                );

                let mut captures: IndexMap<String, Vec<Span>> = IndexMap::new();
                let mut name = None;
                for group_name in regex.capture_names().flatten() {
                    if let Some(m) = caps.name(group_name) {
                        let span =
                            span_from(&index, line_start + m.start(), line_start + m.end());
                        captures
                            .entry(group_name.to_string())
                            .or_default()
                            .push(span);
                        if Some(group_name) == pattern.extract.name_capture {
                            name = Some(m.as_str().to_string());
                        }
                    }
                }

                out.push(PatternMatch {
                    pattern_id: pattern.id.clone(),
                    captures,
                    primary_span: primary,
                    name,
                    metadata: MatchMetadata {
                        node_kind: "regex-recovery".to_string(),
                        confidence: 0.4,
                        category: pattern.category,
                        item_kind: pattern.extract.item_kind.to_string(),
                        recovered: Some("regex".to_string()),
                    },
                });
            }
        }
        (out, false)
    }

    /// Strategy 3: re-run the query per top-level child, union results.
    fn recover_partial(
        &self,
        tree: &ParseTree,
        source: &[u8],
        pattern: &Pattern,
        budget: Deadline,
    ) -> (Vec<PatternMatch>, bool) {
        if pattern.kind != PatternKind::AstQuery {
            return (Vec::new(), false);
        }
        let Ok(compiled) = self.registry.compiled(pattern) else {
            return (Vec::new(), false);
        };
        let CompiledPattern::Query(query) = compiled.as_ref() else {
            return (Vec::new(), false);
        };

        let mut out = Vec::new();
        for child in 0..self.ast.top_level_count(tree) {
            if budget.expired() {
                return (out, true);
            }
            for raw in self.ast.run_query_on_child(tree, query, child, source) {
                out.push(self.match_from_query(source, pattern, raw, Some("partial")));
            }
        }

        for m in &mut out {
            m.metadata.confidence = 0.5;
        }
        (out, false)
    }

    fn match_from_query(
        &self,
        source: &[u8],
        pattern: &Pattern,
        raw: RawQueryMatch,
        recovered: Option<&str>,
    ) -> PatternMatch {
        let mut captures: IndexMap<String, Vec<Span>> = IndexMap::new();
        let mut name = None;

        for (capture_name, span) in raw.captures {
            if Some(capture_name.as_str()) == pattern.extract.name_capture
                && name.is_none()
                && let Some(slice) = span.slice(source)
            {
                name = Some(String::from_utf8_lossy(slice).into_owned());
            }
            captures.entry(capture_name).or_default().push(span);
        }

        // Matches inside error subtrees are retained at low confidence.
        let confidence = if raw.has_error { 0.5 } else { 1.0 };

        PatternMatch {
            pattern_id: pattern.id.clone(),
            captures,
            primary_span: raw.primary,
            name,
            metadata: MatchMetadata {
                node_kind: raw.node_kind,
                confidence,
                category: pattern.category,
                item_kind: pattern.extract.item_kind.to_string(),
                recovered: recovered.map(str::to_string),
            },
        }
    }
}

/// Canonical ordering plus de-duplication: sort by (start byte, longest
/// first, pattern id), collapse identical (pattern id, primary span)
/// pairs merging their capture sets.
pub fn sort_and_dedup(matches: &mut Vec<PatternMatch>) {
    matches.sort_by(|a, b| {
        a.primary_span
            .start_byte
            .cmp(&b.primary_span.start_byte)
            .then_with(|| {
                Reverse(a.primary_span.len()).cmp(&Reverse(b.primary_span.len()))
            })
            .then_with(|| a.pattern_id.cmp(&b.pattern_id))
    });

    let mut deduped: Vec<PatternMatch> = Vec::with_capacity(matches.len());
    for m in matches.drain(..) {
        if let Some(last) = deduped.last_mut()
            && last.pattern_id == m.pattern_id
            && last.primary_span.start_byte == m.primary_span.start_byte
            && last.primary_span.end_byte == m.primary_span.end_byte
        {
            // Merge capture sets; keep the stronger confidence.
            for (capture_name, spans) in m.captures {
                let entry = last.captures.entry(capture_name).or_default();
                for span in spans {
                    if !entry.contains(&span) {
                        entry.push(span);
                    }
                }
            }
            if m.metadata.confidence > last.metadata.confidence {
                last.metadata.confidence = m.metadata.confidence;
            }
            if last.name.is_none() {
                last.name = m.name;
            }
            continue;
        }
        deduped.push(m);
    }
    *matches = deduped;
}

fn span_from(index: &NewlineIndex, start: usize, end: usize) -> Span {
    Span {
        start_byte: start,
        end_byte: end,
        start_point: index.point_at(start),
        end_point: index.point_at(end),
    }
}

fn regex_matches(
    source: &[u8],
    pattern: &Pattern,
    regex: &regex::Regex,
    tree: &ParseTree,
) -> Vec<PatternMatch> {
    // Regex patterns need valid UTF-8 to keep byte offsets exact.
    let Ok(text) = std::str::from_utf8(source) else {
        return Vec::new();
    };
    let index = NewlineIndex::build(source);
    let mut out = Vec::new();

    for caps in regex.captures_iter(text) {
        let whole = caps.get(0).expect("group 0");
        let primary = span_from(&index, whole.start(), whole.end());

        let mut captures: IndexMap<String, Vec<Span>> = IndexMap::new();
        let mut name = None;
        for group_name in regex.capture_names().flatten() {
            if let Some(m) = caps.name(group_name) {
                captures
                    .entry(group_name.to_string())
                    .or_default()
                    .push(span_from(&index, m.start(), m.end()));
                if Some(group_name) == pattern.extract.name_capture {
                    name = Some(m.as_str().to_string());
                }
            }
        }

        // Borrow the node kind from the covering tree node when known.
        let node_kind = tree
            .deepest_covering(&primary)
            .map(|id| tree.node(id).kind.clone())
            .unwrap_or_else(|| "text".to_string());

        out.push(PatternMatch {
            pattern_id: pattern.id.clone(),
            captures,
            primary_span: primary,
            name,
            metadata: MatchMetadata {
                node_kind,
                confidence: 1.0,
                category: pattern.category,
                item_kind: pattern.extract.item_kind.to_string(),
                recovered: None,
            },
        });
    }
    out
}

fn literal_matches(source: &[u8], pattern: &Pattern, needle: &str) -> Vec<PatternMatch> {
    if needle.is_empty() {
        return Vec::new();
    }
    let index = NewlineIndex::build(source);
    memchr::memmem::find_iter(source, needle.as_bytes())
        .map(|at| PatternMatch {
            pattern_id: pattern.id.clone(),
            captures: IndexMap::new(),
            primary_span: span_from(&index, at, at + needle.len()),
            name: None,
            metadata: MatchMetadata {
                node_kind: "text".to_string(),
                confidence: 1.0,
                category: pattern.category,
                item_kind: pattern.extract.item_kind.to_string(),
                recovered: None,
            },
        })
        .collect()
}
