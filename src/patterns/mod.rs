//! Filepath: src/patterns/mod.rs
//! Pattern model and registry: lazy per-language loading, compilation
//! with singleflight, validation, and demotion.
//!
//! Notes
//! - An AST-query pattern compiles against its language grammar on first
//!   use; the compiled form is cached until coordinator invalidation.
//! - Compilation failure demotes the pattern to its recovery regex when
//!   one exists; otherwise the pattern is excluded until the next clear.
//! - Language identifiers are normalized through the classifier's alias
//!   table before lookup.

pub mod defs;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use moka::sync::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::ast::{self, AstBackend};
use crate::classify::normalize_language;
use crate::error::ParseErrorKind;
use crate::tree::Span;

/// What a pattern expresses. Closed set; one category per pattern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory
{
    Syntax,
    Structure,
    Documentation,
    Semantics,
    CodePattern,
    Naming,
    ErrorHandling,
    Architecture,
}

/// How a pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind
{
    AstQuery,
    Regex,
    Literal,
}

/// Declarative extraction rule: which capture names the item, and what
/// kind of item a match produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractRule
{
    /// Item label in the feature set ("function", "heading", ...)
    pub item_kind: &'static str,

    /// Capture whose text becomes the item name
    pub name_capture: Option<&'static str>,
}

/// Embedded sample evaluated during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternTestCase
{
    pub source: &'static str,
    pub should_match: bool,
}

/// Per-pattern recovery knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig
{
    pub enabled: bool,

    /// Per-strategy budget in milliseconds
    pub strategy_budget_ms: u64,
}

impl Default for RecoveryConfig
{
    fn default() -> Self
    {
        Self { enabled: true, strategy_budget_ms: 50 }
    }
}

/// One pattern definition.
#[derive(Debug, Clone)]
pub struct Pattern
{
    pub id: String,

    pub language_id: String,

    pub category: PatternCategory,

    pub kind: PatternKind,

    /// Query text, regex text, or literal needle depending on `kind`
    pub source: String,

    pub extract: ExtractRule,

    pub test_cases: Vec<PatternTestCase>,

    /// Pattern ids tried, in order, when this one matches nothing
    pub fallback_ids: Vec<String>,

    /// Line-oriented regex applied by the second recovery strategy
    pub recovery_regex: Option<String>,

    pub recovery: RecoveryConfig,
}

impl Pattern
{
    /// Structural invariants every definition must satisfy.
    pub fn check(&self) -> Result<(), String>
    {
        if self.id.is_empty() || self.language_id.is_empty()
        {
            return Err("pattern id and language must be non-empty".to_string());
        }

        if self
            .source
            .trim()
            .is_empty()
        {
            return Err(format!("pattern `{}` has an empty source", self.id));
        }

        // Non-query patterns must themselves be matchable text patterns
        // or carry a recovery regex as a structural fallback.
        if self.kind != PatternKind::AstQuery
            && self.source.is_empty()
            && self
                .recovery_regex
                .is_none()
        {
            return Err(format!(
                "pattern `{}` needs a regex or structural fallback",
                self.id
            ));
        }

        Ok(())
    }
}

/// Metadata carried by every match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata
{
    /// Kind of the matched node, or a recovery marker
    pub node_kind: String,

    pub confidence: f32,

    pub category: PatternCategory,

    pub item_kind: String,

    /// Set when a recovery strategy synthesized this match
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recovered: Option<String>,
}

/// One pattern match over a source unit. Spans reference the source
/// bytes; captures keep tree traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch
{
    pub pattern_id: String,

    pub captures: IndexMap<String, Vec<Span>>,

    pub primary_span: Span,

    /// Text of the naming capture, when the extract rule defines one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,

    pub metadata: MatchMetadata,
}

impl PatternMatch
{
    /// Rough resident size for cache accounting.
    #[must_use]
    pub fn approximate_size_bytes(&self) -> usize
    {
        std::mem::size_of::<Self>()
            + self
                .pattern_id
                .len()
            + self
                .name
                .as_ref()
                .map_or(0, String::len)
            + self
                .captures
                .iter()
                .map(|(k, v)| k.len() + v.len() * std::mem::size_of::<Span>())
                .sum::<usize>()
    }
}

/// Validation outcome for a single pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternValidation
{
    pub ok: bool,

    pub errors: Vec<String>,

    pub warnings: Vec<String>,
}

/// Compiled form of a pattern, shared across calls.
#[derive(Debug)]
pub enum CompiledPattern
{
    Query(tree_sitter::Query),
    Regex(Regex),
    Literal(String),
}

/// Patterns of one language, grouped by category, id-addressable.
pub struct LanguagePatterns
{
    by_category: BTreeMap<PatternCategory, Vec<Arc<Pattern>>>,
    by_id: HashMap<String, Arc<Pattern>>,
}

impl LanguagePatterns
{
    fn from_defs(patterns: Vec<Pattern>) -> Self
    {
        let mut by_category: BTreeMap<PatternCategory, Vec<Arc<Pattern>>> = BTreeMap::new();
        let mut by_id = HashMap::new();

        for pattern in patterns
        {
            if let Err(reason) = pattern.check()
            {
                warn!(pattern = %pattern.id, %reason, "skipping invalid pattern definition");
                continue;
            }

            let pattern = Arc::new(pattern);
            by_category
                .entry(pattern.category)
                .or_default()
                .push(Arc::clone(&pattern));
            by_id.insert(
                pattern
                    .id
                    .clone(),
                pattern,
            );
        }

        Self { by_category, by_id }
    }

    #[must_use]
    pub fn by_category(&self) -> &BTreeMap<PatternCategory, Vec<Arc<Pattern>>>
    {
        &self.by_category
    }

    #[must_use]
    pub fn get(
        &self,
        pattern_id: &str,
    ) -> Option<&Arc<Pattern>>
    {
        self.by_id
            .get(pattern_id)
    }

    /// All patterns in deterministic (category, registration) order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Pattern>>
    {
        self.by_category
            .values()
            .flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.by_id
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.by_id
            .is_empty()
    }
}

type PatternKey = (String, String);

/// Lazy language→patterns registry with a singleflight compile cache.
pub struct PatternRegistry
{
    languages: RwLock<HashMap<String, Arc<LanguagePatterns>>>,

    /// Compiled queries/regexes keyed by (language, pattern id). moka's
    /// `try_get_with` guarantees at most one concurrent compilation per
    /// key; racers wait for and share the winner's result.
    compiled: Cache<PatternKey, Arc<CompiledPattern>>,

    /// Patterns demoted to their recovery regex after a failed compile
    demoted: RwLock<HashSet<PatternKey>>,

    /// Patterns excluded from runs until the next clear
    unusable: RwLock<HashSet<PatternKey>>,
}

impl Default for PatternRegistry
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl PatternRegistry
{
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            languages: RwLock::new(HashMap::new()),
            compiled: Cache::builder()
                .max_capacity(4_096)
                .support_invalidation_closures()
                .build(),
            demoted: RwLock::new(HashSet::new()),
            unusable: RwLock::new(HashSet::new()),
        }
    }

    /// Patterns for a language, loading and grouping them on first use.
    pub fn patterns_for(
        &self,
        language_id: &str,
    ) -> Arc<LanguagePatterns>
    {
        let language_id = normalize_language(language_id);

        if let Some(found) = self
            .languages
            .read()
            .expect("registry lock")
            .get(&language_id)
        {
            return Arc::clone(found);
        }

        let loaded = Arc::new(LanguagePatterns::from_defs(defs::builtin(&language_id)));

        let mut languages = self
            .languages
            .write()
            .expect("registry lock");

        // Another thread may have loaded while we built; first one wins.
        Arc::clone(
            languages
                .entry(language_id)
                .or_insert(loaded),
        )
    }

    pub fn get(
        &self,
        language_id: &str,
        pattern_id: &str,
    ) -> Option<Arc<Pattern>>
    {
        self.patterns_for(language_id)
            .get(pattern_id)
            .cloned()
    }

    /// Whether a pattern is currently excluded from runs.
    #[must_use]
    pub fn is_unusable(
        &self,
        language_id: &str,
        pattern_id: &str,
    ) -> bool
    {
        self.unusable
            .read()
            .expect("registry lock")
            .contains(&(language_id.to_string(), pattern_id.to_string()))
    }

    /// Compiled form of a pattern, compiling (once, process-wide) on
    /// first use. Demoted patterns compile their recovery regex instead.
    pub fn compiled(
        &self,
        pattern: &Pattern,
    ) -> Result<Arc<CompiledPattern>, ParseErrorKind>
    {
        let key = (
            pattern
                .language_id
                .clone(),
            pattern
                .id
                .clone(),
        );

        if self
            .unusable
            .read()
            .expect("registry lock")
            .contains(&key)
        {
            return Err(ParseErrorKind::PatternCompilationFailed {
                pattern_id: pattern
                    .id
                    .clone(),
                reason: "previously failed to compile".to_string(),
            });
        }

        self.compiled
            .try_get_with(key.clone(), || self.compile_fresh(pattern, &key))
            .map_err(|shared: Arc<ParseErrorKind>| (*shared).clone())
    }

    fn compile_fresh(
        &self,
        pattern: &Pattern,
        key: &PatternKey,
    ) -> Result<Arc<CompiledPattern>, ParseErrorKind>
    {
        let demoted = self
            .demoted
            .read()
            .expect("registry lock")
            .contains(key);

        let effective_kind = if demoted { PatternKind::Regex } else { pattern.kind };

        match effective_kind
        {
            PatternKind::AstQuery => match self.compile_query(pattern)
            {
                Ok(query) => Ok(Arc::new(CompiledPattern::Query(query))),
                Err(reason) =>
                {
                    if let Some(regex_src) = &pattern.recovery_regex
                    {
                        // Demote: from now on this pattern runs as a regex.
                        debug!(
                            pattern = %pattern.id,
                            %reason,
                            "query compilation failed; demoting to recovery regex"
                        );
                        self.demoted
                            .write()
                            .expect("registry lock")
                            .insert(key.clone());
                        let regex = Regex::new(regex_src).map_err(|e| {
                            ParseErrorKind::PatternCompilationFailed {
                                pattern_id: pattern
                                    .id
                                    .clone(),
                                reason: e.to_string(),
                            }
                        })?;
                        Ok(Arc::new(CompiledPattern::Regex(regex)))
                    }
                    else
                    {
                        self.unusable
                            .write()
                            .expect("registry lock")
                            .insert(key.clone());
                        Err(ParseErrorKind::PatternCompilationFailed {
                            pattern_id: pattern
                                .id
                                .clone(),
                            reason,
                        })
                    }
                }
            },
            PatternKind::Regex =>
            {
                let source = if demoted
                {
                    pattern
                        .recovery_regex
                        .as_deref()
                        .unwrap_or(&pattern.source)
                }
                else
                {
                    &pattern.source
                };
                let regex =
                    Regex::new(source).map_err(|e| ParseErrorKind::PatternCompilationFailed {
                        pattern_id: pattern
                            .id
                            .clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Arc::new(CompiledPattern::Regex(regex)))
            }
            PatternKind::Literal => Ok(Arc::new(CompiledPattern::Literal(
                pattern
                    .source
                    .clone(),
            ))),
        }
    }

    fn compile_query(
        &self,
        pattern: &Pattern,
    ) -> Result<tree_sitter::Query, String>
    {
        let language = ast::grammar_for(&pattern.language_id).ok_or_else(|| {
            format!("no grammar loaded for `{}`", pattern.language_id)
        })?;

        tree_sitter::Query::new(&language, &pattern.source).map_err(|e| e.to_string())
    }

    /// Validate a definition: invariant check, syntactic compile, and
    /// embedded test-case evaluation against the AST backend.
    pub fn validate(
        &self,
        pattern: &Pattern,
        ast: &AstBackend,
    ) -> PatternValidation
    {
        let mut out = PatternValidation { ok: true, ..PatternValidation::default() };

        if let Err(reason) = pattern.check()
        {
            out.ok = false;
            out.errors
                .push(reason);
            return out;
        }

        let compiled = match self.compiled(pattern)
        {
            Ok(compiled) => compiled,
            Err(e) =>
            {
                out.ok = false;
                out.errors
                    .push(e.to_string());
                return out;
            }
        };

        if pattern
            .test_cases
            .is_empty()
        {
            out.warnings
                .push(format!("pattern `{}` has no embedded test cases", pattern.id));
            return out;
        }

        for case in &pattern.test_cases
        {
            let matched = match compiled.as_ref()
            {
                CompiledPattern::Query(query) => match ast.parse(
                    &pattern.language_id,
                    case.source
                        .as_bytes(),
                )
                {
                    Ok(tree) => !ast
                        .run_query(
                            &tree,
                            query,
                            case.source
                                .as_bytes(),
                        )
                        .is_empty(),
                    Err(_) => false,
                },
                CompiledPattern::Regex(regex) => regex.is_match(case.source),
                CompiledPattern::Literal(needle) => case
                    .source
                    .contains(needle.as_str()),
            };

            if matched != case.should_match
            {
                out.ok = false;
                out.errors
                    .push(format!(
                        "pattern `{}` test case {} (expected {})",
                        pattern.id,
                        if matched { "matched" } else { "did not match" },
                        if case.should_match { "a match" } else { "no match" },
                    ));
            }
        }

        out
    }

    /// Drop every loaded language, compiled form, and exclusion.
    pub fn clear(&self)
    {
        self.languages
            .write()
            .expect("registry lock")
            .clear();
        self.compiled
            .invalidate_all();
        self.demoted
            .write()
            .expect("registry lock")
            .clear();
        self.unusable
            .write()
            .expect("registry lock")
            .clear();
    }

    /// Drop one language's loaded patterns and compiled forms.
    pub fn clear_language(
        &self,
        language_id: &str,
    )
    {
        let language_id = normalize_language(language_id);

        self.languages
            .write()
            .expect("registry lock")
            .remove(&language_id);

        // moka has no prefix invalidation; filter by key instead.
        let lang = language_id.clone();
        let _ = self
            .compiled
            .invalidate_entries_if(move |key, _| key.0 == lang);

        self.demoted
            .write()
            .expect("registry lock")
            .retain(|key| key.0 != language_id);
        self.unusable
            .write()
            .expect("registry lock")
            .retain(|key| key.0 != language_id);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn regex_pattern(id: &str, source: &str) -> Pattern
    {
        Pattern {
            id: id.to_string(),
            language_id: "plaintext".to_string(),
            category: PatternCategory::Documentation,
            kind: PatternKind::Regex,
            source: source.to_string(),
            extract: ExtractRule { item_kind: "item", name_capture: None },
            test_cases: Vec::new(),
            fallback_ids: Vec::new(),
            recovery_regex: None,
            recovery: RecoveryConfig::default(),
        }
    }

    #[test]
    fn builtin_python_patterns_load_lazily()
    {
        let registry = PatternRegistry::new();
        let patterns = registry.patterns_for("python");
        assert!(!patterns.is_empty());
        assert!(
            patterns
                .get("python.function")
                .is_some()
        );

        // Aliases resolve to the same table.
        let via_alias = registry.patterns_for("py");
        assert_eq!(via_alias.len(), patterns.len());
    }

    #[test]
    fn compiled_regex_round_trips()
    {
        let registry = PatternRegistry::new();
        let pattern = regex_pattern("p.todo", r"TODO:\s*(.+)");
        let compiled = registry
            .compiled(&pattern)
            .unwrap();
        match compiled.as_ref()
        {
            CompiledPattern::Regex(re) => assert!(re.is_match("TODO: fix")),
            _ => panic!("expected regex"),
        }
    }

    #[test]
    fn invalid_regex_reports_compilation_failure()
    {
        let registry = PatternRegistry::new();
        let pattern = regex_pattern("p.bad", r"([unclosed");
        let err = registry
            .compiled(&pattern)
            .unwrap_err();
        assert!(matches!(err, ParseErrorKind::PatternCompilationFailed { .. }));
    }

    #[test]
    fn bad_query_without_recovery_is_unusable_until_clear()
    {
        let registry = PatternRegistry::new();
        let mut pattern = regex_pattern("p.query", "(nonexistent_node_kind_xyz) @x");
        pattern.language_id = "python".to_string();
        pattern.kind = PatternKind::AstQuery;

        assert!(
            registry
                .compiled(&pattern)
                .is_err()
        );
        assert!(registry.is_unusable("python", "p.query"));

        registry.clear();
        assert!(!registry.is_unusable("python", "p.query"));
    }

    #[test]
    fn bad_query_with_recovery_regex_demotes()
    {
        let registry = PatternRegistry::new();
        let mut pattern = regex_pattern("p.demoted", "(nonexistent_node_kind_xyz) @x");
        pattern.language_id = "python".to_string();
        pattern.kind = PatternKind::AstQuery;
        pattern.recovery_regex = Some(r"^\s*def\s+(\w+)".to_string());

        let compiled = registry
            .compiled(&pattern)
            .unwrap();
        assert!(matches!(compiled.as_ref(), CompiledPattern::Regex(_)));
        assert!(!registry.is_unusable("python", "p.demoted"));
    }

    #[test]
    fn validation_flags_empty_source()
    {
        let registry = PatternRegistry::new();
        let ast = AstBackend::new();
        let pattern = regex_pattern("p.empty", "   ");
        let report = registry.validate(&pattern, &ast);
        assert!(!report.ok);
        assert!(!report
            .errors
            .is_empty());
    }

    #[test]
    fn clear_language_only_touches_that_language()
    {
        let registry = PatternRegistry::new();
        let _ = registry.patterns_for("python");
        let _ = registry.patterns_for("rust");

        registry.clear_language("python");

        let languages = registry
            .languages
            .read()
            .unwrap();
        assert!(!languages.contains_key("python"));
        assert!(languages.contains_key("rust"));
    }
}
