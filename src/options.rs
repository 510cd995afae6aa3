use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::request::RequestCache;
use crate::patterns::PatternCategory;

/// Per-call options for the unified parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions
{
    /// Build a categorized feature set from the matches
    pub extract_features: bool,

    /// Materialize source blocks for syntax/structure matches
    pub extract_blocks: bool,

    /// Return the normalized tree on the result
    pub include_ast: bool,

    /// Restrict pattern evaluation to these categories (None = all)
    pub categories: Option<BTreeSet<PatternCategory>>,

    /// Overall per-call budget in milliseconds
    pub pattern_timeout_ms: u64,

    /// Create a request-scoped cache for this call
    pub request_cache_enabled: bool,

    /// Host-supplied request cache spanning several calls; when set the
    /// facade uses it instead of creating its own
    #[serde(skip)]
    pub shared_request_cache: Option<Arc<RequestCache>>,
}

impl Default for ParseOptions
{
    fn default() -> Self
    {
        Self {
            extract_features: true,
            extract_blocks: true,
            include_ast: false,
            categories: None,
            pattern_timeout_ms: 5_000,
            request_cache_enabled: true,
            shared_request_cache: None,
        }
    }
}

impl ParseOptions
{
    /// Deadline token for this call, anchored at `now`.
    #[must_use]
    pub fn deadline_from(
        &self,
        now: Instant,
    ) -> Deadline
    {
        Deadline::after(now, Duration::from_millis(self.pattern_timeout_ms))
    }

    /// Whether a category participates in this call.
    #[must_use]
    pub fn wants_category(
        &self,
        category: PatternCategory,
    ) -> bool
    {
        match &self.categories
        {
            Some(set) => set.contains(&category),
            None => true,
        }
    }
}

/// Engine-wide configuration: cache budgets, TTL policy, worker pool size.
/// The core never reads files or the environment; hosts deserialize this
/// from wherever they keep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    /// Byte budget for the persistent AST cache
    pub ast_cache_bytes: usize,

    /// Byte budget for the persistent pattern-result cache
    pub pattern_cache_bytes: usize,

    /// Byte budget for the classification cache
    pub classification_cache_bytes: usize,

    /// Base TTL applied to persistent cache entries
    pub default_ttl_secs: u64,

    /// Scale entry TTLs by observed access frequency
    pub adaptive_ttl: bool,

    /// Worker threads for pattern fan-out (None = min(4, cores))
    pub worker_threads: Option<usize>,

    /// Per-recovery-strategy budget in milliseconds
    pub strategy_budget_ms: u64,

    /// Classification sniff cap in bytes
    pub sniff_limit_bytes: usize,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            ast_cache_bytes: 64 * 1024 * 1024,
            pattern_cache_bytes: 32 * 1024 * 1024,
            classification_cache_bytes: 8 * 1024 * 1024,
            default_ttl_secs: 3_600,
            adaptive_ttl: true,
            worker_threads: None,
            strategy_budget_ms: 50,
            sniff_limit_bytes: 64 * 1024,
        }
    }
}

impl EngineConfig
{
    /// Parse a TOML document into a config record.
    pub fn from_toml_str(text: &str) -> Result<Self>
    {
        toml::from_str(text).context("Failed to parse engine configuration")
    }

    /// Effective worker count for the pattern fan-out pool.
    #[must_use]
    pub fn effective_workers(&self) -> usize
    {
        self.worker_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(usize::from)
                    .unwrap_or(1)
                    .min(4)
            })
            .max(1)
    }
}

/// Cooperative cancellation token observed at every stage boundary and
/// pattern invocation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline
{
    at: Option<Instant>,
}

impl Deadline
{
    /// A deadline that never expires.
    #[must_use]
    pub fn unbounded() -> Self
    {
        Self { at: None }
    }

    #[must_use]
    pub fn after(
        now: Instant,
        budget: Duration,
    ) -> Self
    {
        Self { at: now.checked_add(budget) }
    }

    #[must_use]
    pub fn expired(&self) -> bool
    {
        match self.at
        {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Remaining budget, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Duration
    {
        match self.at
        {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_are_sane()
    {
        let opts = ParseOptions::default();
        assert!(opts.extract_features);
        assert_eq!(opts.pattern_timeout_ms, 5_000);

        let cfg = EngineConfig::default();
        assert!(cfg.effective_workers() >= 1);
        assert!(cfg.effective_workers() <= 4);
        assert_eq!(cfg.strategy_budget_ms, 50);
    }

    #[test]
    fn config_round_trips_through_toml()
    {
        let cfg = EngineConfig {
            ast_cache_bytes: 1024,
            worker_threads: Some(2),
            ..EngineConfig::default()
        };
        let text = toml::to_string(&cfg).unwrap();
        let back = EngineConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.ast_cache_bytes, 1024);
        assert_eq!(back.worker_threads, Some(2));
    }

    #[test]
    fn partial_toml_fills_defaults()
    {
        let cfg = EngineConfig::from_toml_str("ast_cache_bytes = 99").unwrap();
        assert_eq!(cfg.ast_cache_bytes, 99);
        assert_eq!(cfg.default_ttl_secs, 3_600);
    }

    #[test]
    fn category_filter_applies()
    {
        let mut set = BTreeSet::new();
        set.insert(PatternCategory::Syntax);
        let opts = ParseOptions { categories: Some(set), ..ParseOptions::default() };
        assert!(opts.wants_category(PatternCategory::Syntax));
        assert!(!opts.wants_category(PatternCategory::Documentation));
    }

    #[test]
    fn deadline_expiry()
    {
        let now = Instant::now();
        let d = Deadline::after(now, Duration::from_millis(0));
        assert!(d.expired());
        assert!(!Deadline::unbounded().expired());
    }
}
