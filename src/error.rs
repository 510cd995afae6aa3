//! Filepath: src/error.rs
//! Error taxonomy for the parsing core.
//!
//! Errors are data: subcomponents signal failures by returning a result
//! kind, never by escaping the call stack. The facade collects observed
//! failures as [`ParseIssue`] records on the returned `ParserResult`,
//! preserving the stage and component where each one arose.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failure kinds surfaced by the core.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// Source bytes could not be sampled for classification.
    #[error("classification failed: source bytes unreadable")]
    Unreadable,

    /// No grammar or custom parser is available for the language.
    #[error("no parser backend available for `{language}`")]
    BackendUnavailable { language: String },

    /// A grammar was found but its ABI does not match the runtime.
    #[error("grammar version mismatch for `{language}`")]
    GrammarVersionMismatch { language: String },

    /// An AST query failed to compile against the language grammar.
    #[error("pattern `{pattern_id}` failed to compile: {reason}")]
    PatternCompilationFailed { pattern_id: String, reason: String },

    /// A pattern definition is internally inconsistent.
    #[error("pattern `{pattern_id}` has an invalid definition: {reason}")]
    PatternInvalidDefinition { pattern_id: String, reason: String },

    /// Every recovery strategy produced zero matches.
    #[error("all recovery strategies failed for `{pattern_id}`")]
    RecoveryFailed { pattern_id: String },

    /// A recovery strategy exceeded its time budget.
    #[error("recovery strategy `{strategy}` timed out for `{pattern_id}`")]
    RecoveryTimeout { pattern_id: String, strategy: String },

    /// An entry alone exceeds its cache's byte budget; treated as a miss.
    #[error("cache entry `{key}` exceeds the cache budget")]
    CacheOversize { key: String },

    /// A cache payload could not be interpreted; treated as a miss.
    #[error("cache entry `{key}` is corrupt")]
    CacheCorruptEntry { key: String },

    /// The per-call deadline elapsed; always terminal.
    #[error("operation cancelled: deadline elapsed")]
    Cancelled,
}

impl ParseErrorKind {
    /// Stable label used by the telemetry error audit.
    pub fn audit_label(&self) -> &'static str {
        match self {
            Self::Unreadable => "classification.unreadable",
            Self::BackendUnavailable { .. } => "backend.unavailable",
            Self::GrammarVersionMismatch { .. } => "backend.grammar_mismatch",
            Self::PatternCompilationFailed { .. } => "pattern.compilation_failed",
            Self::PatternInvalidDefinition { .. } => "pattern.invalid_definition",
            Self::RecoveryFailed { .. } => "recovery.all_failed",
            Self::RecoveryTimeout { .. } => "recovery.timeout",
            Self::CacheOversize { .. } => "cache.oversize",
            Self::CacheCorruptEntry { .. } => "cache.corrupt",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the facade must stop assembling the result.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Pipeline stage at which an issue was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Parse,
    Patterns,
    Recovery,
    Blocks,
    Features,
    Cache,
}

/// One observed failure, attached to a `ParserResult` by the facade.
///
/// The `(stage, component, pattern_id)` triple preserves the causal chain
/// so hosts can audit where best-effort assembly degraded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseIssue {
    pub stage: Stage,
    pub component: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(flatten)]
    pub kind: ParseErrorKind,
}

impl ParseIssue {
    pub fn new(stage: Stage, component: &'static str, kind: ParseErrorKind) -> Self {
        Self {
            stage,
            component,
            pattern_id: None,
            kind,
        }
    }

    pub fn for_pattern(
        stage: Stage,
        component: &'static str,
        pattern_id: impl Into<String>,
        kind: ParseErrorKind,
    ) -> Self {
        Self {
            stage,
            component,
            pattern_id: Some(pattern_id.into()),
            kind,
        }
    }
}

impl std::fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pattern_id {
            Some(id) => write!(f, "[{:?}/{}] {} ({})", self.stage, self.component, self.kind, id),
            None => write!(f, "[{:?}/{}] {}", self.stage, self.component, self.kind),
        }
    }
}
