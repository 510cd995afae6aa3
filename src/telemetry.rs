//! Per-pattern metrics, recovery statistics, and the error audit.
//!
//! Every stage reports into a process-wide [`TelemetryHub`]; external
//! health monitors subscribe opaque sinks. The hub also derives a
//! per-pattern complexity score (mean observed run time) that hosts may
//! feed into cache-warming heuristics.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ParseErrorKind;

/// The three recovery strategies, in the order the engine applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    FallbackPatterns,
    RegexFallback,
    PartialMatch,
}

impl RecoveryStrategy {
    pub fn label(self) -> &'static str {
        match self {
            Self::FallbackPatterns => "fallback_patterns",
            Self::RegexFallback => "regex_fallback",
            Self::PartialMatch => "partial_match",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::FallbackPatterns => 0,
            Self::RegexFallback => 1,
            Self::PartialMatch => 2,
        }
    }
}

/// What a metric record measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Classify,
    Parse,
    Compile,
    Query,
    Recovery(RecoveryStrategy),
    Blocks,
    Features,
}

/// One observation shipped to subscribed sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub component: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    pub operation: Operation,
    pub duration_us: u64,
    pub success: bool,
}

/// Consumer of metric records (health monitors, dashboards).
pub trait MetricSink: Send + Sync {
    fn record(&self, record: &MetricRecord);
}

/// Running aggregate for one pattern id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternAggregate {
    pub executions: u64,
    pub matches: u64,
    pub total_us: u64,
    /// Attempt counts per strategy: fallback, regex, partial.
    pub recovery_attempts: [u64; 3],
    pub recovery_successes: [u64; 3],
}

impl PatternAggregate {
    /// Mean run time in microseconds; the opaque "complexity" score.
    pub fn mean_us(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_us as f64 / self.executions as f64
        }
    }
}

/// Serializable snapshot of everything the hub has observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub patterns: BTreeMap<String, PatternAggregate>,
    pub errors: BTreeMap<String, u64>,
}

/// Process-wide telemetry aggregation point.
#[derive(Default)]
pub struct TelemetryHub {
    sinks: RwLock<Vec<Arc<dyn MetricSink>>>,
    patterns: Mutex<HashMap<String, PatternAggregate>>,
    audit: Mutex<BTreeMap<&'static str, u64>>,
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external consumer; every subsequent record fans out.
    pub fn subscribe(&self, sink: Arc<dyn MetricSink>) {
        self.sinks.write().expect("telemetry lock").push(sink);
    }

    pub fn record(&self, record: MetricRecord) {
        trace!(
            component = record.component,
            operation = ?record.operation,
            duration_us = record.duration_us,
            success = record.success,
            "metric"
        );

        if let Some(pattern_id) = &record.pattern_id {
            let mut patterns = self.patterns.lock().expect("telemetry lock");
            let agg = patterns.entry(pattern_id.clone()).or_default();
            match record.operation {
                Operation::Query => {
                    agg.executions += 1;
                    agg.total_us += record.duration_us;
                    if record.success {
                        agg.matches += 1;
                    }
                }
                Operation::Recovery(strategy) => {
                    let i = strategy.index();
                    agg.recovery_attempts[i] += 1;
                    if record.success {
                        agg.recovery_successes[i] += 1;
                    }
                }
                _ => {}
            }
        }

        let sinks = self.sinks.read().expect("telemetry lock");
        for sink in sinks.iter() {
            sink.record(&record);
        }
    }

    /// Count an observed failure in the audit.
    pub fn record_issue(&self, kind: &ParseErrorKind) {
        let mut audit = self.audit.lock().expect("telemetry lock");
        *audit.entry(kind.audit_label()).or_insert(0) += 1;
    }

    /// Opaque complexity score for a pattern: mean observed run time in
    /// microseconds. None until the pattern has executed at least once.
    pub fn pattern_score(&self, pattern_id: &str) -> Option<f64> {
        let patterns = self.patterns.lock().expect("telemetry lock");
        patterns
            .get(pattern_id)
            .filter(|agg| agg.executions > 0)
            .map(PatternAggregate::mean_us)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let patterns = self.patterns.lock().expect("telemetry lock");
        let audit = self.audit.lock().expect("telemetry lock");
        TelemetrySnapshot {
            patterns: patterns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            errors: audit
                .iter()
                .map(|(k, v)| ((*k).to_string(), *v))
                .collect(),
        }
    }
}

/// Per-result telemetry attached to every `ParserResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMetrics {
    pub patterns_run: usize,
    pub matches_found: usize,
    pub recovery_attempts: usize,
    pub recovered_matches: usize,
    pub cache_hits: usize,
    pub elapsed_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    impl MetricSink for CountingSink {
        fn record(&self, _record: &MetricRecord) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn query_record(pattern: &str, us: u64, success: bool) -> MetricRecord {
        MetricRecord {
            component: "engine",
            language: Some("python".into()),
            pattern_id: Some(pattern.into()),
            operation: Operation::Query,
            duration_us: us,
            success,
        }
    }

    #[test]
    fn sinks_receive_every_record() {
        let hub = TelemetryHub::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        hub.subscribe(Arc::clone(&sink) as Arc<dyn MetricSink>);

        hub.record(query_record("p", 10, true));
        hub.record(query_record("p", 30, false));
        assert_eq!(sink.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn pattern_score_is_mean_runtime() {
        let hub = TelemetryHub::new();
        assert!(hub.pattern_score("p").is_none());

        hub.record(query_record("p", 10, true));
        hub.record(query_record("p", 30, true));
        assert_eq!(hub.pattern_score("p"), Some(20.0));
    }

    #[test]
    fn recovery_attempts_aggregate_per_strategy() {
        let hub = TelemetryHub::new();
        hub.record(MetricRecord {
            component: "engine",
            language: None,
            pattern_id: Some("p".into()),
            operation: Operation::Recovery(RecoveryStrategy::RegexFallback),
            duration_us: 5,
            success: true,
        });

        let snap = hub.snapshot();
        let agg = &snap.patterns["p"];
        assert_eq!(agg.recovery_attempts, [0, 1, 0]);
        assert_eq!(agg.recovery_successes, [0, 1, 0]);
    }

    #[test]
    fn audit_counts_by_label() {
        let hub = TelemetryHub::new();
        hub.record_issue(&ParseErrorKind::Cancelled);
        hub.record_issue(&ParseErrorKind::Cancelled);
        let snap = hub.snapshot();
        assert_eq!(snap.errors["cancelled"], 2);
    }
}
