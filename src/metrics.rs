//! Timing metrics for one pipeline run.
//! Each named metric keeps its most recent samples; the p50/p95/p99 summary
//! is logged when the run ends.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_WINDOW: usize = 1024;

/// Measures from creation until `finish`.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Record the elapsed microseconds and return them.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Latency samples per metric, oldest dropped once `window` is reached.
pub struct MetricsRegistry {
    samples: Mutex<HashMap<&'static str, VecDeque<f64>>>,
    window: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            window: window.max(1),
        }
    }

    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut samples = self.samples.lock();
        let window = samples.entry(name).or_default();
        if window.len() == self.window {
            window.pop_front();
        }
        window.push_back(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn summary(&self) -> HashMap<&'static str, MetricSummary> {
        self.samples
            .lock()
            .iter()
            .map(|(&name, window)| (name, MetricSummary::from_samples(window)))
            .collect()
    }

    /// One `info` line per metric, in name order.
    pub fn log_summary(&self) {
        let mut entries: Vec<_> = self.summary().into_iter().collect();
        entries.sort_by_key(|(name, _)| *name);
        for (name, s) in entries {
            tracing::info!(
                metric = name,
                count = s.count,
                p50_ms = s.p50_us / 1000.0,
                p95_ms = s.p95_us / 1000.0,
                p99_ms = s.p99_us / 1000.0,
                "latency summary"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

impl MetricSummary {
    fn from_samples(samples: &VecDeque<f64>) -> Self {
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        Self {
            p50_us: nearest_rank(&sorted, 50.0),
            p95_us: nearest_rank(&sorted, 95.0),
            p99_us: nearest_rank(&sorted, 99.0),
            count: sorted.len(),
        }
    }
}

fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let idx = ((p / 100.0) * last as f64).round() as usize;
    sorted[idx.min(last)]
}

pub mod metric_names {
    pub const TRANSLATE_CALL: &str = "t_translate_call";
    pub const PARAGRAPH_PASS: &str = "t_paragraph_pass";
    pub const TABLE_PASS: &str = "t_table_pass";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_percentiles() {
        let registry = MetricsRegistry::new();
        for v in (1..=100).rev() {
            registry.record(metric_names::TRANSLATE_CALL, v as f64);
        }
        let s = &registry.summary()[metric_names::TRANSLATE_CALL];
        assert_eq!(s.count, 100);
        assert_eq!(s.p50_us, 51.0);
        assert_eq!(s.p99_us, 99.0);
    }

    #[test]
    fn test_window_drops_oldest() {
        let registry = MetricsRegistry::with_window(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            registry.record(metric_names::TABLE_PASS, v);
        }
        let s = &registry.summary()[metric_names::TABLE_PASS];
        assert_eq!(s.count, 4);
        assert_eq!(s.p99_us, 4.0);
    }

    #[test]
    fn test_span_records() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.span(metric_names::PARAGRAPH_PASS).finish();
        assert_eq!(registry.summary()[metric_names::PARAGRAPH_PASS].count, 1);
        assert!(!registry.summary().contains_key(metric_names::TABLE_PASS));
    }
}
