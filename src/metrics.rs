use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Aggregated view of one tracked metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: u64,
    pub sum: f64,
    pub last: f64,
    pub max: f64,
}

/// Thread-safe collector for handler counters and timings
pub struct MetricsCollector {
    metrics: Mutex<BTreeMap<String, MetricSummary>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(BTreeMap::new()),
        }
    }

    /// Track a simple metric value
    pub fn track_metric(&self, name: &str, value: f64) {
        tracing::debug!("Metric {}: {}", name, value);

        let mut metrics = match self.metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = metrics.entry(name.to_string()).or_default();
        entry.max = if entry.count == 0 { value } else { entry.max.max(value) };
        entry.count += 1;
        entry.sum += value;
        entry.last = value;
    }

    pub fn snapshot(&self) -> BTreeMap<String, MetricSummary> {
        match self.metrics.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<MetricSummary> {
        self.snapshot().remove(name)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Global metrics collector instance
pub static METRICS_COLLECTOR: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();

/// Get the global metrics collector
pub fn get_metrics_collector() -> &'static MetricsCollector {
    METRICS_COLLECTOR.get_or_init(MetricsCollector::new)
}

/// Simple macro for measuring operation duration
#[macro_export]
macro_rules! measure_operation {
    ($operation_name:expr) => {{
        struct OperationTimer {
            start: std::time::Instant,
            name: String,
        }

        impl Drop for OperationTimer {
            fn drop(&mut self) {
                let duration = self.start.elapsed().as_millis() as f64;
                $crate::metrics::get_metrics_collector()
                    .track_metric(&format!("{}_duration_ms", self.name), duration);
            }
        }

        OperationTimer {
            start: std::time::Instant::now(),
            name: $operation_name.to_string(),
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_metric_aggregates() {
        let collector = MetricsCollector::new();
        collector.track_metric("promotion.copied", 2.0);
        collector.track_metric("promotion.copied", 5.0);
        collector.track_metric("promotion.copied", 1.0);

        let summary = collector.get("promotion.copied").unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.sum, 8.0);
        assert_eq!(summary.last, 1.0);
        assert_eq!(summary.max, 5.0);
        assert!(collector.get("missing").is_none());
    }

    #[test]
    fn test_measure_operation_records_duration() {
        {
            let _timer = crate::measure_operation!("metrics.test_timer");
        }
        let summary = get_metrics_collector().get("metrics.test_timer_duration_ms").unwrap();
        assert!(summary.count >= 1);
    }
}
