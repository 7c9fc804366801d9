//! ---
//! refdata_section: "04-rights"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Prometheus instruments for right assignment runs."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct RightsMetrics {
    registry: Arc<Registry>,
    runs_total: IntCounterVec,
    rows_written_total: IntCounter,
    duration_seconds: Histogram,
}

impl RightsMetrics {
    pub fn new(registry: Arc<Registry>) -> crate::Result<Self> {
        let runs_total = IntCounterVec::new(
            Opts::new(
                "refdata_right_assignment_runs_total",
                "Right assignment generation runs by scope",
            ),
            &["scope"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let rows_written_total = IntCounter::new(
            "refdata_right_assignment_rows_written_total",
            "Right assignment rows inserted across all runs",
        )?;
        registry.register(Box::new(rows_written_total.clone()))?;

        let duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "refdata_right_assignment_duration_seconds",
                "Wall time of one generation run",
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 16)?),
        )?;
        registry.register(Box::new(duration_seconds.clone()))?;

        Ok(Self {
            registry,
            runs_total,
            rows_written_total,
            duration_seconds,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_run(&self, scope: &str, rows: u64, seconds: f64) {
        self.runs_total.with_label_values(&[scope]).inc();
        self.rows_written_total.inc_by(rows);
        self.duration_seconds.observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_three_families() {
        let registry = Arc::new(Registry::new());
        let metrics = RightsMetrics::new(registry.clone()).unwrap();
        metrics.record_run("all", 12, 0.02);
        assert_eq!(registry.gather().len(), 3);
    }
}
