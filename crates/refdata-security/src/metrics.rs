//! ---
//! refdata_section: "06-security-access-control"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Security counters."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Security metrics exported via Prometheus.
#[derive(Clone)]
pub struct SecurityMetrics {
    registry: Arc<Registry>,
    auth_attempts_total: IntCounter,
    auth_failures_total: IntCounter,
    right_denials_total: IntCounterVec,
}

impl SecurityMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let auth_attempts_total = IntCounter::new(
            "refdata_auth_attempts_total",
            "Bearer token authentication attempts",
        )?;
        let auth_failures_total = IntCounter::new(
            "refdata_auth_failures_total",
            "Rejected bearer tokens",
        )?;
        let right_denials_total = IntCounterVec::new(
            Opts::new(
                "refdata_right_denials_total",
                "Requests refused for a missing right",
            ),
            &["right"],
        )?;

        registry.register(Box::new(auth_attempts_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(right_denials_total.clone()))?;

        Ok(Self {
            registry,
            auth_attempts_total,
            auth_failures_total,
            right_denials_total,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn inc_auth_attempt(&self) {
        self.auth_attempts_total.inc();
    }

    pub fn inc_auth_failure(&self) {
        self.auth_failures_total.inc();
    }

    pub fn inc_right_denial(&self, right: &str) {
        self.right_denials_total.with_label_values(&[right]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_increment() {
        let registry = Arc::new(Registry::new());
        let metrics = SecurityMetrics::new(registry.clone()).unwrap();
        metrics.inc_auth_attempt();
        metrics.inc_auth_failure();
        metrics.inc_right_denial("USERS_MANAGE");
        let families = registry.gather();
        assert_eq!(families.len(), 3);
    }
}
