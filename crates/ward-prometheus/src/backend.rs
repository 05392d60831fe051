use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry, proto::MetricFamily};
use ward_core::{AllocCounter, MetricLabels, MetricsBackend};

const NAMESPACE: &str = "client";
const SUBSYSTEM: &str = "allocs";

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    /// Indexed like [`AllocCounter::ALL`].
    counters: Arc<[IntCounterVec]>,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Register the counters in an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let mut counters = Vec::with_capacity(AllocCounter::ALL.len());
        for counter in AllocCounter::ALL {
            let opts = Opts::new(
                format!("{}_total", counter.as_str()),
                format!("Task transitions counted as {}", counter.as_str()),
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM);
            let vec = IntCounterVec::new(opts, &MetricLabels::NAMES)?;
            registry.register(Box::new(vec.clone()))?;
            counters.push(vec);
        }
        Ok(Self {
            registry,
            counters: counters.into(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    fn counter(&self, counter: AllocCounter) -> &IntCounterVec {
        let idx = AllocCounter::ALL
            .iter()
            .position(|c| *c == counter)
            .unwrap_or_default();
        &self.counters[idx]
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn incr(&self, counter: AllocCounter, labels: &MetricLabels) {
        self.counter(counter)
            .with_label_values(&labels.values())
            .inc();
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}
