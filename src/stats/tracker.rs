use super::accumulator::StatAccumulator;
use tracing::info;

/// Latency and bandwidth statistics for one labelled series.
#[derive(Debug, Clone)]
pub struct StatTracker {
    label: String,
    latency: StatAccumulator,
    bandwidth: StatAccumulator,
}

impl StatTracker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            latency: StatAccumulator::new(),
            bandwidth: StatAccumulator::new(),
        }
    }

    /// Record one (latency, bandwidth) observation.
    #[inline]
    pub fn add(&mut self, latency: f64, bandwidth: f64) {
        self.latency.add(latency);
        self.bandwidth.add(bandwidth);
    }

    /// Finalize both series.
    pub fn finalize(&mut self) {
        self.latency.finalize();
        self.bandwidth.finalize();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn latency(&self) -> &StatAccumulator {
        &self.latency
    }

    pub fn bandwidth(&self) -> &StatAccumulator {
        &self.bandwidth
    }

    /// Number of observations; both series always hold the same count.
    pub fn count(&self) -> u64 {
        self.latency.count()
    }

    /// Log the finalized values of both series.
    pub fn log_summary(&self) {
        info!(
            operation = "stat_summary",
            label = %self.label,
            count = self.count(),
            latency_avg = self.latency.avg(),
            latency_stdev = self.latency.stdev(),
            latency_min = self.latency.min(),
            latency_max = self.latency.max(),
            latency_p99 = self.latency.percentile(0.99),
            bandwidth_avg = self.bandwidth.avg(),
            bandwidth_stdev = self.bandwidth.stdev(),
            bandwidth_p99 = self.bandwidth.percentile(0.99),
        );
    }
}

/// Sweep-wide summary: one (average latency, average bandwidth) point per phase.
#[derive(Debug, Clone)]
pub struct GlobalStatTracker {
    inner: StatTracker,
}

impl GlobalStatTracker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: StatTracker::new(label),
        }
    }

    /// Fold a finished phase into the summary.
    pub fn fold(&mut self, avg_latency: f64, avg_bandwidth: f64) {
        self.inner.add(avg_latency, avg_bandwidth);
    }

    pub fn finalize(&mut self) {
        self.inner.finalize();
    }

    /// Number of phases folded so far.
    pub fn count(&self) -> u64 {
        self.inner.count()
    }

    pub fn tracker(&self) -> &StatTracker {
        &self.inner
    }
}
