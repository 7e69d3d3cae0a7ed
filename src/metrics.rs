use crate::orchestrator::WindowSample;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Bookkeeping about the run itself, as opposed to the measurements.
#[derive(Debug)]
pub struct RunMetrics {
    /// Windows that contributed to statistics
    pub windows_sampled: AtomicU64,
    /// Leading windows thrown away after a phase switch
    pub windows_discarded: AtomicU64,
    /// Phases finalized
    pub phases_completed: AtomicU64,
    /// Increments observed across all measured windows
    pub increments_observed: AtomicU64,
    /// Per-worker window samples with zero increments
    pub starved_samples: AtomicU64,
    pub start_time: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            windows_sampled: AtomicU64::new(0),
            windows_discarded: AtomicU64::new(0),
            phases_completed: AtomicU64::new(0),
            increments_observed: AtomicU64::new(0),
            starved_samples: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_discarded(&self) {
        self.windows_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a measured window.
    pub fn record_window(&self, sample: &WindowSample) {
        self.windows_sampled.fetch_add(1, Ordering::Relaxed);
        self.increments_observed
            .fetch_add(sample.total_increments(), Ordering::Relaxed);

        let starved = sample.starved_workers();
        if starved > 0 {
            self.starved_samples
                .fetch_add(starved as u64, Ordering::Relaxed);
            warn!(
                operation = "starved_window",
                window = sample.index,
                workers = starved,
                "Workers made no progress during a window"
            );
        }
    }

    pub fn record_phase(&self) {
        self.phases_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Increments per second over the whole run, measured windows only.
    pub fn observed_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.increments_observed.load(Ordering::Relaxed) as f64 / secs
    }

    /// Log a summary of the run
    pub fn log_summary(&self) {
        info!(
            operation = "run_metrics_summary",
            phases = self.phases_completed.load(Ordering::Relaxed),
            windows_sampled = self.windows_sampled.load(Ordering::Relaxed),
            windows_discarded = self.windows_discarded.load(Ordering::Relaxed),
            increments_observed = self.increments_observed.load(Ordering::Relaxed),
            starved_samples = self.starved_samples.load(Ordering::Relaxed),
            increments_per_sec = self.observed_rate(),
            duration_secs = self.elapsed().as_secs_f64(),
        );
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
