//! Sampling windows for one phase.

use crate::arena::WorkerSlot;
use crate::error::FairnessResult;
use crate::metrics::RunMetrics;
use crate::report::Reporter;
use crate::stats::{StatAccumulator, StatTracker};
use crate::worker::{Phase, SharedContext};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Nanoseconds per increment. Infinite when the worker made no progress.
#[inline]
pub fn latency_ns(window_ns: u64, increments: u64) -> f64 {
    window_ns as f64 / increments as f64
}

/// Increments per millisecond.
#[inline]
pub fn bandwidth_per_ms(window_ns: u64, increments: u64) -> f64 {
    increments as f64 * 1_000_000.0 / window_ns as f64
}

/// Per-worker results of one measured window, in worker order.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSample {
    /// Window number within the phase; 0 is never measured.
    pub index: usize,
    pub duration_ns: u64,
    pub increments: Vec<u64>,
    pub latency_ns: Vec<f64>,
    pub bandwidth: Vec<f64>,
}

impl WindowSample {
    pub fn new(index: usize, duration_ns: u64, increments: Vec<u64>) -> Self {
        let latency_ns = increments
            .iter()
            .map(|&n| latency_ns(duration_ns, n))
            .collect();
        let bandwidth = increments
            .iter()
            .map(|&n| bandwidth_per_ms(duration_ns, n))
            .collect();
        Self {
            index,
            duration_ns,
            increments,
            latency_ns,
            bandwidth,
        }
    }

    pub fn total_increments(&self) -> u64 {
        self.increments.iter().sum()
    }

    /// Workers that did not complete a single report in this window.
    pub fn starved_workers(&self) -> usize {
        self.increments.iter().filter(|&&n| n == 0).count()
    }

    /// Sum of per-worker bandwidth: what the whole machine achieved.
    pub fn aggregate_bandwidth(&self) -> f64 {
        self.bandwidth.iter().sum()
    }

    /// Finalized latency spread across workers for this window.
    pub fn latency_spread(&self) -> StatAccumulator {
        let mut acc = StatAccumulator::new();
        for &latency in &self.latency_ns {
            acc.add(latency);
        }
        acc.finalize();
        acc
    }
}

/// Per-phase bandwidth figure folded into the global summary.
///
/// The measured windows' aggregate bandwidth is summed and divided by
/// `samples`, the full window count of the phase including the discarded
/// first window. Global bandwidth numbers are comparable across runs with
/// different `samples` only through this divisor.
pub fn mean_aggregate_bandwidth<'s>(
    measured: impl IntoIterator<Item = &'s WindowSample>,
    samples: usize,
) -> f64 {
    let total: f64 = measured
        .into_iter()
        .map(WindowSample::aggregate_bandwidth)
        .sum();
    total / samples as f64
}

/// Result of a finished phase.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: Phase,
    /// Finalized per-worker, per-window statistics.
    pub tracker: StatTracker,
    pub measured_windows: usize,
    /// Aggregate bandwidth summed over the measured windows and divided by
    /// every window of the phase, see [`mean_aggregate_bandwidth`].
    pub mean_aggregate_bandwidth: f64,
}

/// Drives the workers through the sampling windows of a phase.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    ctx: &'a SharedContext,
    samples: usize,
    interval: Duration,
    metrics: &'a RunMetrics,
}

impl<'a> Orchestrator<'a> {
    /// `samples` windows per phase, the first of which is discarded.
    pub fn new(
        ctx: &'a SharedContext,
        samples: usize,
        interval: Duration,
        metrics: &'a RunMetrics,
    ) -> Self {
        Self {
            ctx,
            samples,
            interval,
            metrics,
        }
    }

    pub fn context(&self) -> &'a SharedContext {
        self.ctx
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Switch the workers to `phase` and measure it.
    ///
    /// Each window sleeps for the interval, then swaps every worker slot
    /// with zero and timestamps the boundary. Window 0 absorbs the phase
    /// switch and is dropped.
    pub fn run_phase<R: Reporter + ?Sized>(
        &self,
        phase: Phase,
        label: &str,
        reporter: &mut R,
    ) -> FairnessResult<PhaseOutcome> {
        debug!(
            operation = "phase_start",
            row = phase.row,
            discipline = %phase.discipline,
            samples = self.samples
        );
        self.ctx.set_phase(phase);
        reporter.phase_started(phase, label)?;

        let mut tracker = StatTracker::new(label);
        let mut measured = Vec::with_capacity(self.samples.saturating_sub(1));
        let mut last_stamp = Instant::now();

        for window in 0..self.samples {
            thread::sleep(self.interval);
            let counts: Vec<u64> = self.ctx.slots().iter().map(WorkerSlot::take).collect();
            let stamp = Instant::now();
            let elapsed = stamp.duration_since(last_stamp);
            last_stamp = stamp;

            if window == 0 {
                self.metrics.record_discarded();
                continue;
            }

            let duration_ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
            let sample = WindowSample::new(window, duration_ns, counts);
            for (&latency, &bandwidth) in sample.latency_ns.iter().zip(&sample.bandwidth) {
                tracker.add(latency, bandwidth);
            }

            trace!(
                operation = "window",
                window = window,
                duration_ns = duration_ns,
                increments = sample.total_increments()
            );
            self.metrics.record_window(&sample);
            reporter.window(&sample)?;
            measured.push(sample);
        }

        tracker.finalize();
        self.metrics.record_phase();
        debug!(
            operation = "phase_end",
            row = phase.row,
            discipline = %phase.discipline,
            latency_avg = tracker.latency().avg(),
            bandwidth_avg = tracker.bandwidth().avg()
        );

        Ok(PhaseOutcome {
            phase,
            tracker,
            measured_windows: measured.len(),
            mean_aggregate_bandwidth: mean_aggregate_bandwidth(&measured, self.samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{Discipline, WorkerParams};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        labels: Vec<String>,
        windows: Vec<WindowSample>,
    }

    impl Reporter for Recorder {
        fn phase_started(&mut self, _phase: Phase, label: &str) -> FairnessResult<()> {
            self.labels.push(label.to_string());
            Ok(())
        }

        fn window(&mut self, sample: &WindowSample) -> FairnessResult<()> {
            self.windows.push(sample.clone());
            Ok(())
        }
    }

    fn params() -> WorkerParams {
        WorkerParams {
            batch_size: 50,
            batches_per_report: 1,
            spacer: 0.0,
            delay_mask: 0,
            delay: Duration::from_millis(1),
            pin_threads: false,
        }
    }

    #[test]
    fn test_window_math() {
        let sample = WindowSample::new(1, 1_000_000, vec![1000, 500, 0]);

        assert_eq!(sample.latency_ns, vec![1000.0, 2000.0, f64::INFINITY]);
        assert_eq!(sample.bandwidth, vec![1000.0, 500.0, 0.0]);
        assert_eq!(sample.total_increments(), 1500);
        assert_eq!(sample.starved_workers(), 1);
        assert_eq!(sample.aggregate_bandwidth(), 1500.0);
    }

    #[test]
    fn test_mean_bandwidth_counts_the_discarded_window() {
        // 1 ms windows: 3000 and 1000 ops/ms aggregate
        let measured = vec![
            WindowSample::new(1, 1_000_000, vec![1000, 2000]),
            WindowSample::new(2, 1_000_000, vec![500, 500]),
        ];
        // three windows in the phase, the first one discarded
        assert_eq!(mean_aggregate_bandwidth(&measured, 3), 4000.0 / 3.0);
        assert_eq!(mean_aggregate_bandwidth(&measured[..1], 2), 1500.0);
        assert_eq!(mean_aggregate_bandwidth(&[], 4), 0.0);
    }

    #[test]
    fn test_latency_spread() {
        let sample = WindowSample::new(1, 6_000, vec![1, 2, 3]);
        let spread = sample.latency_spread();
        assert_eq!(spread.min(), 2000.0);
        assert_eq!(spread.max(), 6000.0);
        assert!((spread.avg() - 11000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_window_is_discarded() {
        // No worker threads: a helper thread stands in for two workers
        let ctx = Arc::new(SharedContext::new(&[0, 1], params()));
        let metrics = RunMetrics::new();
        let running = Arc::new(AtomicBool::new(true));

        let feeder = {
            let ctx = Arc::clone(&ctx);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                while running.load(Ordering::Relaxed) {
                    for slot in ctx.slots() {
                        slot.report(50);
                    }
                    thread::yield_now();
                }
            })
        };

        let orchestrator = Orchestrator::new(&ctx, 4, Duration::from_millis(5), &metrics);
        let mut recorder = Recorder::default();
        let phase = Phase::new(2, Discipline::Backoff);
        let outcome = orchestrator
            .run_phase(phase, "Global counter 2 backoff", &mut recorder)
            .unwrap();

        running.store(false, Ordering::Relaxed);
        feeder.join().unwrap();

        assert_eq!(ctx.phase(), phase);
        assert_eq!(outcome.measured_windows, 3);
        assert_eq!(recorder.windows.len(), 3);
        assert_eq!(recorder.windows[0].index, 1);
        assert_eq!(recorder.labels, vec!["Global counter 2 backoff"]);

        // Two workers per window
        assert_eq!(outcome.tracker.count(), 6);
        let observed: u64 = recorder.windows.iter().map(WindowSample::total_increments).sum();
        assert_eq!(observed % 50, 0);
        let expected = recorder
            .windows
            .iter()
            .map(WindowSample::aggregate_bandwidth)
            .sum::<f64>()
            / 4.0;
        assert_eq!(outcome.mean_aggregate_bandwidth, expected);

        assert_eq!(metrics.windows_discarded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.windows_sampled.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.phases_completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_single_window_phase_measures_nothing() {
        let ctx = SharedContext::new(&[0], params());
        let metrics = RunMetrics::new();
        let orchestrator = Orchestrator::new(&ctx, 1, Duration::from_millis(1), &metrics);
        let mut recorder = Recorder::default();

        let outcome = orchestrator
            .run_phase(Phase::new(0, Discipline::Tight), "only warmup", &mut recorder)
            .unwrap();

        assert_eq!(outcome.measured_windows, 0);
        assert_eq!(outcome.tracker.count(), 0);
        assert_eq!(outcome.mean_aggregate_bandwidth, 0.0);
        assert!(outcome.tracker.latency().stdev().is_nan());
    }
}
