pub mod affinity;
pub mod arena;
pub mod barrier;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod stats;
pub mod sweep;
pub mod worker;

pub use arena::{ContentionArena, WorkerSlot, COUNT_SWEEP_MAX, NUM_COUNTERS};
pub use barrier::StartupBarrier;
pub use config::{CliArgs, Config};
pub use error::{FairnessError, FairnessResult};
pub use metrics::RunMetrics;
pub use orchestrator::{Orchestrator, PhaseOutcome, WindowSample};
pub use report::{CsvReporter, Reporter};
pub use stats::{GlobalStatTracker, StatAccumulator, StatTracker};
pub use sweep::{SweepController, SweepSummary};
pub use worker::{Discipline, Phase, SharedContext, WorkerParams, WorkerSet};

use anyhow::{Context, Result};
use std::io::Write;

/// CPUs to run workers on: the allowed set, trimmed to `max_threads`.
pub fn select_cpus(config: &Config) -> FairnessResult<Vec<usize>> {
    let mut cpus = affinity::allowed_cpus()?;
    if let Some(max) = config.worker.max_threads {
        cpus.truncate(max);
    }
    if cpus.is_empty() {
        return Err(FairnessError::NoCpus);
    }
    Ok(cpus)
}

/// Run a full sweep on `cpus`, streaming window rows to `reporter`.
///
/// Workers are started, swept and joined before this returns.
pub fn measure<R: Reporter + ?Sized>(
    config: &Config,
    cpus: &[usize],
    metrics: &RunMetrics,
    reporter: &mut R,
) -> FairnessResult<SweepSummary> {
    let workers = WorkerSet::spawn(cpus, WorkerParams::from(&config.worker))?;

    reporter.run_started(cpus)?;
    let orchestrator = Orchestrator::new(
        workers.context(),
        config.sweep.samples,
        config.sweep.interval(),
        metrics,
    );
    let summary = SweepController::new(orchestrator, config.sweep.count).run(reporter)?;

    workers.shutdown();
    Ok(summary)
}

pub fn run(config: Config) -> Result<()> {
    tracing::info!(operation = "startup", message = "atomic-fairness starting");
    tracing::debug!(config = ?config, "Configuration loaded");

    let cpus = select_cpus(&config).context("Failed to discover usable cpus")?;
    tracing::info!(operation = "cpus_selected", cpus = ?cpus);

    let metrics = RunMetrics::new();
    let stdout = std::io::stdout();
    let mut reporter = CsvReporter::new(stdout.lock());

    let summary = measure(&config, &cpus, &metrics, &mut reporter)
        .map_err(|e| {
            tracing::error!(
                operation = "measure_failed",
                config_error = e.is_config_error(),
                error = %e
            );
            e
        })
        .context("Measurement run failed")?;

    let mut plots = config.output.plot_dir.clone().map(stats::PlotWriter::new);
    let out = reporter.writer_mut();
    report::write_summaries(out, &summary, config.output.verbosity, plots.as_mut())
        .context("Failed to write summaries")?;
    out.flush().context("Failed to flush output")?;

    metrics.log_summary();
    Ok(())
}
