//! Text output: per-window CSV rows and finalized statistics.

use crate::error::FairnessResult;
use crate::orchestrator::WindowSample;
use crate::stats::{PlotWriter, StatAccumulator, StatTracker};
use crate::sweep::SweepSummary;
use crate::worker::{Discipline, Phase};
use std::io::Write;

/// Receives measurements as the sweep produces them.
pub trait Reporter {
    /// Called once before the first phase with the CPU of every worker.
    fn run_started(&mut self, _cpus: &[usize]) -> FairnessResult<()> {
        Ok(())
    }

    fn phase_started(&mut self, phase: Phase, label: &str) -> FairnessResult<()>;

    /// Called for every measured (not discarded) window.
    fn window(&mut self, sample: &WindowSample) -> FairnessResult<()>;
}

/// Writes one CSV row of per-thread latencies per window.
#[derive(Debug)]
pub struct CsvReporter<W: Write> {
    out: W,
}

impl<W: Write> CsvReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for CsvReporter<W> {
    fn run_started(&mut self, cpus: &[usize]) -> FairnessResult<()> {
        writeln!(
            self.out,
            "results are avg latency per locked increment in ns, one column per thread"
        )?;
        write!(self.out, "cpu,")?;
        for cpu in cpus {
            write!(self.out, "{},", cpu)?;
        }
        writeln!(self.out, "avg,stdev,min,max")?;
        Ok(())
    }

    fn phase_started(&mut self, _phase: Phase, label: &str) -> FairnessResult<()> {
        writeln!(self.out, "{}", label)?;
        Ok(())
    }

    fn window(&mut self, sample: &WindowSample) -> FairnessResult<()> {
        for latency in &sample.latency_ns {
            write!(self.out, ",{:.1}", latency)?;
        }
        let spread = sample.latency_spread();
        writeln!(
            self.out,
            ",{:.1},{:.1},{:.1},{:.1}",
            spread.avg(),
            spread.stdev(),
            spread.min(),
            spread.max()
        )?;
        self.out.flush()?;
        Ok(())
    }
}

fn write_accumulator<W: Write>(out: &mut W, acc: &StatAccumulator) -> std::io::Result<()> {
    writeln!(out, " - Count:{}", acc.count())?;
    writeln!(out, " - Total:{:6.3}", acc.sum())?;
    writeln!(out, " - Avg:{:6.3}", acc.avg())?;
    writeln!(out, " - Stdev:{:6.3}", acc.stdev())?;
    writeln!(out, " - Max:{:6.3}", acc.max())?;
    writeln!(out, " - Min:{:6.3}", acc.min())?;
    writeln!(out, " - 99th:{:6.3}", acc.percentile(0.99))
}

/// Render a finalized tracker.
pub fn write_tracker<W: Write>(out: &mut W, tracker: &StatTracker) -> std::io::Result<()> {
    writeln!(out, "{}", tracker.label())?;
    writeln!(out, "- Latency metrics:")?;
    write_accumulator(out, tracker.latency())?;
    writeln!(out, "- Bandwidth metrics:")?;
    write_accumulator(out, tracker.bandwidth())
}

fn render<W: Write>(
    out: &mut W,
    tracker: &StatTracker,
    plots: &mut Option<&mut PlotWriter>,
) -> FairnessResult<()> {
    write_tracker(out, tracker)?;
    tracker.log_summary();
    if let Some(plots) = plots.as_deref_mut() {
        plots.write(tracker.label(), tracker.latency())?;
    }
    Ok(())
}

/// Print the finalized statistics selected by `verbosity`.
///
/// - `0`: nothing.
/// - `1`: both disciplines of row 0, plus both global summaries when more
///   than one row was swept.
/// - `2`: additionally the tight tracker of every other row.
/// - `3` and up: every other row with both disciplines.
///
/// Every rendered tracker also gets its latency histogram plotted when a
/// [`PlotWriter`] is given.
pub fn write_summaries<W: Write>(
    out: &mut W,
    summary: &SweepSummary,
    verbosity: u8,
    mut plots: Option<&mut PlotWriter>,
) -> FairnessResult<()> {
    if verbosity == 0 {
        return Ok(());
    }

    for discipline in [Discipline::Tight, Discipline::Backoff] {
        if let Some(tracker) = summary.tracker(0, discipline) {
            render(out, tracker, &mut plots)?;
        }
    }

    if verbosity > 1 {
        let disciplines: &[Discipline] = if verbosity > 2 {
            &[Discipline::Tight, Discipline::Backoff]
        } else {
            &[Discipline::Tight]
        };
        for row in 1..summary.sweep_count {
            for &discipline in disciplines {
                if let Some(tracker) = summary.tracker(row, discipline) {
                    render(out, tracker, &mut plots)?;
                }
            }
        }
    }

    if summary.sweep_count > 1 {
        for discipline in [Discipline::Tight, Discipline::Backoff] {
            render(out, summary.global(discipline).tracker(), &mut plots)?;
        }
    }

    out.flush()?;
    Ok(())
}
