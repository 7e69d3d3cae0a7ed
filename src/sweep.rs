//! Enumerates the (row, discipline) matrix and aggregates the results.

use crate::arena::COUNT_SWEEP_MAX;
use crate::error::FairnessResult;
use crate::orchestrator::{Orchestrator, PhaseOutcome};
use crate::report::Reporter;
use crate::stats::{GlobalStatTracker, StatTracker};
use crate::worker::{Discipline, Phase};
use strum::IntoEnumIterator;
use tracing::{info, warn};

/// Phases in sweep order: rows outermost, tight before backoff.
pub fn sweep_phases(sweep_count: usize) -> Vec<Phase> {
    (0..sweep_count)
        .flat_map(|row| Discipline::iter().map(move |d| Phase::new(row, d)))
        .collect()
}

/// Label printed above a phase's windows.
pub fn phase_label(phase: Phase) -> String {
    format!(
        "Global counter {} {}: [bw in ops/mSec per thread, latency in ns]",
        phase.row, phase.discipline
    )
}

fn global_label(discipline: Discipline, sweep_count: usize) -> String {
    let mut name = discipline.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!(
        "{} summary across {} global counts [latency avg in ns, bw in ops/mSec]",
        name, sweep_count
    )
}

/// Everything a full sweep produced.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub sweep_count: usize,
    /// One entry per phase, in sweep order.
    pub phases: Vec<PhaseOutcome>,
    /// Finalized global trackers indexed by [`Discipline::index`].
    pub global: [GlobalStatTracker; 2],
}

impl SweepSummary {
    /// Finalized tracker for one configuration.
    pub fn tracker(&self, row: usize, discipline: Discipline) -> Option<&StatTracker> {
        self.phases
            .iter()
            .find(|o| o.phase == Phase::new(row, discipline))
            .map(|o| &o.tracker)
    }

    pub fn global(&self, discipline: Discipline) -> &GlobalStatTracker {
        &self.global[discipline.index()]
    }
}

/// Drives an [`Orchestrator`] through every sweep configuration.
#[derive(Debug)]
pub struct SweepController<'a> {
    orchestrator: Orchestrator<'a>,
    sweep_count: usize,
}

impl<'a> SweepController<'a> {
    /// `sweep_count` is clamped to [`COUNT_SWEEP_MAX`].
    pub fn new(orchestrator: Orchestrator<'a>, sweep_count: usize) -> Self {
        if sweep_count > COUNT_SWEEP_MAX {
            warn!(
                operation = "sweep_clamped",
                requested = sweep_count,
                max = COUNT_SWEEP_MAX,
                "Sweep count exceeds arena rows, clamping"
            );
        }
        Self {
            orchestrator,
            sweep_count: sweep_count.min(COUNT_SWEEP_MAX),
        }
    }

    pub fn sweep_count(&self) -> usize {
        self.sweep_count
    }

    /// Run every phase, then stop the workers.
    pub fn run<R: Reporter + ?Sized>(&self, reporter: &mut R) -> FairnessResult<SweepSummary> {
        let mut global = [
            GlobalStatTracker::new(global_label(Discipline::Tight, self.sweep_count)),
            GlobalStatTracker::new(global_label(Discipline::Backoff, self.sweep_count)),
        ];
        let mut phases = Vec::with_capacity(self.sweep_count * 2);

        info!(
            operation = "sweep_start",
            configurations = self.sweep_count,
            samples = self.orchestrator.samples()
        );

        for phase in sweep_phases(self.sweep_count) {
            let outcome = self
                .orchestrator
                .run_phase(phase, &phase_label(phase), reporter)?;
            global[phase.discipline.index()].fold(
                outcome.tracker.latency().avg(),
                outcome.mean_aggregate_bandwidth,
            );
            phases.push(outcome);
        }

        self.orchestrator.context().stop();

        for tracker in &mut global {
            tracker.finalize();
        }
        info!(operation = "sweep_complete", phases = phases.len());

        Ok(SweepSummary {
            sweep_count: self.sweep_count,
            phases,
            global,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_order() {
        let phases = sweep_phases(2);
        assert_eq!(
            phases,
            vec![
                Phase::new(0, Discipline::Tight),
                Phase::new(0, Discipline::Backoff),
                Phase::new(1, Discipline::Tight),
                Phase::new(1, Discipline::Backoff),
            ]
        );
        assert!(sweep_phases(0).is_empty());
        assert_eq!(sweep_phases(COUNT_SWEEP_MAX).len(), COUNT_SWEEP_MAX * 2);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            phase_label(Phase::new(3, Discipline::Backoff)),
            "Global counter 3 backoff: [bw in ops/mSec per thread, latency in ns]"
        );
        assert!(global_label(Discipline::Tight, 4).starts_with("Tight summary across 4"));
    }
}
