//! Common test utilities for atomic-fairness
//!
//! Provides a quick configuration for sweeps that finish in milliseconds
//! and a reporter that keeps everything it is handed.

#![allow(dead_code)]

use atomic_fairness::{Config, FairnessResult, Phase, Reporter, WindowSample};

/// Short windows, no pinning, so tests run anywhere.
pub fn quick_config(sweep_count: usize, samples: usize) -> Config {
    let mut config = Config::default();
    config.sweep.count = sweep_count;
    config.sweep.samples = samples;
    config.sweep.interval_ms = 5;
    config.worker.pin_threads = false;
    config.worker.delay_ms = 1;
    config
}

/// Worker placement for `n` workers that does not depend on the host.
pub fn fake_cpus(n: usize) -> Vec<usize> {
    (0..n).collect()
}

#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub cpus: Vec<usize>,
    pub phases: Vec<(Phase, String)>,
    pub windows: Vec<(Phase, WindowSample)>,
}

impl Reporter for CollectingReporter {
    fn run_started(&mut self, cpus: &[usize]) -> FairnessResult<()> {
        self.cpus = cpus.to_vec();
        Ok(())
    }

    fn phase_started(&mut self, phase: Phase, label: &str) -> FairnessResult<()> {
        self.phases.push((phase, label.to_string()));
        Ok(())
    }

    fn window(&mut self, sample: &WindowSample) -> FairnessResult<()> {
        let phase = self
            .phases
            .last()
            .map(|(p, _)| *p)
            .expect("window reported before any phase");
        self.windows.push((phase, sample.clone()));
        Ok(())
    }
}
