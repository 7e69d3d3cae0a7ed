//! Worker threads and the context they share with the orchestrator.
//!
//! Memory ordering contract:
//!
//! - Arena counters and slot counters: `Relaxed`. Only atomicity matters;
//!   nothing else is published through them.
//! - Mode word and active flag: written by the orchestrator with `Release`,
//!   read by workers with `Acquire`, so a worker that observes a new phase
//!   also observes everything the orchestrator did before publishing it.

use crate::affinity::pin_current_thread;
use crate::arena::{bucket_for, ContentionArena, WorkerSlot};
use crate::barrier::StartupBarrier;
use crate::config::WorkerConfig;
use crate::error::{FairnessError, FairnessResult};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use strum::{AsRefStr, Display, EnumIter};
use tracing::{debug, info, trace};

/// How a worker issues its increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Discipline {
    /// Back-to-back increments.
    Tight,
    /// A CPU relax hint after every increment.
    Backoff,
}

impl Discipline {
    /// Position in sweep order (tight first).
    pub fn index(self) -> usize {
        match self {
            Discipline::Tight => 0,
            Discipline::Backoff => 1,
        }
    }
}

/// The sweep configuration currently being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Phase {
    /// Arena row the workers increment.
    pub row: usize,
    pub discipline: Discipline,
}

impl Phase {
    pub fn new(row: usize, discipline: Discipline) -> Self {
        Self { row, discipline }
    }

    fn encode(self) -> u64 {
        ((self.row as u64) << 1) | self.discipline.index() as u64
    }

    fn decode(word: u64) -> Self {
        let discipline = if word & 1 == 0 {
            Discipline::Tight
        } else {
            Discipline::Backoff
        };
        Self {
            row: (word >> 1) as usize,
            discipline,
        }
    }
}

/// Worker tuning, resolved from [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct WorkerParams {
    /// Increments per inner batch.
    pub batch_size: u32,
    /// Batches between two updates of the worker's slot. Larger values make
    /// the slot update cheaper relative to the increments being measured.
    pub batches_per_report: u32,
    pub spacer: f64,
    pub delay_mask: u64,
    pub delay: Duration,
    pub pin_threads: bool,
}

impl WorkerParams {
    /// Whether the worker on `cpu` sleeps before entering each mode.
    pub fn is_delayed(&self, cpu: usize) -> bool {
        cpu < 64 && self.delay_mask & (1u64 << cpu) != 0
    }

    /// Increments represented by one slot update.
    pub fn increments_per_report(&self) -> u64 {
        u64::from(self.batch_size) * u64::from(self.batches_per_report)
    }
}

impl From<&WorkerConfig> for WorkerParams {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batches_per_report: config.batches_per_report,
            spacer: config.spacer,
            delay_mask: config.delay_mask,
            delay: Duration::from_millis(config.delay_ms),
            pin_threads: config.pin_threads,
        }
    }
}

/// State shared by every worker and the orchestrator.
#[derive(Debug)]
pub struct SharedContext {
    arena: ContentionArena,
    slots: Box<[WorkerSlot]>,
    mode: AtomicU64,
    active: AtomicBool,
    barrier: StartupBarrier,
    params: WorkerParams,
}

impl SharedContext {
    /// Context for one worker per entry of `cpus`. The startup barrier
    /// expects every worker plus the orchestrator.
    pub fn new(cpus: &[usize], params: WorkerParams) -> Self {
        let slots: Vec<WorkerSlot> = cpus
            .iter()
            .enumerate()
            .map(|(u, &cpu)| WorkerSlot::new(cpu, bucket_for(u, params.spacer)))
            .collect();

        Self {
            arena: ContentionArena::new(),
            slots: slots.into_boxed_slice(),
            mode: AtomicU64::new(Phase::new(0, Discipline::Tight).encode()),
            active: AtomicBool::new(true),
            barrier: StartupBarrier::new(cpus.len() + 1),
            params,
        }
    }

    pub fn arena(&self) -> &ContentionArena {
        &self.arena
    }

    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots
    }

    pub fn barrier(&self) -> &StartupBarrier {
        &self.barrier
    }

    pub fn params(&self) -> &WorkerParams {
        &self.params
    }

    /// Switch every worker to `phase`. Orchestrator only.
    pub fn set_phase(&self, phase: Phase) {
        self.mode.store(phase.encode(), Ordering::Release);
    }

    pub fn phase(&self) -> Phase {
        Phase::decode(self.mode.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ask every worker to exit at its next batch boundary.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Body of worker `index`: pin, rendezvous, then increment until stopped.
pub fn run_worker(ctx: &SharedContext, index: usize) {
    let slot = &ctx.slots[index];
    let params = &ctx.params;

    if params.pin_threads {
        if let Err(e) = pin_current_thread(slot.cpu()) {
            ctx.barrier.abort(e.to_string());
            return;
        }
    }

    if ctx.barrier.register_and_wait().is_err() {
        return;
    }
    debug!(
        operation = "worker_started",
        cpu = slot.cpu(),
        bucket = slot.bucket()
    );

    let delayed = params.is_delayed(slot.cpu());
    while ctx.is_active() {
        let phase = ctx.phase();
        let counter = ctx.arena.counter(phase.row, slot.bucket());

        if delayed {
            thread::sleep(params.delay);
        }
        trace!(operation = "worker_phase", cpu = slot.cpu(), row = phase.row, discipline = %phase.discipline);

        match phase.discipline {
            Discipline::Tight => increment_while::<false>(ctx, phase, counter, slot),
            Discipline::Backoff => increment_while::<true>(ctx, phase, counter, slot),
        }
    }
}

/// Increment `counter` in batches until the phase changes or the run stops.
/// Flags are only checked between reports, never mid-batch.
#[inline]
fn increment_while<const BACKOFF: bool>(
    ctx: &SharedContext,
    phase: Phase,
    counter: &AtomicU32,
    slot: &WorkerSlot,
) {
    let batch_size = ctx.params.batch_size;
    let batches = ctx.params.batches_per_report;
    let per_report = ctx.params.increments_per_report();

    while ctx.is_active() && ctx.phase() == phase {
        for _ in 0..batches {
            for _ in 0..batch_size {
                counter.fetch_add(1, Ordering::Relaxed);
                if BACKOFF {
                    std::hint::spin_loop();
                }
            }
        }
        slot.report(per_report);
    }
}

/// The running worker threads, one per CPU.
///
/// Dropping the set stops and joins every worker.
#[derive(Debug)]
pub struct WorkerSet {
    ctx: Arc<SharedContext>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    /// Spawn one worker per CPU in `cpus` and wait until all of them are
    /// pinned and registered. Any pinning or spawn failure stops the
    /// workers already started and is returned as a fatal error.
    pub fn spawn(cpus: &[usize], params: WorkerParams) -> FairnessResult<Self> {
        if cpus.is_empty() {
            return Err(FairnessError::NoCpus);
        }

        let ctx = Arc::new(SharedContext::new(cpus, params));
        let mut set = Self {
            ctx: Arc::clone(&ctx),
            handles: Vec::with_capacity(cpus.len()),
        };

        for (index, &cpu) in cpus.iter().enumerate() {
            let worker_ctx = Arc::clone(&ctx);
            let spawned = thread::Builder::new()
                .name(format!("fairness-cpu{}", cpu))
                .spawn(move || run_worker(&worker_ctx, index));

            match spawned {
                Ok(handle) => set.handles.push(handle),
                Err(e) => {
                    let err = FairnessError::ThreadSpawn(format!("cpu {}: {}", cpu, e));
                    ctx.barrier.abort(err.to_string());
                    return Err(err);
                }
            }
        }

        ctx.barrier.register_and_wait()?;
        info!(
            operation = "workers_started",
            workers = cpus.len(),
            pinned = ctx.params.pin_threads
        );
        Ok(set)
    }

    pub fn context(&self) -> &Arc<SharedContext> {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.ctx.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctx.slots.is_empty()
    }

    /// Stop every worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.ctx.stop();
        for handle in self.handles.drain(..) {
            // A worker only panics on a bug; nothing to recover at shutdown
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
