//! Master source manager
//!
//! Owns the registry and the run timing plan, builds one thread manager per
//! worker and drives the batch sequence. Workers run their sub-batches in
//! lock-step: the master waits for every worker to finish the current round
//! before issuing the next one, and checks the abort flag in between.

use crate::batch::{Batch, BatchQueue, MAX_BATCH_EVENTS};
use crate::engine::{BatchReport, EngineFactory, TransportEngine, VisualizationOptions};
use crate::error::SourceError;
use crate::instance::{SourceCounters, DEFAULT_MAX_REDRAWS};
use crate::partition::{PartitionStrategy, ThreadPartition};
use crate::registry::SourceRegistry;
use crate::rng;
use crate::source::{SourceDefinition, SourceType};
use crate::thread_manager::{SourceOrdering, ThreadSettings, ThreadSourceManager};
use crate::timing::{RunInterval, RunTimingPlan};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_SEED: u64 = 123_456_789;

/// Options of the master manager
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Number of thread managers, the master (index 0) included
    pub threads: usize,
    pub seed: u64,
    pub ordering: SourceOrdering,
    pub partition: PartitionStrategy,
    /// Upper bound of one engine request, at most `i32::MAX`
    pub max_batch_events: i32,
    /// Rejected draws tolerated per primary under `SkipEvents`
    pub max_redraws: u64,
    pub visualization: VisualizationOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            seed: DEFAULT_SEED,
            ordering: SourceOrdering::default(),
            partition: PartitionStrategy::default(),
            max_batch_events: MAX_BATCH_EVENTS,
            max_redraws: DEFAULT_MAX_REDRAWS,
            visualization: VisualizationOptions::default(),
        }
    }
}

impl ManagerConfig {
    pub fn check(&self) -> Result<(), SourceError> {
        if self.threads == 0 {
            return Err(SourceError::InvalidConfig(
                "the number of threads must be at least 1".to_string(),
            ));
        }
        if self.max_batch_events < 1 {
            return Err(SourceError::InvalidConfig(format!(
                "the maximum batch size must be in [1, {}], got {}",
                MAX_BATCH_EVENTS, self.max_batch_events
            )));
        }
        Ok(())
    }
}

/// Shared flag stopping a run at the next batch boundary
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Let every worker finish its current sub-batch, then issue no more
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress of one thread at the end of `start()`
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadSummary {
    pub thread_index: usize,
    pub expected: u64,
    pub delivered: u64,
    pub batches: u64,
    pub counters: Vec<SourceCounters>,
}

/// Outcome of `start()`
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub threads: Vec<ThreadSummary>,
    pub rounds: u64,
    pub aborted: bool,
}

impl RunSummary {
    pub fn total_expected(&self) -> u64 {
        self.threads.iter().map(|t| t.expected).sum()
    }

    pub fn total_delivered(&self) -> u64 {
        self.threads.iter().map(|t| t.delivered).sum()
    }

    pub fn total_batches(&self) -> u64 {
        self.threads.iter().map(|t| t.batches).sum()
    }

    /// Counters of each source summed over the threads
    pub fn source_counters(&self) -> Vec<SourceCounters> {
        let mut merged: Vec<SourceCounters> = Vec::new();
        for thread in &self.threads {
            if merged.len() < thread.counters.len() {
                merged.resize(thread.counters.len(), SourceCounters::default());
            }
            for (total, counters) in merged.iter_mut().zip(&thread.counters) {
                total.merge(counters);
            }
        }
        merged
    }
}

enum WorkerCommand {
    Run(Batch),
    Stop,
}

enum WorkerEvent {
    Ready,
    BatchDone(BatchReport),
    Failed(SourceError),
}

struct WorkerReport {
    thread_index: usize,
    event: WorkerEvent,
}

#[derive(Debug)]
pub struct SourceManager {
    config: ManagerConfig,
    registry: SourceRegistry,
    plan: Option<Arc<RunTimingPlan>>,
    master: Option<ThreadSourceManager>,
    abort: AbortHandle,
}

impl SourceManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            registry: SourceRegistry::new(),
            plan: None,
            master: None,
            abort: AbortHandle::default(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// See `SourceRegistry::add_source`
    pub fn add_source(
        &mut self,
        source_type: SourceType,
        name: &str,
    ) -> Result<&mut SourceDefinition, SourceError> {
        self.registry.add_source(source_type, name)
    }

    pub fn source(&self, name: &str) -> Result<&SourceDefinition, SourceError> {
        self.registry.get(name)
    }

    pub fn source_mut(&mut self, name: &str) -> Result<&mut SourceDefinition, SourceError> {
        self.registry.get_mut(name)
    }

    /// Validate and store the run timing plan
    ///
    /// Validates the intervals, the configuration and every source, then
    /// freezes the registry.
    pub fn initialize(&mut self, intervals: Vec<RunInterval>) -> Result<(), SourceError> {
        let plan = RunTimingPlan::new(intervals)?;
        self.initialize_with_plan(plan)
    }

    pub fn initialize_with_plan(&mut self, plan: RunTimingPlan) -> Result<(), SourceError> {
        self.config.check()?;
        if self.registry.is_empty() {
            return Err(SourceError::NoSource);
        }
        self.registry.freeze_for(&plan)?;

        log::info!(
            target: "source",
            "initialized {} source(s) over {} run(s), {} s of simulated time",
            self.registry.len(),
            plan.len(),
            plan.total_duration()
        );
        self.plan = Some(Arc::new(plan));
        Ok(())
    }

    pub fn plan(&self) -> Option<&RunTimingPlan> {
        self.plan.as_deref()
    }

    /// Expected primaries of one source over the whole plan
    pub fn expected_total(&self, name: &str) -> Result<u64, SourceError> {
        let plan = self.plan.as_ref().ok_or(SourceError::NotInitialized)?;
        self.registry.get(name)?.expected_total(plan)
    }

    fn thread_settings(&self, thread_index: usize) -> ThreadSettings {
        ThreadSettings {
            partition: ThreadPartition::new(thread_index, self.config.threads, self.config.partition),
            ordering: self.config.ordering,
            max_redraws: self.config.max_redraws,
        }
    }

    /// Independent replica of every source for the given thread
    pub fn create_thread_manager(&self, thread_index: usize) -> Result<ThreadSourceManager, SourceError> {
        let plan = self.plan.as_ref().ok_or(SourceError::NotInitialized)?;
        ThreadSourceManager::create(
            &self.registry,
            Arc::clone(plan),
            rng::thread_seed(self.config.seed, thread_index),
            self.thread_settings(thread_index),
        )
    }

    /// Build the master thread manager (thread index 0)
    pub fn build(&mut self) -> Result<&mut ThreadSourceManager, SourceError> {
        let master = self.create_thread_manager(0)?;
        log::info!(
            target: "source",
            "master source manager built: {} of {} thread(s), {} event(s)",
            master.thread_index(),
            self.config.threads,
            master.expected_events()
        );
        Ok(self.master.insert(master))
    }

    pub fn master(&self) -> Option<&ThreadSourceManager> {
        self.master.as_ref()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Summary on one line, or one block per source when `level > 0`
    pub fn dump(&self, level: u8) -> String {
        self.registry.dump(level)
    }

    /// Run every thread's schedule through the engine, blocking until done
    pub fn start<F: EngineFactory>(&mut self, factory: &F) -> Result<RunSummary, SourceError> {
        let plan = Arc::clone(self.plan.as_ref().ok_or(SourceError::NotInitialized)?);
        let master = self.master.take().ok_or(SourceError::NotBuilt)?;

        // Every replica is built before any thread starts
        let mut managers = vec![master];
        for thread_index in 1..self.config.threads {
            match self.create_thread_manager(thread_index) {
                Ok(manager) => managers.push(manager),
                Err(e) => {
                    self.master = Some(managers.swap_remove(0));
                    return Err(e);
                }
            }
        }

        let mut queues: Vec<BatchQueue> = managers
            .iter()
            .map(|m| BatchQueue::for_thread(m, self.config.max_batch_events))
            .collect();
        log::info!(
            target: "source",
            "starting {} thread(s): {} event(s) in {} batch(es)",
            managers.len(),
            queues.iter().map(|q| q.planned).sum::<u64>(),
            queues.iter().map(BatchQueue::len).sum::<u64>()
        );

        let abort = self.abort.clone();
        let visualization = &self.config.visualization;
        let outcome = std::thread::scope(|scope| {
            let (report_tx, report_rx) = unbounded::<WorkerReport>();
            let mut command_txs = Vec::with_capacity(managers.len());
            let mut handles = Vec::with_capacity(managers.len());

            for manager in managers.iter_mut() {
                let (command_tx, command_rx) = bounded::<WorkerCommand>(1);
                command_txs.push(command_tx);
                let report_tx = report_tx.clone();
                let plan = &plan;
                handles.push(scope.spawn(move || {
                    run_worker(factory, manager, plan, visualization, command_rx, report_tx)
                }));
            }
            drop(report_tx);

            let outcome = drive_rounds(&mut queues, &command_txs, &report_rx, &abort);

            for command_tx in &command_txs {
                let _ = command_tx.send(WorkerCommand::Stop);
            }
            drop(command_txs);

            let mut outcome = outcome;
            for (thread_index, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() && outcome.is_ok() {
                    outcome = Err(SourceError::WorkerPanicked { thread_index });
                }
            }
            outcome
        });

        let summary = RunSummary {
            threads: managers
                .iter()
                .zip(&queues)
                .map(|(manager, queue)| ThreadSummary {
                    thread_index: manager.thread_index(),
                    expected: queue.planned,
                    delivered: queue.delivered,
                    batches: queue.batches_run,
                    counters: manager.counters(),
                })
                .collect(),
            rounds: outcome.as_ref().map_or(0, |rounds| *rounds),
            aborted: self.abort.is_aborted(),
        };

        // Worker replicas are torn down here, the master is kept
        self.master = Some(managers.swap_remove(0));

        outcome?;
        log::info!(
            target: "source",
            "run complete: {} / {} event(s) in {} batch(es){}",
            summary.total_delivered(),
            summary.total_expected(),
            summary.total_batches(),
            if summary.aborted { ", aborted" } else { "" }
        );
        Ok(summary)
    }
}

/// Master side of the batch protocol. Returns the number of rounds issued.
fn drive_rounds(
    queues: &mut [BatchQueue],
    command_txs: &[Sender<WorkerCommand>],
    report_rx: &Receiver<WorkerReport>,
    abort: &AbortHandle,
) -> Result<u64, SourceError> {
    let mut first_error: Option<SourceError> = None;

    // Wait for every engine to be set up
    let mut waiting = vec![true; command_txs.len()];
    for _ in 0..command_txs.len() {
        let report = report_rx.recv().map_err(|_| silent_worker(&waiting))?;
        waiting[report.thread_index] = false;
        if let WorkerEvent::Failed(e) = report.event {
            first_error.get_or_insert(e);
        }
    }
    if let Some(e) = first_error.take() {
        return Err(e);
    }

    let mut rounds = 0;
    while !abort.is_aborted() {
        let mut in_flight = 0;
        for (thread_index, queue) in queues.iter_mut().enumerate() {
            let Some(batch) = queue.next() else {
                continue;
            };
            if command_txs[thread_index].send(WorkerCommand::Run(batch)).is_err() {
                return Err(SourceError::WorkerPanicked { thread_index });
            }
            waiting[thread_index] = true;
            in_flight += 1;
        }
        if in_flight == 0 {
            break;
        }
        rounds += 1;

        for _ in 0..in_flight {
            let report = report_rx.recv().map_err(|_| silent_worker(&waiting))?;
            waiting[report.thread_index] = false;
            match report.event {
                WorkerEvent::BatchDone(batch) => {
                    let queue = &mut queues[report.thread_index];
                    queue.record(batch.transported);
                    if batch.transported < batch.requested as u64 {
                        log::warn!(
                            target: "source",
                            "thread {} transported {} of {} requested event(s)",
                            report.thread_index,
                            batch.transported,
                            batch.requested
                        );
                    }
                }
                WorkerEvent::Failed(e) => {
                    first_error.get_or_insert(e);
                }
                WorkerEvent::Ready => {}
            }
        }

        if let Some(e) = first_error.take() {
            abort.abort();
            return Err(e);
        }
    }

    Ok(rounds)
}

/// Error for a report channel closed while workers still owed a report
fn silent_worker(waiting: &[bool]) -> SourceError {
    SourceError::WorkerPanicked {
        thread_index: waiting.iter().position(|&w| w).unwrap_or(0),
    }
}

/// Worker side: set up the engine, then run batches until told to stop
fn run_worker<F: EngineFactory>(
    factory: &F,
    manager: &mut ThreadSourceManager,
    plan: &RunTimingPlan,
    visualization: &VisualizationOptions,
    commands: Receiver<WorkerCommand>,
    reports: Sender<WorkerReport>,
) {
    let thread_index = manager.thread_index();
    let send = |event: WorkerEvent| {
        let _ = reports.send(WorkerReport { thread_index, event });
    };

    let setup = panic::catch_unwind(AssertUnwindSafe(|| -> Result<F::Engine, SourceError> {
        let mut engine = factory.create_engine(thread_index)?;
        for (index, instance) in manager.instances().iter().enumerate() {
            let handle = engine.create_source_handle(index, instance.definition())?;
            engine.add_source(handle)?;
        }
        engine.initialize_run(plan, visualization)?;
        Ok(engine)
    }));

    let mut engine = match setup {
        Ok(Ok(engine)) => {
            send(WorkerEvent::Ready);
            engine
        }
        Ok(Err(e)) => {
            send(WorkerEvent::Failed(e));
            return;
        }
        Err(_) => {
            send(WorkerEvent::Failed(SourceError::WorkerPanicked { thread_index }));
            return;
        }
    };

    while let Ok(WorkerCommand::Run(batch)) = commands.recv() {
        if batch.part == 0 {
            if let Some(interval) = plan.get(batch.interval_index) {
                log::info!(
                    target: "source",
                    "thread {} starts run {} {}",
                    thread_index,
                    batch.interval_index,
                    interval
                );
            }
        }
        log::debug!(
            target: "source",
            "thread {} batch {}.{}: {} event(s)",
            thread_index,
            batch.interval_index,
            batch.part,
            batch.events
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.run_batch(&mut *manager, batch.events)
        }));
        match result {
            Ok(Ok(report)) => send(WorkerEvent::BatchDone(report)),
            Ok(Err(e)) => send(WorkerEvent::Failed(e)),
            Err(_) => {
                send(WorkerEvent::Failed(SourceError::WorkerPanicked { thread_index }));
                return;
            }
        }
    }

    engine.end_of_simulation();
}
