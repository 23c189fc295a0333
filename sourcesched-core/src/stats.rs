//! Reference engine counting what it is fed
//!
//! `StatisticsEngine` does no transport: it pulls primaries through the
//! per-event callback and records run, event and batch counts. Each worker
//! keeps its own counters and merges them into the shared statistics at the
//! end of the simulation.

use crate::engine::{drive_events, BatchReport, EngineFactory, SourceHandle, TransportEngine, VisualizationOptions};
use crate::error::{EngineError, SourceError};
use crate::model::Primary;
use crate::thread_manager::PrimaryGenerator;
use crate::timing::{RunInterval, RunTimingPlan};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Aggregated counts of a simulation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStatistics {
    /// Distinct run intervals in which at least one event was transported
    pub runs: BTreeSet<usize>,
    pub event_count: u64,
    pub batch_count: u64,
    pub zero_energy_count: u64,
    /// Events per source index
    pub source_events: Vec<u64>,
    pub source_names: Vec<String>,
    /// Primaries whose time falls outside their run interval
    pub out_of_interval: u64,
    pub energy_sum: f64,
    pub thread_count: usize,
    pub elapsed: Duration,
}

impl SimulationStatistics {
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Primaries per second of wall-clock time
    pub fn pps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.event_count as f64 / secs
        } else {
            0.0
        }
    }

    fn record(&mut self, primary: &Primary, interval: Option<&RunInterval>) {
        self.event_count += 1;
        self.runs.insert(primary.interval_index);
        if primary.energy == 0.0 {
            self.zero_energy_count += 1;
        }
        self.energy_sum += primary.energy;
        if self.source_events.len() <= primary.source_index {
            self.source_events.resize(primary.source_index + 1, 0);
        }
        self.source_events[primary.source_index] += 1;
        let inside = interval.map_or(false, |i| i.contains(primary.time));
        if !inside {
            self.out_of_interval += 1;
        }
    }

    pub fn merge(&mut self, other: &SimulationStatistics) {
        self.runs.extend(other.runs.iter().copied());
        self.event_count += other.event_count;
        self.batch_count += other.batch_count;
        self.zero_energy_count += other.zero_energy_count;
        if self.source_events.len() < other.source_events.len() {
            self.source_events.resize(other.source_events.len(), 0);
        }
        for (mine, theirs) in self.source_events.iter_mut().zip(&other.source_events) {
            *mine += theirs;
        }
        if self.source_names.len() < other.source_names.len() {
            self.source_names = other.source_names.clone();
        }
        self.out_of_interval += other.out_of_interval;
        self.energy_sum += other.energy_sum;
        self.thread_count += other.thread_count;
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}

impl fmt::Display for SimulationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "runs     {}", self.run_count())?;
        writeln!(f, "events   {}", self.event_count)?;
        writeln!(f, "batches  {}", self.batch_count)?;
        writeln!(f, "threads  {}", self.thread_count)?;
        writeln!(f, "zero E   {}", self.zero_energy_count)?;
        for (idx, count) in self.source_events.iter().enumerate() {
            let name = self.source_names.get(idx).map(String::as_str).unwrap_or("?");
            writeln!(f, "  {:<20} {}", name, count)?;
        }
        write!(f, "PPS      {:.0}", self.pps())
    }
}

/// Engine of one worker thread
pub struct StatisticsEngine {
    thread_index: usize,
    intervals: Vec<RunInterval>,
    local: SimulationStatistics,
    sink: Arc<Mutex<SimulationStatistics>>,
    next_event_id: u64,
    started: Instant,
}

impl StatisticsEngine {
    pub fn statistics(&self) -> &SimulationStatistics {
        &self.local
    }
}

impl TransportEngine for StatisticsEngine {
    fn add_source(&mut self, handle: SourceHandle) -> Result<(), EngineError> {
        if self.local.source_names.len() <= handle.index {
            self.local.source_names.resize(handle.index + 1, String::new());
            self.local.source_events.resize(handle.index + 1, 0);
        }
        self.local.source_names[handle.index] = handle.name;
        Ok(())
    }

    fn initialize_run(
        &mut self,
        plan: &RunTimingPlan,
        _visualization: &VisualizationOptions,
    ) -> Result<(), EngineError> {
        self.intervals = plan.intervals().to_vec();
        self.started = Instant::now();
        Ok(())
    }

    fn run_batch(
        &mut self,
        generator: &mut dyn PrimaryGenerator,
        event_count: i32,
    ) -> Result<BatchReport, SourceError> {
        let intervals = &self.intervals;
        let local = &mut self.local;
        let report = drive_events(generator, self.next_event_id, event_count, |primary| {
            local.record(primary, intervals.get(primary.interval_index));
        })?;
        self.next_event_id += report.transported;
        self.local.batch_count += 1;
        log::debug!(
            target: "source",
            "thread {} transported {} / {} events",
            self.thread_index,
            report.transported,
            report.requested
        );
        Ok(report)
    }

    fn end_of_simulation(&mut self) {
        self.local.thread_count = 1;
        self.local.elapsed = self.started.elapsed();
        self.sink.lock().merge(&self.local);
    }
}

/// Hands out statistics engines sharing one result sink
#[derive(Debug, Default, Clone)]
pub struct StatisticsEngineFactory {
    sink: Arc<Mutex<SimulationStatistics>>,
}

impl StatisticsEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics merged so far (complete once `start()` returned)
    pub fn statistics(&self) -> SimulationStatistics {
        self.sink.lock().clone()
    }
}

impl EngineFactory for StatisticsEngineFactory {
    type Engine = StatisticsEngine;

    fn create_engine(&self, thread_index: usize) -> Result<StatisticsEngine, EngineError> {
        Ok(StatisticsEngine {
            thread_index,
            intervals: Vec::new(),
            local: SimulationStatistics::default(),
            sink: Arc::clone(&self.sink),
            next_event_id: 0,
            started: Instant::now(),
        })
    }
}
