//! Contract with the transport engine
//!
//! The engine itself (geometry, physics, tracking) lives outside this crate.
//! It only has to accept source handles, prepare a run and transport a
//! bounded number of events, pulling each primary from the thread manager.

use crate::error::{EngineError, SourceError};
use crate::model::Primary;
use crate::source::{SourceDefinition, SourceType};
use crate::thread_manager::PrimaryGenerator;
use crate::timing::RunTimingPlan;

/// Options passed through to the engine when a run is initialized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualizationOptions {
    pub enabled: bool,
    pub commands: Vec<String>,
}

/// Engine-side reference to a registered source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    pub index: usize,
    pub name: String,
    pub source_type: SourceType,
}

/// What one `run_batch` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub requested: i32,
    pub transported: u64,
    /// The generator signalled the end of its schedule before the batch was full
    pub exhausted: bool,
}

/// One engine instance, driven by a single worker thread
pub trait TransportEngine {
    /// Engine-side handle for a source
    fn create_source_handle(
        &mut self,
        index: usize,
        source: &SourceDefinition,
    ) -> Result<SourceHandle, EngineError> {
        Ok(SourceHandle {
            index,
            name: source.name.clone(),
            source_type: source.source_type,
        })
    }

    /// Attach a source handle to the thread's source manager
    fn add_source(&mut self, handle: SourceHandle) -> Result<(), EngineError>;

    fn initialize_run(
        &mut self,
        plan: &RunTimingPlan,
        visualization: &VisualizationOptions,
    ) -> Result<(), EngineError>;

    /// Transport `event_count` events, blocking until done
    fn run_batch(
        &mut self,
        generator: &mut dyn PrimaryGenerator,
        event_count: i32,
    ) -> Result<BatchReport, SourceError>;

    /// Called once by the worker after its last batch
    fn end_of_simulation(&mut self) {}
}

/// Creates one engine per worker thread, on that thread
pub trait EngineFactory: Sync {
    type Engine: TransportEngine;

    fn create_engine(&self, thread_index: usize) -> Result<Self::Engine, EngineError>;
}

/// Standard event loop: pull primaries until the count is reached or the
/// generator reports the end of its schedule
pub fn drive_events<F>(
    generator: &mut dyn PrimaryGenerator,
    first_event_id: u64,
    event_count: i32,
    mut on_primary: F,
) -> Result<BatchReport, SourceError>
where
    F: FnMut(&Primary),
{
    let mut report = BatchReport {
        requested: event_count,
        ..BatchReport::default()
    };

    for k in 0..event_count.max(0) as u64 {
        match generator.generate_primary(first_event_id + k) {
            Ok(primary) => {
                on_primary(&primary);
                report.transported += 1;
            }
            Err(e) if e.is_termination() => {
                report.exhausted = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
