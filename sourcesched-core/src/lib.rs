pub mod acceptance;
pub mod analyzer;
pub mod ast;
pub mod batch;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod instance;
pub mod manager;
pub mod model;
pub mod parser;
pub mod partition;
pub mod registry;
pub mod rng;
pub mod runtime;
pub mod source;
pub mod stats;
pub mod thread_manager;
pub mod timing;
pub mod units;

pub use acceptance::{AcceptanceAnglePolicy, SkipPolicy};
pub use analyzer::analyze_script;
pub use batch::{split_events, Batch, BatchQueue, SplitEvents, MAX_BATCH_EVENTS};
pub use diagnostics::{format_parse_error, Diagnostic, DiagnosticSeverity, Diagnostics, Span};
pub use engine::{
    drive_events, BatchReport, EngineFactory, SourceHandle, TransportEngine, VisualizationOptions,
};
pub use error::{EngineError, SourceError};
pub use instance::{SourceCounters, SourceInstance, DEFAULT_MAX_REDRAWS};
pub use manager::{
    AbortHandle, ManagerConfig, RunSummary, SourceManager, ThreadSummary, DEFAULT_SEED,
};
pub use model::{DirectionModel, EnergyModel, ParticleKind, PositionModel, Primary, TimePolicy};
pub use parser::{parse_script, ParseError};
pub use partition::{PartitionStrategy, ThreadPartition};
pub use registry::SourceRegistry;
pub use runtime::{
    build_simulation_context, build_simulation_context_from_source, manager_config, run_script,
    ConfigOverrides, RunError, RunOutcome, SimulationContext,
};
pub use source::{EmissionCount, SourceDefinition, SourceType};
pub use stats::{SimulationStatistics, StatisticsEngine, StatisticsEngineFactory};
pub use thread_manager::{PrimaryGenerator, SourceOrdering, ThreadSettings, ThreadSourceManager};
pub use timing::{RunInterval, RunTimingPlan, TimingError};
