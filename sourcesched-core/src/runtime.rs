use crate::analyzer::{analyze_script, source_definition};
use crate::ast::{Script, Setting};
use crate::diagnostics::Diagnostics;
use crate::error::SourceError;
use crate::manager::{ManagerConfig, RunSummary, SourceManager};
use crate::parser::{parse_script, ParseError};
use crate::source::SourceDefinition;
use crate::stats::{SimulationStatistics, StatisticsEngineFactory};
use crate::timing::RunInterval;
use thiserror::Error;

/// Why a script could not be run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Analysis(Diagnostics),

    #[error("{0}")]
    Source(#[from] SourceError),
}

/// Command-line values taking precedence over the script settings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigOverrides {
    pub threads: Option<usize>,
    pub seed: Option<u64>,
}

/// A source manager built from a script, initialized and ready to start
#[derive(Debug)]
pub struct SimulationContext {
    pub manager: SourceManager,
    /// Warnings left by the analysis
    pub diagnostics: Diagnostics,
}

/// What `run_script` produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub statistics: SimulationStatistics,
    pub diagnostics: Diagnostics,
}

/// Manager configuration described by the script settings (last value wins)
pub fn manager_config(script: &Script, overrides: ConfigOverrides) -> ManagerConfig {
    let mut config = ManagerConfig::default();
    for decl in &script.settings {
        match &decl.setting {
            Setting::Seed(seed) => config.seed = *seed,
            Setting::Threads(threads) => config.threads = *threads,
            Setting::Ordering(ordering) => config.ordering = *ordering,
            Setting::Partition(partition) => config.partition = *partition,
            Setting::MaxBatch(n) => {
                config.max_batch_events = i32::try_from(*n).unwrap_or(i32::MAX);
            }
            Setting::MaxRedraws(n) => config.max_redraws = *n,
            Setting::Visualization(enabled) => config.visualization.enabled = *enabled,
            Setting::RunTimingIntervals(_) => {}
        }
    }
    if let Some(threads) = overrides.threads {
        config.threads = threads;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    config
}

/// Analyze a script, then register its sources, initialize and build the manager
pub fn build_simulation_context(
    script: &Script,
    overrides: ConfigOverrides,
) -> Result<SimulationContext, RunError> {
    let diagnostics = analyze_script(script);
    if diagnostics.has_errors() {
        return Err(RunError::Analysis(diagnostics));
    }

    let mut manager = SourceManager::new(manager_config(script, overrides));
    for decl in &script.sources {
        let definition = source_definition(decl);
        let slot = manager.add_source(decl.source_type, &definition.name)?;
        // Keep the name the registry settled on
        *slot = SourceDefinition {
            name: std::mem::take(&mut slot.name),
            ..definition
        };
    }

    let intervals: Vec<RunInterval> = script
        .settings
        .iter()
        .rev()
        .find_map(|decl| match &decl.setting {
            Setting::RunTimingIntervals(intervals) => Some(intervals.clone()),
            _ => None,
        })
        .unwrap_or_default();
    manager.initialize(intervals)?;
    manager.build()?;

    for warning in diagnostics.warnings() {
        log::warn!(target: "source", "{}", warning.message);
    }

    Ok(SimulationContext {
        manager,
        diagnostics,
    })
}

/// Parse, analyze and build from script text
pub fn build_simulation_context_from_source(
    source: &str,
    overrides: ConfigOverrides,
) -> Result<SimulationContext, RunError> {
    let script = parse_script(source)?;
    build_simulation_context(&script, overrides)
}

/// Main entry point: parse a script and run it through the statistics engine
pub fn run_script(source: &str, overrides: ConfigOverrides) -> Result<RunOutcome, RunError> {
    let mut context = build_simulation_context_from_source(source, overrides)?;
    let factory = StatisticsEngineFactory::new();
    let summary = context.manager.start(&factory)?;

    Ok(RunOutcome {
        summary,
        statistics: factory.statistics(),
        diagnostics: context.diagnostics,
    })
}
