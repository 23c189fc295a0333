//! Error taxonomy for source scheduling
//!
//! Every fatal condition carries the offending configuration value so it can
//! be reported as-is. `SourceExhausted` is the one variant that is not a
//! failure: it tells the transport engine to stop asking for primaries.

use crate::timing::TimingError;
use thiserror::Error;

/// Failure reported by a transport engine implementation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised by the registry, the source instances and the managers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("invalid run timing: {0}")]
    InvalidTiming(#[from] TimingError),

    #[error("a source named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("the source '{name}' is not in the current list of sources: [{}]", known.join(", "))]
    UnknownSource { name: String, known: Vec<String> },

    #[error("no source: no particle will be generated")]
    NoSource,

    #[error("invalid source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("source '{name}' cannot be modified once the simulation is initialized")]
    RegistryFrozen { name: String },

    #[error("source '{name}' has no primary left to emit")]
    SourceExhausted { name: String },

    #[error(
        "source '{name}': no accepted direction after {redraws} redraws \
         (solid angle fraction {solid_angle_fraction})"
    )]
    AcceptanceExhausted {
        name: String,
        redraws: u64,
        solid_angle_fraction: f64,
    },

    #[error("the source manager has no run timing plan, call initialize() first")]
    NotInitialized,

    #[error("the source manager has not been built, call build() first")]
    NotBuilt,

    #[error("invalid manager configuration: {0}")]
    InvalidConfig(String),

    #[error("worker thread {thread_index} panicked")]
    WorkerPanicked { thread_index: usize },

    #[error("transport engine failure: {0}")]
    Engine(#[from] EngineError),
}

impl SourceError {
    /// True for the expected end-of-schedule signal, false for real failures
    pub fn is_termination(&self) -> bool {
        matches!(self, SourceError::SourceExhausted { .. })
    }
}
