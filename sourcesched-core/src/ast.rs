//! Syntax tree of a simulation script
//!
//! Values are already converted to internal units by the parser; checking
//! that they make sense together is the analyzer's job.

use crate::acceptance::SkipPolicy;
use crate::diagnostics::Span;
use crate::model::{DirectionModel, EnergyModel, ParticleKind, PositionModel, TimePolicy};
use crate::partition::PartitionStrategy;
use crate::source::SourceType;
use crate::thread_manager::SourceOrdering;
use crate::timing::RunInterval;
use glam::DVec3;

/// A parsed script: global settings and source blocks, in file order
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub settings: Vec<SettingDecl>,
    pub sources: Vec<SourceDecl>,
}

/// `key = value` line outside of any block
#[derive(Debug, Clone)]
pub struct SettingDecl {
    pub setting: Setting,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Seed(u64),
    Threads(usize),
    RunTimingIntervals(Vec<RunInterval>),
    Ordering(SourceOrdering),
    Partition(PartitionStrategy),
    MaxBatch(i64),       // checked against the engine bound by the analyzer
    MaxRedraws(u64),
    Visualization(bool),
}

impl Setting {
    /// Script key of this setting
    pub fn key(&self) -> &'static str {
        match self {
            Setting::Seed(_) => "seed",
            Setting::Threads(_) => "threads",
            Setting::RunTimingIntervals(_) => "run_timing_intervals",
            Setting::Ordering(_) => "ordering",
            Setting::Partition(_) => "partition",
            Setting::MaxBatch(_) => "max_batch",
            Setting::MaxRedraws(_) => "max_redraws",
            Setting::Visualization(_) => "visualization",
        }
    }
}

/// `source <Type> [name] { ... }`
#[derive(Debug, Clone)]
pub struct SourceDecl {
    pub source_type: SourceType,
    pub name: Option<String>, // None: generated at build time
    pub properties: Vec<PropertyDecl>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub property: Property,
    pub span: Option<Span>,
}

/// One `key = value` line inside a source block
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Particle(ParticleKind),
    Activity(f64),
    PerRun(u64),
    Energy(EnergyModel),
    Direction(DirectionModel),
    Position(PositionModel),
    Time(TimePolicy),
    AcceptanceEnabled(bool),
    AcceptanceFraction(f64),
    AcceptanceAxis(DVec3),
    AcceptanceSkipPolicy(SkipPolicy),
}

impl Property {
    pub fn key(&self) -> &'static str {
        match self {
            Property::Particle(_) => "particle",
            Property::Activity(_) => "activity",
            Property::PerRun(_) => "n",
            Property::Energy(_) => "energy",
            Property::Direction(_) => "direction",
            Property::Position(_) => "position",
            Property::Time(_) => "time",
            Property::AcceptanceEnabled(_) => "acceptance_angle.enabled",
            Property::AcceptanceFraction(_) => "acceptance_angle.fraction",
            Property::AcceptanceAxis(_) => "acceptance_angle.axis",
            Property::AcceptanceSkipPolicy(_) => "acceptance_angle.skip_policy",
        }
    }
}
