//! Source definitions
//!
//! A definition is the immutable description of one source. It is filled in
//! through the registry handle before the simulation is initialized and
//! shared read-only by every thread afterwards.

use crate::acceptance::AcceptanceAnglePolicy;
use crate::error::SourceError;
use crate::model::{DirectionModel, EnergyModel, ParticleKind, PositionModel, TimePolicy};
use crate::timing::{RunInterval, RunTimingPlan};
use glam::DVec3;
use std::fmt;
use std::str::FromStr;

/// Kind of source, selects which options are legal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Generic,
    PencilBeam,
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Generic" => Ok(SourceType::Generic),
            "PencilBeam" => Ok(SourceType::PencilBeam),
            other => Err(format!("unknown source type '{}'", other)),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Generic => write!(f, "Generic"),
            SourceType::PencilBeam => write!(f, "PencilBeam"),
        }
    }
}

/// How many primaries a source emits in each run interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmissionCount {
    /// Events per second; the interval target is `round(activity * duration)`
    Activity(f64),
    /// Fixed number of primaries in every run interval
    PerRun(u64),
}

impl fmt::Display for EmissionCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmissionCount::Activity(activity) => write!(f, "activity {} Bq", activity),
            EmissionCount::PerRun(n) => write!(f, "n {}", n),
        }
    }
}

/// Description of one source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDefinition {
    pub name: String,
    pub source_type: SourceType,
    pub particle: ParticleKind,
    pub energy: EnergyModel,
    pub direction: DirectionModel,
    pub position: PositionModel,
    pub count: EmissionCount,
    pub acceptance_angle: Option<AcceptanceAnglePolicy>,
    pub time_policy: TimePolicy,
}

impl SourceDefinition {
    /// A definition with neutral defaults. The activity starts at zero and must
    /// be set before the simulation is initialized.
    pub fn new(source_type: SourceType, name: impl Into<String>) -> Self {
        let (direction, position) = match source_type {
            SourceType::Generic => (DirectionModel::Isotropic, PositionModel::Point { center: DVec3::ZERO }),
            SourceType::PencilBeam => (
                DirectionModel::Momentum { direction: DVec3::Z },
                PositionModel::Disc { center: DVec3::ZERO, radius: 0.0 },
            ),
        };
        Self {
            name: name.into(),
            source_type,
            particle: ParticleKind::Gamma,
            energy: EnergyModel::Mono { energy: 1.0 },
            direction,
            position,
            count: EmissionCount::Activity(0.0),
            acceptance_angle: None,
            time_policy: TimePolicy::IntervalStart,
        }
    }

    pub fn activity(&self) -> Option<f64> {
        match self.count {
            EmissionCount::Activity(activity) => Some(activity),
            EmissionCount::PerRun(_) => None,
        }
    }

    pub fn set_activity(&mut self, activity: f64) -> &mut Self {
        self.count = EmissionCount::Activity(activity);
        self
    }

    pub fn set_per_run(&mut self, n: u64) -> &mut Self {
        self.count = EmissionCount::PerRun(n);
        self
    }

    pub fn set_acceptance_angle(&mut self, policy: AcceptanceAnglePolicy) -> &mut Self {
        self.acceptance_angle = Some(policy);
        self
    }

    /// Acceptance policy, only when enabled
    pub fn active_acceptance(&self) -> Option<&AcceptanceAnglePolicy> {
        self.acceptance_angle.as_ref().filter(|policy| policy.enabled)
    }

    /// Number of primaries this source must emit in the given interval, or
    /// `None` when it does not fit in a `u64`
    pub fn checked_interval_target(&self, interval: &RunInterval) -> Option<u64> {
        match self.count {
            EmissionCount::Activity(activity) => {
                let target = (activity * interval.duration()).round();
                // 2^64, the first value past u64::MAX
                (target >= 0.0 && target < 18_446_744_073_709_551_616.0).then_some(target as u64)
            }
            EmissionCount::PerRun(n) => Some(n),
        }
    }

    /// Number of primaries this source must emit in the given interval.
    /// Saturates, `expected_total` reports targets that do not fit.
    pub fn interval_target(&self, interval: &RunInterval) -> u64 {
        self.checked_interval_target(interval).unwrap_or(u64::MAX)
    }

    /// Expected number of primaries over the whole plan
    pub fn expected_total(&self, plan: &RunTimingPlan) -> Result<u64, SourceError> {
        plan.intervals()
            .iter()
            .try_fold(0u64, |total, interval| {
                total.checked_add(self.checked_interval_target(interval)?)
            })
            .ok_or_else(|| SourceError::InvalidSource {
                name: self.name.clone(),
                reason: format!(
                    "{} over {} run(s) needs more than {} primaries",
                    self.count,
                    plan.len(),
                    u64::MAX
                ),
            })
    }

    /// Check every parameter, reporting the first offending value
    pub fn validate(&self) -> Result<(), SourceError> {
        let invalid = |reason: String| SourceError::InvalidSource {
            name: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("the source name is empty".to_string()));
        }
        if let EmissionCount::Activity(activity) = self.count {
            if !(activity > 0.0 && activity.is_finite()) {
                return Err(invalid(format!(
                    "activity must be finite and > 0 events/s, got {}",
                    activity
                )));
            }
        }
        if let Some(reason) = self.energy.check() {
            return Err(invalid(reason));
        }
        if let Some(reason) = self.direction.check() {
            return Err(invalid(reason));
        }
        if let Some(reason) = self.position.check() {
            return Err(invalid(reason));
        }
        if let Some(policy) = self.active_acceptance() {
            if self.source_type == SourceType::PencilBeam {
                return Err(invalid(
                    "acceptance angle cannot be used with a PencilBeam source".to_string(),
                ));
            }
            if let Some(reason) = policy.check() {
                return Err(invalid(reason));
            }
        }
        Ok(())
    }
}

impl fmt::Display for SourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.source_type)?;
        writeln!(f, "  particle   {}", self.particle)?;
        writeln!(f, "  {}", self.count)?;
        writeln!(f, "  energy     {}", self.energy)?;
        writeln!(f, "  direction  {}", self.direction)?;
        write!(f, "  position   {}", self.position)?;
        if let Some(policy) = &self.acceptance_angle {
            write!(f, "\n  acceptance {}", policy)?;
        }
        Ok(())
    }
}
