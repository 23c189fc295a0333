//! Emission models and the primary particle
//!
//! Each model is a closed set of variants chosen when a source is defined.
//! Units: energy in MeV, lengths in mm, time in seconds.

use crate::rng::Stream;
use glam::DVec3;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::fmt;

/// Kind of particle a source emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    Gamma,
    Electron,
    Positron,
    Proton,
    Neutron,
    Alpha,
    Ion { z: u32, a: u32 },
}

impl ParticleKind {
    /// Parse the usual particle names (`gamma`, `e-`, `e+`, `proton`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "gamma" => ParticleKind::Gamma,
            "e-" => ParticleKind::Electron,
            "e+" => ParticleKind::Positron,
            "proton" => ParticleKind::Proton,
            "neutron" => ParticleKind::Neutron,
            "alpha" => ParticleKind::Alpha,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticleKind::Gamma => write!(f, "gamma"),
            ParticleKind::Electron => write!(f, "e-"),
            ParticleKind::Positron => write!(f, "e+"),
            ParticleKind::Proton => write!(f, "proton"),
            ParticleKind::Neutron => write!(f, "neutron"),
            ParticleKind::Alpha => write!(f, "alpha"),
            ParticleKind::Ion { z, a } => write!(f, "ion {} {}", z, a),
        }
    }
}

/// Kinetic energy distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyModel {
    Mono { energy: f64 },
    Gauss { mean: f64, sigma: f64 },
    Uniform { min: f64, max: f64 },
}

impl EnergyModel {
    /// Reason the parameters cannot be sampled, if any
    pub fn check(&self) -> Option<String> {
        match *self {
            EnergyModel::Mono { energy } if !(energy >= 0.0 && energy.is_finite()) => {
                Some(format!("mono energy must be finite and >= 0, got {}", energy))
            }
            EnergyModel::Gauss { mean, sigma } if !(sigma >= 0.0 && sigma.is_finite() && mean.is_finite()) => {
                Some(format!("gauss energy needs a finite mean and sigma >= 0, got {} / {}", mean, sigma))
            }
            EnergyModel::Uniform { min, max } if !(min >= 0.0 && max > min && max.is_finite()) => {
                Some(format!("uniform energy needs 0 <= min < max, got [{}, {}]", min, max))
            }
            _ => None,
        }
    }
}

impl fmt::Display for EnergyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyModel::Mono { energy } => write!(f, "mono {} MeV", energy),
            EnergyModel::Gauss { mean, sigma } => write!(f, "gauss {} MeV sigma {} MeV", mean, sigma),
            EnergyModel::Uniform { min, max } => write!(f, "uniform {} MeV to {} MeV", min, max),
        }
    }
}

/// Emission direction distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionModel {
    Isotropic,
    /// Fixed direction (normalized when sampled)
    Momentum { direction: DVec3 },
    /// Every primary points from its emission position toward `point`
    Focused { point: DVec3 },
}

impl DirectionModel {
    pub fn check(&self) -> Option<String> {
        match self {
            DirectionModel::Momentum { direction } if direction.length_squared() == 0.0 => {
                Some("momentum direction must not be the null vector".to_string())
            }
            _ => None,
        }
    }
}

impl fmt::Display for DirectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionModel::Isotropic => write!(f, "iso"),
            DirectionModel::Momentum { direction } => {
                write!(f, "momentum ({}, {}, {})", direction.x, direction.y, direction.z)
            }
            DirectionModel::Focused { point } => {
                write!(f, "focused ({}, {}, {}) mm", point.x, point.y, point.z)
            }
        }
    }
}

/// Emission position distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionModel {
    Point { center: DVec3 },
    /// Uniform in the volume of a sphere
    Sphere { center: DVec3, radius: f64 },
    /// Uniform in an axis-aligned box of full side lengths `size`
    Box { center: DVec3, size: DVec3 },
    /// Uniform on a disc in the xy plane
    Disc { center: DVec3, radius: f64 },
}

impl PositionModel {
    pub fn check(&self) -> Option<String> {
        match *self {
            PositionModel::Sphere { radius, .. } | PositionModel::Disc { radius, .. }
                if !(radius >= 0.0 && radius.is_finite()) =>
            {
                Some(format!("radius must be finite and >= 0, got {}", radius))
            }
            PositionModel::Box { size, .. } if size.min_element() < 0.0 || !size.is_finite() => {
                Some(format!("box size must be finite and >= 0, got {:?}", size))
            }
            _ => None,
        }
    }
}

impl fmt::Display for PositionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionModel::Point { center } => {
                write!(f, "point ({}, {}, {}) mm", center.x, center.y, center.z)
            }
            PositionModel::Sphere { center, radius } => write!(
                f,
                "sphere {} mm at ({}, {}, {})",
                radius, center.x, center.y, center.z
            ),
            PositionModel::Box { center, size } => write!(
                f,
                "box ({}, {}, {}) mm at ({}, {}, {})",
                size.x, size.y, size.z, center.x, center.y, center.z
            ),
            PositionModel::Disc { center, radius } => write!(
                f,
                "disc {} mm at ({}, {}, {})",
                radius, center.x, center.y, center.z
            ),
        }
    }
}

/// Time stamp given to each emitted primary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePolicy {
    /// Every primary carries the start time of its run interval
    #[default]
    IntervalStart,
    /// Uniform draw in `[start, end)` of the run interval
    Uniform,
}

/// One particle handed to the transport engine to begin tracking
#[derive(Debug, Clone, PartialEq)]
pub struct Primary {
    pub event_id: u64,
    pub source_index: usize,
    pub particle: ParticleKind,
    pub energy: f64,
    pub position: DVec3,
    pub direction: DVec3,
    pub time: f64,
    /// Index of the run interval this primary belongs to
    pub interval_index: usize,
}

/// Energy model with its distribution prepared once
#[derive(Debug, Clone)]
pub(crate) enum EnergySampler {
    Mono(f64),
    Gauss(Normal<f64>),
    Uniform { min: f64, max: f64 },
}

impl EnergySampler {
    pub(crate) fn new(model: &EnergyModel) -> Result<Self, String> {
        if let Some(reason) = model.check() {
            return Err(reason);
        }
        let sampler = match *model {
            EnergyModel::Mono { energy } => EnergySampler::Mono(energy),
            EnergyModel::Gauss { mean, sigma } => EnergySampler::Gauss(
                Normal::new(mean, sigma).map_err(|e| format!("gauss energy: {}", e))?,
            ),
            EnergyModel::Uniform { min, max } => EnergySampler::Uniform { min, max },
        };
        Ok(sampler)
    }

    pub(crate) fn sample(&self, rng: &mut Stream) -> f64 {
        match self {
            EnergySampler::Mono(energy) => *energy,
            // Negative tails are clamped, a kinetic energy cannot be negative
            EnergySampler::Gauss(normal) => normal.sample(rng).max(0.0),
            EnergySampler::Uniform { min, max } => min + (max - min) * rng.gen::<f64>(),
        }
    }
}

/// Unit vector uniformly distributed on the sphere
pub(crate) fn isotropic_direction(rng: &mut Stream) -> DVec3 {
    let cos_theta: f64 = 2.0 * rng.gen::<f64>() - 1.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.gen::<f64>();
    DVec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

pub(crate) fn sample_position(model: &PositionModel, rng: &mut Stream) -> DVec3 {
    match *model {
        PositionModel::Point { center } => center,
        PositionModel::Sphere { center, radius } => {
            let r = radius * rng.gen::<f64>().cbrt();
            center + isotropic_direction(rng) * r
        }
        PositionModel::Box { center, size } => {
            let u = DVec3::new(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
            center + (u - DVec3::splat(0.5)) * size
        }
        PositionModel::Disc { center, radius } => {
            let r = radius * rng.gen::<f64>().sqrt();
            let phi = 2.0 * PI * rng.gen::<f64>();
            center + DVec3::new(r * phi.cos(), r * phi.sin(), 0.0)
        }
    }
}

pub(crate) fn sample_direction(model: &DirectionModel, position: DVec3, rng: &mut Stream) -> DVec3 {
    match *model {
        DirectionModel::Isotropic => isotropic_direction(rng),
        DirectionModel::Momentum { direction } => direction.normalize(),
        DirectionModel::Focused { point } => {
            // A primary emitted exactly at the focal point has no preferred axis
            (point - position).try_normalize().unwrap_or_else(|| isotropic_direction(rng))
        }
    }
}
