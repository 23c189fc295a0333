//! Acceptance angle filtering
//!
//! The acceptance region is a cone around `axis` whose solid angle is
//! `solid_angle_fraction` of the full sphere: `cos(half_angle) = 1 - 2f`.
//! For an isotropic direction model exactly a fraction `f` of the draws lands
//! inside the cone.

use glam::DVec3;
use std::fmt;
use std::str::FromStr;

/// What happens to a draw that falls outside the acceptance cone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// Rejected draws are discarded and redrawn, they do not count as emitted
    #[default]
    SkipEvents,
    /// Rejected draws are delivered with zero kinetic energy
    ZeroEnergy,
}

impl FromStr for SkipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SkipEvents" => Ok(SkipPolicy::SkipEvents),
            "ZeroEnergy" => Ok(SkipPolicy::ZeroEnergy),
            other => Err(format!(
                "unknown skip policy '{}' (expected SkipEvents or ZeroEnergy)",
                other
            )),
        }
    }
}

impl fmt::Display for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipPolicy::SkipEvents => write!(f, "SkipEvents"),
            SkipPolicy::ZeroEnergy => write!(f, "ZeroEnergy"),
        }
    }
}

/// Per-source filter restricting directions to a solid-angle cone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceAnglePolicy {
    pub enabled: bool,
    pub solid_angle_fraction: f64,
    pub axis: DVec3,
    pub skip_policy: SkipPolicy,
}

impl Default for AcceptanceAnglePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            solid_angle_fraction: 1.0,
            axis: DVec3::Z,
            skip_policy: SkipPolicy::SkipEvents,
        }
    }
}

impl AcceptanceAnglePolicy {
    pub fn new(solid_angle_fraction: f64, skip_policy: SkipPolicy) -> Self {
        Self {
            enabled: true,
            solid_angle_fraction,
            skip_policy,
            ..Self::default()
        }
    }

    pub fn with_axis(mut self, axis: DVec3) -> Self {
        self.axis = axis;
        self
    }

    /// Reason the policy cannot be applied, if any
    pub fn check(&self) -> Option<String> {
        if !(self.solid_angle_fraction > 0.0 && self.solid_angle_fraction <= 1.0) {
            return Some(format!(
                "acceptance solid angle fraction must be in (0, 1], got {}",
                self.solid_angle_fraction
            ));
        }
        if self.axis.length_squared() == 0.0 || !self.axis.is_finite() {
            return Some("acceptance axis must be a finite non-null vector".to_string());
        }
        None
    }

    /// Cosine of the cone half angle
    pub fn cos_half_angle(&self) -> f64 {
        1.0 - 2.0 * self.solid_angle_fraction
    }

    /// Stateless test of a candidate direction. A disabled policy accepts everything.
    pub fn accept(&self, direction: DVec3) -> bool {
        if !self.enabled || self.solid_angle_fraction >= 1.0 {
            return true;
        }
        let (Some(axis), Some(direction)) = (self.axis.try_normalize(), direction.try_normalize())
        else {
            return false;
        };
        axis.dot(direction) >= self.cos_half_angle()
    }
}

impl fmt::Display for AcceptanceAnglePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "disabled");
        }
        write!(
            f,
            "fraction {} axis ({}, {}, {}) {}",
            self.solid_angle_fraction, self.axis.x, self.axis.y, self.axis.z, self.skip_policy
        )
    }
}
