//! Units used by the simulation scripts
//!
//! Internal units: seconds, MeV, millimetres, becquerel (events per second).

pub const SECOND: f64 = 1.0;
pub const MILLISECOND: f64 = 1e-3;
pub const MICROSECOND: f64 = 1e-6;
pub const NANOSECOND: f64 = 1e-9;
pub const MINUTE: f64 = 60.0;

pub const MEV: f64 = 1.0;
pub const EV: f64 = 1e-6;
pub const KEV: f64 = 1e-3;
pub const GEV: f64 = 1e3;

pub const MM: f64 = 1.0;
pub const CM: f64 = 10.0;
pub const M: f64 = 1000.0;

pub const BQ: f64 = 1.0;
pub const KBQ: f64 = 1e3;
pub const MBQ: f64 = 1e6;
pub const GBQ: f64 = 1e9;

/// Physical dimension of a quantity written in a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Time,
    Energy,
    Length,
    Activity,
}

impl Dimension {
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Time => "time",
            Dimension::Energy => "energy",
            Dimension::Length => "length",
            Dimension::Activity => "activity",
        }
    }
}

/// Scale factor of a unit symbol, if it belongs to the given dimension
pub fn unit_factor(symbol: &str, dimension: Dimension) -> Option<f64> {
    let factor = match (dimension, symbol) {
        (Dimension::Time, "s") => SECOND,
        (Dimension::Time, "ms") => MILLISECOND,
        (Dimension::Time, "us") => MICROSECOND,
        (Dimension::Time, "ns") => NANOSECOND,
        (Dimension::Time, "min") => MINUTE,
        (Dimension::Energy, "eV") => EV,
        (Dimension::Energy, "keV") => KEV,
        (Dimension::Energy, "MeV") => MEV,
        (Dimension::Energy, "GeV") => GEV,
        (Dimension::Length, "mm") => MM,
        (Dimension::Length, "cm") => CM,
        (Dimension::Length, "m") => M,
        (Dimension::Activity, "Bq") => BQ,
        (Dimension::Activity, "kBq") => KBQ,
        (Dimension::Activity, "MBq") => MBQ,
        (Dimension::Activity, "GBq") => GBQ,
        _ => return None,
    };
    Some(factor)
}
