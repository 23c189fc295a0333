//! Run timing plan
//!
//! A plan is the ordered list of run intervals of a simulation. Each interval
//! becomes one run of the transport engine. Times are in seconds.

use std::fmt;
use thiserror::Error;

/// Reasons a list of intervals is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingError {
    #[error("the run timing plan has no interval")]
    Empty,

    #[error("run interval {index} [{start}, {end}] has zero or negative length")]
    NonPositiveLength { index: usize, start: f64, end: f64 },

    #[error("run interval {index} [{start}, {end}] has a non finite bound")]
    NotFinite { index: usize, start: f64, end: f64 },

    #[error("run interval {index} starts at {start}, before interval {previous} (start {previous_start})")]
    Unsorted {
        index: usize,
        start: f64,
        previous: usize,
        previous_start: f64,
    },

    #[error("run interval {index} [{start}, {end}] overlaps interval {previous} which ends at {previous_end}")]
    Overlap {
        index: usize,
        start: f64,
        end: f64,
        previous: usize,
        previous_end: f64,
    },
}

/// A contiguous span of simulated time `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunInterval {
    pub start: f64,
    pub end: f64,
}

impl RunInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `time` falls in `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Time at fraction `u` of the interval, `u` in `[0, 1)`. Rounding never
    /// lands on `end`.
    pub fn time_at(&self, u: f64) -> f64 {
        let time = self.start + self.duration() * u;
        if time < self.end {
            time
        } else {
            largest_below(self.end).max(self.start)
        }
    }
}

/// Largest finite `f64` strictly below `x`
fn largest_below(x: f64) -> f64 {
    let bits = x.to_bits();
    if x == 0.0 {
        -f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

impl From<(f64, f64)> for RunInterval {
    fn from((start, end): (f64, f64)) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for RunInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} s, {} s]", self.start, self.end)
    }
}

/// Validated, immutable sequence of run intervals
///
/// Intervals are sorted by start and pairwise non-overlapping. Touching
/// endpoints (`[0, 10]` then `[10, 20]`) are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTimingPlan {
    intervals: Vec<RunInterval>,
}

impl RunTimingPlan {
    /// Validate and wrap a list of intervals
    pub fn new(intervals: Vec<RunInterval>) -> Result<Self, TimingError> {
        if intervals.is_empty() {
            return Err(TimingError::Empty);
        }

        for (index, interval) in intervals.iter().enumerate() {
            if !interval.start.is_finite() || !interval.end.is_finite() {
                return Err(TimingError::NotFinite {
                    index,
                    start: interval.start,
                    end: interval.end,
                });
            }
            if interval.end <= interval.start {
                return Err(TimingError::NonPositiveLength {
                    index,
                    start: interval.start,
                    end: interval.end,
                });
            }
        }

        for (index, pair) in intervals.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.start < previous.start {
                return Err(TimingError::Unsorted {
                    index: index + 1,
                    start: current.start,
                    previous: index,
                    previous_start: previous.start,
                });
            }
            if current.start < previous.end {
                return Err(TimingError::Overlap {
                    index: index + 1,
                    start: current.start,
                    end: current.end,
                    previous: index,
                    previous_end: previous.end,
                });
            }
        }

        Ok(Self { intervals })
    }

    /// Convenience constructor from `(start, end)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, TimingError> {
        Self::new(pairs.iter().copied().map(RunInterval::from).collect())
    }

    pub fn intervals(&self) -> &[RunInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RunInterval> {
        self.intervals.get(index)
    }

    /// Total simulated time covered by the plan (gaps excluded)
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(RunInterval::duration).sum()
    }
}
