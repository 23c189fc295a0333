//! Splitting the schedule of a source across worker threads
//!
//! Whatever the strategy, summing the share of every thread gives back the
//! single-thread target exactly.

use std::fmt;
use std::str::FromStr;

/// How work is spread over the thread managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    /// Every thread takes part in every interval; an interval target `T` is
    /// split as `T / k` per thread, the first `T % k` threads taking one more.
    #[default]
    FractionalShare,
    /// Each thread owns a disjoint contiguous range of intervals
    ContiguousIntervals,
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "share" => Ok(PartitionStrategy::FractionalShare),
            "intervals" => Ok(PartitionStrategy::ContiguousIntervals),
            other => Err(format!(
                "unknown partition '{}' (expected share or intervals)",
                other
            )),
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionStrategy::FractionalShare => write!(f, "share"),
            PartitionStrategy::ContiguousIntervals => write!(f, "intervals"),
        }
    }
}

/// The slice of the schedule owned by one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPartition {
    pub thread_index: usize,
    pub thread_count: usize,
    pub strategy: PartitionStrategy,
}

impl ThreadPartition {
    /// The whole schedule on a single thread
    pub fn single() -> Self {
        Self {
            thread_index: 0,
            thread_count: 1,
            strategy: PartitionStrategy::default(),
        }
    }

    pub fn new(thread_index: usize, thread_count: usize, strategy: PartitionStrategy) -> Self {
        Self {
            thread_index,
            thread_count: thread_count.max(1),
            strategy,
        }
    }

    /// Range of interval indices owned by this thread under `ContiguousIntervals`
    pub fn interval_range(&self, interval_count: usize) -> std::ops::Range<usize> {
        let k = self.thread_count;
        let t = self.thread_index.min(k);
        let begin = t * interval_count / k;
        let end = (t + 1).min(k) * interval_count / k;
        begin..end
    }

    /// This thread's part of `total` primaries in the given interval
    pub fn share(&self, interval_index: usize, interval_count: usize, total: u64) -> u64 {
        match self.strategy {
            PartitionStrategy::FractionalShare => {
                let k = self.thread_count as u64;
                let t = self.thread_index as u64;
                if t >= k {
                    return 0;
                }
                total / k + u64::from(t < total % k)
            }
            PartitionStrategy::ContiguousIntervals => {
                if self.interval_range(interval_count).contains(&interval_index) {
                    total
                } else {
                    0
                }
            }
        }
    }
}
