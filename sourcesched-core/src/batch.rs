//! Batch planning
//!
//! The engine's "run N events" primitive takes a signed 32-bit count. Every
//! interval of a thread's schedule is cut into consecutive sub-batches no
//! larger than the configured bound, so nothing is ever truncated. Sub-batches
//! are produced one at a time as the run advances.

use crate::thread_manager::ThreadSourceManager;

/// Largest event count the engine accepts in one request
pub const MAX_BATCH_EVENTS: i32 = i32::MAX;

/// One bounded request to the transport engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub interval_index: usize,
    /// Position of this batch among the sub-batches of its interval
    pub part: u64,
    pub events: i32,
}

/// Sizes of the consecutive sub-batches covering `total` events
pub fn split_events(total: u64, max_batch: i32) -> SplitEvents {
    SplitEvents {
        remaining: total,
        max: max_batch.max(1) as u64,
    }
}

/// Iterator returned by [`split_events`]
#[derive(Debug, Clone)]
pub struct SplitEvents {
    remaining: u64,
    max: u64,
}

impl Iterator for SplitEvents {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        let size = self.remaining.min(self.max);
        self.remaining -= size;
        Some(size as i32)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = usize::try_from(self.remaining.div_ceil(self.max)).unwrap_or(usize::MAX);
        (count, Some(count))
    }
}

impl ExactSizeIterator for SplitEvents {}

/// Ordered sequence of batches one thread runs, with its progress
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    /// Events of the thread in every interval of the plan
    intervals: Vec<u64>,
    max: u64,
    interval_index: usize,
    remaining_in_interval: u64,
    part: u64,
    /// Events reported as transported so far
    pub delivered: u64,
    /// Events the whole queue covers
    pub planned: u64,
    pub batches_run: u64,
}

impl BatchQueue {
    /// Batches for every interval where the thread has events to run
    pub fn for_thread(manager: &ThreadSourceManager, max_batch: i32) -> Self {
        let intervals = (0..manager.plan().len())
            .map(|interval_index| manager.events_in_interval(interval_index))
            .collect();
        Self::from_events(intervals, max_batch)
    }

    /// Queue over the given per-interval event counts
    pub fn from_events(intervals: Vec<u64>, max_batch: i32) -> Self {
        let planned = intervals.iter().sum();
        let mut queue = Self {
            remaining_in_interval: intervals.first().copied().unwrap_or(0),
            intervals,
            max: max_batch.max(1) as u64,
            interval_index: 0,
            part: 0,
            delivered: 0,
            planned,
            batches_run: 0,
        };
        queue.skip_empty();
        queue
    }

    fn skip_empty(&mut self) {
        while self.remaining_in_interval == 0 && self.interval_index < self.intervals.len() {
            self.interval_index += 1;
            self.part = 0;
            self.remaining_in_interval = self.intervals.get(self.interval_index).copied().unwrap_or(0);
        }
    }

    pub fn next(&mut self) -> Option<Batch> {
        let batch = self.peek()?;
        self.remaining_in_interval -= batch.events as u64;
        self.part += 1;
        self.skip_empty();
        Some(batch)
    }

    pub fn peek(&self) -> Option<Batch> {
        if self.remaining_in_interval == 0 {
            return None;
        }
        Some(Batch {
            interval_index: self.interval_index,
            part: self.part,
            events: self.remaining_in_interval.min(self.max) as i32,
        })
    }

    pub fn is_done(&self) -> bool {
        self.remaining_in_interval == 0
    }

    /// Number of batches still to hand out
    pub fn len(&self) -> u64 {
        if self.is_done() {
            return 0;
        }
        self.remaining_in_interval.div_ceil(self.max)
            + self.intervals[self.interval_index + 1..]
                .iter()
                .map(|events| events.div_ceil(self.max))
                .sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.is_done()
    }

    /// Events still to run
    pub fn remaining(&self) -> u64 {
        self.planned.saturating_sub(self.delivered)
    }

    pub fn record(&mut self, transported: u64) {
        self.delivered += transported;
        self.batches_run += 1;
    }
}
