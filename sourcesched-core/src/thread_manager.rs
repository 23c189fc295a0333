//! Per-thread source manager
//!
//! A `ThreadSourceManager` owns one `SourceInstance` per registered source and
//! answers the engine's per-event callback. Nothing in it is shared with other
//! threads except the read-only definitions and plan.

use crate::error::SourceError;
use crate::instance::{SourceCounters, SourceInstance};
use crate::model::Primary;
use crate::partition::ThreadPartition;
use crate::registry::SourceRegistry;
use crate::rng::{self, Stream};
use crate::timing::RunTimingPlan;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Per-event callback the transport engine pulls primaries from
pub trait PrimaryGenerator {
    /// Produce the primary of the given event. `SourceExhausted` means the
    /// engine must stop asking.
    fn generate_primary(&mut self, event_index: u64) -> Result<Primary, SourceError>;
}

/// Order in which sources fire inside a run interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceOrdering {
    /// Registration order, each source emitting all its interval primaries
    /// before the next one starts
    #[default]
    Registration,
    /// One primary per source in turn
    RoundRobin,
    /// Random pick weighted by the primaries each source still has to emit
    /// in the current interval, not by the activity itself. The weights start
    /// proportional to activity times duration and shrink as sources emit, so
    /// every interval target is met exactly.
    ActivityWeighted,
}

impl FromStr for SourceOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(SourceOrdering::Registration),
            "round_robin" => Ok(SourceOrdering::RoundRobin),
            "activity" => Ok(SourceOrdering::ActivityWeighted),
            other => Err(format!(
                "unknown ordering '{}' (expected registration, round_robin or activity)",
                other
            )),
        }
    }
}

impl fmt::Display for SourceOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrdering::Registration => write!(f, "registration"),
            SourceOrdering::RoundRobin => write!(f, "round_robin"),
            SourceOrdering::ActivityWeighted => write!(f, "activity"),
        }
    }
}

/// Options a thread manager is created with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadSettings {
    pub partition: ThreadPartition,
    pub ordering: SourceOrdering,
    pub max_redraws: u64,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            partition: ThreadPartition::single(),
            ordering: SourceOrdering::default(),
            max_redraws: crate::instance::DEFAULT_MAX_REDRAWS,
        }
    }
}

#[derive(Debug)]
pub struct ThreadSourceManager {
    thread_index: usize,
    thread_seed: u64,
    plan: Arc<RunTimingPlan>,
    instances: Vec<SourceInstance>,
    ordering: SourceOrdering,
    rng: Stream,
    next_in_turn: usize,
}

impl ThreadSourceManager {
    /// Build an independent replica of every registered source for one thread
    pub fn create(
        registry: &SourceRegistry,
        plan: Arc<RunTimingPlan>,
        thread_seed: u64,
        settings: ThreadSettings,
    ) -> Result<Self, SourceError> {
        if registry.is_empty() {
            return Err(SourceError::NoSource);
        }

        let instances = registry
            .shared()
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                SourceInstance::new(
                    index,
                    Arc::clone(definition),
                    Arc::clone(&plan),
                    &settings.partition,
                    thread_seed,
                    settings.max_redraws,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            thread_index: settings.partition.thread_index,
            thread_seed,
            plan,
            instances,
            ordering: settings.ordering,
            rng: rng::manager_stream(thread_seed),
            next_in_turn: 0,
        })
    }

    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    pub fn thread_seed(&self) -> u64 {
        self.thread_seed
    }

    pub fn plan(&self) -> &RunTimingPlan {
        &self.plan
    }

    pub fn instances(&self) -> &[SourceInstance] {
        &self.instances
    }

    /// Earliest interval in which some source still has primaries to emit
    pub fn current_interval(&self) -> Option<usize> {
        self.instances.iter().filter_map(SourceInstance::current_interval).min()
    }

    /// Events this thread runs in the given interval, over all sources
    pub fn events_in_interval(&self, interval_index: usize) -> u64 {
        self.instances.iter().map(|i| i.target(interval_index)).sum()
    }

    /// Events this thread still has to run in the given interval
    pub fn pending_in(&self, interval_index: usize) -> u64 {
        self.instances.iter().map(|i| i.pending_in(interval_index)).sum()
    }

    /// Total events of this thread's schedule
    pub fn expected_events(&self) -> u64 {
        self.instances.iter().map(SourceInstance::total_target).sum()
    }

    pub fn delivered(&self) -> u64 {
        self.instances.iter().map(SourceInstance::cumulative_emitted).sum()
    }

    pub fn is_exhausted(&self) -> bool {
        self.instances.iter().all(SourceInstance::is_exhausted)
    }

    /// Counters of every source, in registration order
    pub fn counters(&self) -> Vec<SourceCounters> {
        self.instances.iter().map(|i| *i.counters()).collect()
    }

    fn select(&mut self, interval_index: usize) -> Option<usize> {
        let n = self.instances.len();
        match self.ordering {
            SourceOrdering::Registration => self
                .instances
                .iter()
                .position(|i| i.pending_in(interval_index) > 0),
            SourceOrdering::RoundRobin => {
                let start = self.next_in_turn;
                let picked = (0..n)
                    .map(|k| (start + k) % n)
                    .find(|&idx| self.instances[idx].pending_in(interval_index) > 0)?;
                self.next_in_turn = (picked + 1) % n;
                Some(picked)
            }
            SourceOrdering::ActivityWeighted => {
                let total = self.pending_in(interval_index);
                if total == 0 {
                    return None;
                }
                let mut draw = self.rng.gen_range(0..total);
                for (idx, instance) in self.instances.iter().enumerate() {
                    let pending = instance.pending_in(interval_index);
                    if draw < pending {
                        return Some(idx);
                    }
                    draw -= pending;
                }
                None
            }
        }
    }
}

impl PrimaryGenerator for ThreadSourceManager {
    fn generate_primary(&mut self, event_index: u64) -> Result<Primary, SourceError> {
        let picked = self
            .current_interval()
            .and_then(|interval_index| self.select(interval_index));

        match picked {
            Some(idx) => self.instances[idx].next_primary(event_index),
            // Every instance is exhausted and answers with its own SourceExhausted
            None => match self.instances.last_mut() {
                Some(instance) => instance.next_primary(event_index),
                None => Err(SourceError::NoSource),
            },
        }
    }
}
