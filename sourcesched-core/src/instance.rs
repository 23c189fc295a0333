//! Runtime source instance: one per (source, thread)
//!
//! An instance walks the run intervals in order. Inside an interval it emits
//! primaries on demand until its share of the interval target is reached,
//! then moves to the next interval. Past the last interval every demand fails
//! with `SourceExhausted`.

use crate::acceptance::SkipPolicy;
use crate::error::SourceError;
use crate::model::{sample_direction, sample_position, EnergySampler, Primary, TimePolicy};
use crate::partition::ThreadPartition;
use crate::rng::{self, Stream};
use crate::source::SourceDefinition;
use crate::timing::{RunInterval, RunTimingPlan};
use rand::Rng;
use std::sync::Arc;

/// Default bound on consecutive rejected draws for one primary under `SkipEvents`
pub const DEFAULT_MAX_REDRAWS: u64 = 1_000_000;

/// Draw accounting of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceCounters {
    /// Primaries handed to the engine
    pub delivered: u64,
    /// Every direction drawn, accepted or not
    pub raw_draws: u64,
    /// Draws discarded under `SkipEvents`
    pub skipped: u64,
    /// Draws delivered with zero energy under `ZeroEnergy`
    pub zero_energy: u64,
}

impl SourceCounters {
    pub fn merge(&mut self, other: &SourceCounters) {
        self.delivered += other.delivered;
        self.raw_draws += other.raw_draws;
        self.skipped += other.skipped;
        self.zero_energy += other.zero_energy;
    }
}

#[derive(Debug)]
pub struct SourceInstance {
    index: usize,
    definition: Arc<SourceDefinition>,
    plan: Arc<RunTimingPlan>,
    targets: Vec<u64>,
    current: usize,
    emitted_in_current: u64,
    counters: SourceCounters,
    energy: EnergySampler,
    rng: Stream,
    max_redraws: u64,
}

impl SourceInstance {
    /// Bind a definition to this thread's partition of the plan
    pub fn new(
        index: usize,
        definition: Arc<SourceDefinition>,
        plan: Arc<RunTimingPlan>,
        partition: &ThreadPartition,
        thread_seed: u64,
        max_redraws: u64,
    ) -> Result<Self, SourceError> {
        definition.validate()?;
        let energy = EnergySampler::new(&definition.energy).map_err(|reason| {
            SourceError::InvalidSource {
                name: definition.name.clone(),
                reason,
            }
        })?;

        let n = plan.len();
        let targets = plan
            .intervals()
            .iter()
            .enumerate()
            .map(|(i, interval)| partition.share(i, n, definition.interval_target(interval)))
            .collect();

        let mut instance = Self {
            index,
            definition,
            plan,
            targets,
            current: 0,
            emitted_in_current: 0,
            counters: SourceCounters::default(),
            energy,
            rng: rng::source_stream(thread_seed, index),
            max_redraws,
        };
        instance.settle();
        Ok(instance)
    }

    /// Skip every interval whose share is already complete
    fn settle(&mut self) {
        while self.current < self.targets.len() && self.emitted_in_current >= self.targets[self.current] {
            self.current += 1;
            self.emitted_in_current = 0;
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &SourceDefinition {
        &self.definition
    }

    /// This thread's target in each interval
    pub fn targets(&self) -> &[u64] {
        &self.targets
    }

    pub fn target(&self, interval_index: usize) -> u64 {
        self.targets.get(interval_index).copied().unwrap_or(0)
    }

    pub fn total_target(&self) -> u64 {
        self.targets.iter().sum()
    }

    /// Interval currently being emitted, `None` once the schedule is done
    pub fn current_interval(&self) -> Option<usize> {
        (self.current < self.targets.len()).then_some(self.current)
    }

    /// Primaries still to emit in the given interval
    pub fn pending_in(&self, interval_index: usize) -> u64 {
        use std::cmp::Ordering;
        match interval_index.cmp(&self.current) {
            Ordering::Less => 0,
            Ordering::Equal => self.target(interval_index).saturating_sub(self.emitted_in_current),
            Ordering::Greater => self.target(interval_index),
        }
    }

    /// Primaries emitted so far over all intervals
    pub fn cumulative_emitted(&self) -> u64 {
        self.counters.delivered
    }

    pub fn counters(&self) -> &SourceCounters {
        &self.counters
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_interval().is_none()
    }

    /// Emit the next primary of the schedule
    pub fn next_primary(&mut self, event_id: u64) -> Result<Primary, SourceError> {
        let interval_index = self.current_interval().ok_or_else(|| SourceError::SourceExhausted {
            name: self.definition.name.clone(),
        })?;
        let interval = self.plan.intervals()[interval_index];

        let primary = self.draw(event_id, interval_index, &interval)?;

        self.emitted_in_current += 1;
        self.counters.delivered += 1;
        self.settle();

        log::trace!(
            target: "source",
            "event {} from '{}': {} {:.6} MeV t={} s",
            event_id,
            self.definition.name,
            primary.particle,
            primary.energy,
            primary.time
        );
        Ok(primary)
    }

    fn draw(
        &mut self,
        event_id: u64,
        interval_index: usize,
        interval: &RunInterval,
    ) -> Result<Primary, SourceError> {
        let acceptance = self.definition.active_acceptance().copied();
        let mut rejected = 0u64;

        loop {
            self.counters.raw_draws += 1;
            let position = sample_position(&self.definition.position, &mut self.rng);
            let direction = sample_direction(&self.definition.direction, position, &mut self.rng);
            let mut energy = self.energy.sample(&mut self.rng);

            if let Some(policy) = &acceptance {
                if !policy.accept(direction) {
                    match policy.skip_policy {
                        SkipPolicy::SkipEvents => {
                            self.counters.skipped += 1;
                            rejected += 1;
                            if rejected > self.max_redraws {
                                return Err(SourceError::AcceptanceExhausted {
                                    name: self.definition.name.clone(),
                                    redraws: rejected,
                                    solid_angle_fraction: policy.solid_angle_fraction,
                                });
                            }
                            continue;
                        }
                        SkipPolicy::ZeroEnergy => {
                            self.counters.zero_energy += 1;
                            energy = 0.0;
                        }
                    }
                }
            }

            let time = match self.definition.time_policy {
                TimePolicy::IntervalStart => interval.start,
                TimePolicy::Uniform => interval.time_at(self.rng.gen::<f64>()),
            };

            return Ok(Primary {
                event_id,
                source_index: self.index,
                particle: self.definition.particle,
                energy,
                position,
                direction,
                time,
                interval_index,
            });
        }
    }
}
