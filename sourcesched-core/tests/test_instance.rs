//! Source instance scheduling and thread manager selection

use sourcesched_core::{
    rng, PrimaryGenerator, RunTimingPlan, SourceDefinition, SourceError, SourceInstance,
    SourceOrdering, SourceRegistry, SourceType, ThreadPartition, ThreadSettings,
    ThreadSourceManager, TimePolicy, DEFAULT_MAX_REDRAWS,
};
use std::sync::Arc;

fn generic(name: &str, activity: f64) -> Arc<SourceDefinition> {
    let mut definition = SourceDefinition::new(SourceType::Generic, name);
    definition.set_activity(activity);
    Arc::new(definition)
}

fn plan(pairs: &[(f64, f64)]) -> Arc<RunTimingPlan> {
    Arc::new(RunTimingPlan::from_pairs(pairs).unwrap())
}

fn instance(definition: Arc<SourceDefinition>, plan: Arc<RunTimingPlan>) -> SourceInstance {
    SourceInstance::new(0, definition, plan, &ThreadPartition::single(), 1, DEFAULT_MAX_REDRAWS)
        .unwrap()
}

#[test]
fn test_instance_walks_intervals_in_order() {
    let mut source = instance(generic("s", 2.0), plan(&[(0.0, 1.0), (1.0, 2.5)]));
    assert_eq!(source.targets(), &[2, 3]);
    assert_eq!(source.current_interval(), Some(0));

    let intervals: Vec<usize> = (0..5)
        .map(|id| source.next_primary(id).unwrap().interval_index)
        .collect();
    assert_eq!(intervals, vec![0, 0, 1, 1, 1]);
    assert!(source.is_exhausted());
    assert_eq!(source.cumulative_emitted(), 5);

    let err = source.next_primary(5).unwrap_err();
    assert_eq!(err, SourceError::SourceExhausted { name: "s".to_string() });
    assert!(err.is_termination());
}

#[test]
fn test_zero_target_interval_is_skipped() {
    // 0.4 events in the first interval round to zero
    let mut source = instance(generic("s", 0.4), plan(&[(0.0, 1.0), (1.0, 11.0)]));
    assert_eq!(source.targets(), &[0, 4]);
    assert_eq!(source.current_interval(), Some(1));
    assert_eq!(source.next_primary(0).unwrap().interval_index, 1);
}

#[test]
fn test_primary_times_follow_time_policy() {
    let mut definition = SourceDefinition::new(SourceType::Generic, "s");
    definition.set_activity(50.0);
    let mut at_start = instance(Arc::new(definition.clone()), plan(&[(3.0, 4.0)]));
    for id in 0..50 {
        assert_eq!(at_start.next_primary(id).unwrap().time, 3.0);
    }

    definition.time_policy = TimePolicy::Uniform;
    let mut uniform = instance(Arc::new(definition), plan(&[(3.0, 4.0)]));
    for id in 0..50 {
        let t = uniform.next_primary(id).unwrap().time;
        assert!((3.0..4.0).contains(&t), "time {} outside [3, 4)", t);
    }
}

#[test]
fn test_invalid_definition_is_rejected() {
    let definition = Arc::new(SourceDefinition::new(SourceType::Generic, "no activity"));
    let result = SourceInstance::new(
        0,
        definition,
        plan(&[(0.0, 1.0)]),
        &ThreadPartition::single(),
        1,
        DEFAULT_MAX_REDRAWS,
    );
    assert!(matches!(result, Err(SourceError::InvalidSource { .. })));
}

#[test]
fn test_same_seed_gives_same_primaries() {
    let draw = |seed: u64| {
        let mut source = SourceInstance::new(
            0,
            generic("s", 20.0),
            plan(&[(0.0, 1.0)]),
            &ThreadPartition::single(),
            rng::thread_seed(seed, 0),
            DEFAULT_MAX_REDRAWS,
        )
        .unwrap();
        (0..20).map(|id| source.next_primary(id).unwrap()).collect::<Vec<_>>()
    };
    assert_eq!(draw(11), draw(11));
    assert_ne!(draw(11), draw(12));
}

fn registry(activities: &[f64]) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    for (idx, &activity) in activities.iter().enumerate() {
        registry
            .add_source(SourceType::Generic, &format!("s{}", idx))
            .unwrap()
            .set_activity(activity);
    }
    registry
}

fn manager(activities: &[f64], ordering: SourceOrdering) -> ThreadSourceManager {
    let settings = ThreadSettings {
        ordering,
        ..ThreadSettings::default()
    };
    ThreadSourceManager::create(&registry(activities), plan(&[(0.0, 1.0), (1.0, 2.0)]), 99, settings)
        .unwrap()
}

fn sources_of(manager: &mut ThreadSourceManager, events: u64) -> Vec<(usize, usize)> {
    (0..events)
        .map(|id| {
            let primary = manager.generate_primary(id).unwrap();
            (primary.interval_index, primary.source_index)
        })
        .collect()
}

#[test]
fn test_registration_ordering() {
    let mut manager = manager(&[2.0, 1.0], SourceOrdering::Registration);
    assert_eq!(manager.expected_events(), 6);
    assert_eq!(
        sources_of(&mut manager, 6),
        vec![(0, 0), (0, 0), (0, 1), (1, 0), (1, 0), (1, 1)]
    );
    assert!(manager.is_exhausted());
}

#[test]
fn test_round_robin_ordering() {
    let mut manager = manager(&[2.0, 1.0], SourceOrdering::RoundRobin);
    let picked = sources_of(&mut manager, 6);
    let first_run: Vec<usize> = picked.iter().filter(|p| p.0 == 0).map(|p| p.1).collect();
    assert_eq!(first_run, vec![0, 1, 0]);
    assert_eq!(picked.iter().filter(|p| p.0 == 1).count(), 3);
}

#[test]
fn test_activity_weighted_ordering_honours_targets() {
    let mut manager = manager(&[30.0, 10.0], SourceOrdering::ActivityWeighted);
    let picked = sources_of(&mut manager, 80);
    for interval in 0..2 {
        let from = |source| picked.iter().filter(|p| **p == (interval, source)).count();
        assert_eq!(from(0), 30);
        assert_eq!(from(1), 10);
    }
    // Runs never interleave
    assert!(picked.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn test_exhausted_manager_signals_termination() {
    let mut manager = manager(&[1.0], SourceOrdering::Registration);
    sources_of(&mut manager, 2);
    let err = manager.generate_primary(2).unwrap_err();
    assert!(err.is_termination());
    assert_eq!(manager.delivered(), 2);
}

#[test]
fn test_empty_registry_cannot_create_thread_manager() {
    let result = ThreadSourceManager::create(
        &SourceRegistry::new(),
        plan(&[(0.0, 1.0)]),
        1,
        ThreadSettings::default(),
    );
    assert!(matches!(result, Err(SourceError::NoSource)));
}

#[test]
fn test_thread_managers_are_independent_replicas() {
    let registry = registry(&[5.0]);
    let shared_plan = plan(&[(0.0, 1.0)]);
    let mut a = ThreadSourceManager::create(&registry, Arc::clone(&shared_plan), 1, ThreadSettings::default()).unwrap();
    let b = ThreadSourceManager::create(&registry, shared_plan, 2, ThreadSettings::default()).unwrap();
    a.generate_primary(0).unwrap();
    assert_eq!(a.delivered(), 1);
    assert_eq!(b.delivered(), 0);
    assert_eq!(b.pending_in(0), 5);
}
